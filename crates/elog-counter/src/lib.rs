//! Counter acquisition for the energy logger.
//!
//! This crate provides:
//! - [`CounterSource`] trait abstracting "a monotonic energy counter
//!   readable on demand"
//! - [`perf`] module with the direct kernel-counter variant
//!   (perf_event_open(2), Linux only)
//! - [`proxy`] module with the subprocess-driven fallback variant
//! - [`SimulatedCounter`] with scripted readings for tests

#[cfg(target_os = "linux")]
pub mod perf;
pub mod proxy;

#[cfg(target_os = "linux")]
pub use perf::DirectCounter;
pub use proxy::{ProxyCounter, ProxyOutcome, ProxySession};

use elog_common::{AcquireError, ReadError};

/// A monotonic energy counter readable on demand.
///
/// Exactly one logical flow of control owns a source for the lifetime of
/// a sampling run: it is opened once before the first read and closed
/// exactly once after the run, regardless of how many reads succeeded.
pub trait CounterSource: Send {
    /// Acquire the underlying counter.
    ///
    /// Must be called before the first [`read`](Self::read). Fails with
    /// [`AcquireError::PermissionDenied`] when the calling context lacks
    /// the privilege to create the counter, or
    /// [`AcquireError::Unsupported`] when the platform does not expose
    /// the package-energy event class.
    fn open(&mut self) -> Result<(), AcquireError>;

    /// Current cumulative counter value in microjoules.
    ///
    /// The counter is cumulative and monotonic until it wraps at its
    /// native width; it is never reset between reads. Returns
    /// [`ReadError::Closed`] after [`close`](Self::close).
    fn read(&mut self) -> Result<u64, ReadError>;

    /// Release the counter. Idempotent: closing twice never faults.
    fn close(&mut self);

    /// Whether the counter is currently acquired.
    fn is_open(&self) -> bool;

    /// Human-readable description for logs.
    fn describe(&self) -> &str;

    /// True when the source runs one blocking session spanning the whole
    /// measurement window instead of supporting per-tick reads. The
    /// sampling loop then performs exactly one un-slept iteration.
    fn session_bound(&self) -> bool {
        false
    }
}

/// One scripted reading for [`SimulatedCounter`].
#[derive(Debug, Clone, Copy)]
pub enum SimulatedReading {
    /// A successful read yielding this cumulative value.
    Value(u64),
    /// An injected transient read failure.
    Fail,
}

/// Scripted counter source for testing.
///
/// Replays a fixed sequence of readings; once the script is exhausted it
/// repeats the last successful value. Open/close invocations are counted
/// so tests can assert the release-on-every-exit-path invariant.
#[derive(Debug, Default)]
pub struct SimulatedCounter {
    script: Vec<SimulatedReading>,
    cursor: usize,
    opened: bool,
    fail_open: Option<AcquireErrorKind>,
    open_count: u32,
    close_count: u32,
    last_value: Option<u64>,
}

/// Which acquisition failure a [`SimulatedCounter`] should inject.
#[derive(Debug, Clone, Copy)]
pub enum AcquireErrorKind {
    /// Inject [`AcquireError::PermissionDenied`].
    PermissionDenied,
    /// Inject [`AcquireError::Unsupported`].
    Unsupported,
}

impl SimulatedCounter {
    /// Create a counter that replays `script` in order.
    #[must_use]
    pub fn new(script: impl Into<Vec<SimulatedReading>>) -> Self {
        Self {
            script: script.into(),
            ..Self::default()
        }
    }

    /// Shorthand for a script of successful values only.
    #[must_use]
    pub fn with_values(values: &[u64]) -> Self {
        Self::new(
            values
                .iter()
                .map(|&v| SimulatedReading::Value(v))
                .collect::<Vec<_>>(),
        )
    }

    /// Make [`CounterSource::open`] fail with the given kind.
    #[must_use]
    pub fn failing_open(kind: AcquireErrorKind) -> Self {
        Self {
            fail_open: Some(kind),
            ..Self::default()
        }
    }

    /// Number of times `open` was invoked.
    #[must_use]
    pub fn open_count(&self) -> u32 {
        self.open_count
    }

    /// Number of times `close` was invoked.
    #[must_use]
    pub fn close_count(&self) -> u32 {
        self.close_count
    }
}

impl CounterSource for SimulatedCounter {
    fn open(&mut self) -> Result<(), AcquireError> {
        self.open_count += 1;
        match self.fail_open {
            Some(AcquireErrorKind::PermissionDenied) => Err(AcquireError::PermissionDenied(
                std::io::Error::from(std::io::ErrorKind::PermissionDenied),
            )),
            Some(AcquireErrorKind::Unsupported) => Err(AcquireError::Unsupported(
                "simulated platform without power PMU".into(),
            )),
            None => {
                self.opened = true;
                Ok(())
            }
        }
    }

    fn read(&mut self) -> Result<u64, ReadError> {
        if !self.opened {
            return Err(ReadError::Closed);
        }
        match self.script.get(self.cursor) {
            Some(SimulatedReading::Value(v)) => {
                self.cursor += 1;
                self.last_value = Some(*v);
                Ok(*v)
            }
            Some(SimulatedReading::Fail) => {
                self.cursor += 1;
                Err(ReadError::Io(std::io::Error::other(
                    "injected read failure",
                )))
            }
            None => self.last_value.ok_or(ReadError::ShortRead(0)),
        }
    }

    fn close(&mut self) {
        self.close_count += 1;
        self.opened = false;
    }

    fn is_open(&self) -> bool {
        self.opened
    }

    fn describe(&self) -> &str {
        "simulated counter"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_reads_in_order() {
        let mut counter = SimulatedCounter::with_values(&[100, 150, 225]);
        counter.open().unwrap();
        assert_eq!(counter.read().unwrap(), 100);
        assert_eq!(counter.read().unwrap(), 150);
        assert_eq!(counter.read().unwrap(), 225);
        // Exhausted script repeats the last value
        assert_eq!(counter.read().unwrap(), 225);
    }

    #[test]
    fn test_read_before_open_is_closed() {
        let mut counter = SimulatedCounter::with_values(&[1]);
        assert!(matches!(counter.read(), Err(ReadError::Closed)));
    }

    #[test]
    fn test_read_after_close_is_closed() {
        let mut counter = SimulatedCounter::with_values(&[1]);
        counter.open().unwrap();
        counter.close();
        assert!(matches!(counter.read(), Err(ReadError::Closed)));
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut counter = SimulatedCounter::with_values(&[1]);
        counter.open().unwrap();
        counter.close();
        counter.close();
        assert_eq!(counter.close_count(), 2);
        assert!(!counter.is_open());
    }

    #[test]
    fn test_injected_failure_then_recovery() {
        let mut counter = SimulatedCounter::new(vec![
            SimulatedReading::Value(100),
            SimulatedReading::Fail,
            SimulatedReading::Value(225),
        ]);
        counter.open().unwrap();
        assert_eq!(counter.read().unwrap(), 100);
        assert!(matches!(counter.read(), Err(ReadError::Io(_))));
        assert_eq!(counter.read().unwrap(), 225);
    }

    #[test]
    fn test_failing_open_variants() {
        let mut denied = SimulatedCounter::failing_open(AcquireErrorKind::PermissionDenied);
        assert!(matches!(
            denied.open(),
            Err(AcquireError::PermissionDenied(_))
        ));

        let mut unsupported = SimulatedCounter::failing_open(AcquireErrorKind::Unsupported);
        assert!(matches!(
            unsupported.open(),
            Err(AcquireError::Unsupported(_))
        ));
        assert!(!unsupported.is_open());
    }
}
