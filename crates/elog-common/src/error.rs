//! Error taxonomy for counter acquisition, sampling, and persistence.
//!
//! Acquisition and sink-creation failures are fatal to a run; per-tick
//! read failures are recovered locally by the sampling loop and only
//! degrade the run.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failure to acquire an energy counter.
#[derive(Debug, Error)]
pub enum AcquireError {
    /// The calling context lacks the privilege to open a system-wide
    /// counter (typically EACCES/EPERM from `perf_event_open`).
    #[error("permission denied opening energy counter (root or a relaxed kernel.perf_event_paranoid is required): {0}")]
    PermissionDenied(#[source] io::Error),

    /// The platform or kernel does not expose the package-energy event
    /// class.
    #[error("platform does not expose a package-energy counter: {0}")]
    Unsupported(String),

    /// Any other OS-level failure while opening the counter.
    #[error("failed to open energy counter: {0}")]
    Io(#[from] io::Error),
}

/// Failure of a single counter read.
#[derive(Debug, Error)]
pub enum ReadError {
    /// The counter handle was closed before this read.
    #[error("counter handle is closed")]
    Closed,

    /// The kernel returned fewer bytes than a full counter value.
    #[error("short read from counter: got {0} bytes, expected 8")]
    ShortRead(usize),

    /// A proxy session terminated without a parsable aggregate reading.
    #[error("measurement session produced no parsable energy reading")]
    NoReading,

    /// Transient OS-level read failure.
    #[error("counter read failed: {0}")]
    Io(#[from] io::Error),
}

/// Failure to launch the external measurement utility.
#[derive(Debug, Error)]
pub enum SpawnError {
    /// The command could not be started (not found, exec failure).
    #[error("failed to launch {command:?}: {source}")]
    LaunchFailed {
        /// The command that was attempted.
        command: String,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
}

/// Failure while waiting for the external measurement utility.
#[derive(Debug, Error)]
#[error("failed waiting for measurement process: {0}")]
pub struct WaitError(#[from] pub io::Error);

/// Failure of the time-series sink.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The output file could not be created or truncated.
    #[error("failed to create output file {path}: {source}")]
    Create {
        /// Target path of the sink.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// A row could not be written or flushed.
    #[error("failed to write sample row: {0}")]
    Write(#[source] io::Error),

    /// The sink was closed before this operation.
    #[error("sink is closed")]
    Closed,
}

/// Aggregate outcome errors of a whole sampling run.
#[derive(Debug, Error)]
pub enum LoopError {
    /// The counter source could not be acquired; no sink I/O occurred.
    #[error("failed to acquire energy counter: {0}")]
    AcquireFailed(#[from] AcquireError),

    /// The sink could not be created; the counter source was closed.
    #[error("failed to open sample sink: {0}")]
    SinkFailed(#[from] SinkError),

    /// Every attempted iteration failed to read the counter.
    #[error("all {attempted} counter reads failed; no samples recorded")]
    NoSamples {
        /// Number of iterations that were attempted.
        attempted: u64,
    },
}

/// Convenience type alias for sampling-run results.
pub type LoopResult<T> = Result<T, LoopError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loop_error_wraps_acquire() {
        let inner = AcquireError::Unsupported("no power PMU".into());
        let err = LoopError::from(inner);
        assert!(err.to_string().contains("no power PMU"));
    }

    #[test]
    fn test_no_samples_message_carries_count() {
        let err = LoopError::NoSamples { attempted: 7 };
        assert!(err.to_string().contains('7'));
    }

    #[test]
    fn test_sink_create_names_path() {
        let err = SinkError::Create {
            path: PathBuf::from("/bad/dir/out.csv"),
            source: io::Error::new(io::ErrorKind::NotFound, "missing"),
        };
        assert!(err.to_string().contains("/bad/dir/out.csv"));
    }
}
