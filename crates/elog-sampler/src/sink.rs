//! Durable time-series sinks.
//!
//! The sink is an owned resource passed into the sampling loop, acquired
//! after the counter and released on every exit path.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use elog_common::{EnergySample, SinkError};
use tracing::debug;

/// CSV header line written by [`TimeSeriesSink::init`].
pub const CSV_HEADER: &str = "timestamp,energy_uj";

/// Durable destination for emitted samples.
pub trait TimeSeriesSink {
    /// Create/truncate the target and write the header line.
    ///
    /// # Errors
    ///
    /// [`SinkError::Create`] when the target cannot be created.
    fn init(&mut self) -> Result<(), SinkError>;

    /// Record one sample row durably before returning; no userspace
    /// buffering survives a process-crash boundary.
    ///
    /// # Errors
    ///
    /// [`SinkError::Closed`] after [`close`](Self::close),
    /// [`SinkError::Write`] on I/O failure.
    fn append(&mut self, sample: &EnergySample) -> Result<(), SinkError>;

    /// Finalize the sink. Idempotent: closing twice never faults.
    ///
    /// # Errors
    ///
    /// [`SinkError::Write`] when finalization I/O fails.
    fn close(&mut self) -> Result<(), SinkError>;

    /// Whether the sink is currently open.
    fn is_open(&self) -> bool;
}

/// CSV file sink: header `timestamp,energy_uj`, one row per sample,
/// timestamps in local time.
///
/// Rows go straight to the file descriptor (an unbuffered [`File`]), so
/// every returned `Ok` from [`append`](TimeSeriesSink::append) is
/// already out of this process.
#[derive(Debug)]
pub struct CsvSink {
    path: PathBuf,
    file: Option<File>,
}

impl CsvSink {
    /// Create an uninitialized sink targeting `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
        }
    }

    /// Target path of this sink.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TimeSeriesSink for CsvSink {
    fn init(&mut self) -> Result<(), SinkError> {
        let mut file = File::create(&self.path).map_err(|e| SinkError::Create {
            path: self.path.clone(),
            source: e,
        })?;
        writeln!(file, "{CSV_HEADER}").map_err(SinkError::Write)?;
        debug!(path = %self.path.display(), "sample sink created");
        self.file = Some(file);
        Ok(())
    }

    fn append(&mut self, sample: &EnergySample) -> Result<(), SinkError> {
        let file = self.file.as_mut().ok_or(SinkError::Closed)?;
        writeln!(file, "{},{}", sample.timestamp_string(), sample.raw_uj)
            .map_err(SinkError::Write)
    }

    fn close(&mut self) -> Result<(), SinkError> {
        if let Some(mut file) = self.file.take() {
            file.flush().map_err(SinkError::Write)?;
            debug!(path = %self.path.display(), "sample sink closed");
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.file.is_some()
    }
}

/// In-memory sink for testing.
///
/// Records appended rows as `(timestamp, value, wrapped)` tuples and can
/// inject init or append failures.
#[derive(Debug, Default)]
pub struct MemorySink {
    rows: Vec<(String, u64, bool)>,
    open: bool,
    init_count: u32,
    close_count: u32,
    fail_init: bool,
    fail_append_at: Option<usize>,
    appends: usize,
}

impl MemorySink {
    /// Create an empty in-memory sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make [`TimeSeriesSink::init`] fail.
    #[must_use]
    pub fn failing_init() -> Self {
        Self {
            fail_init: true,
            ..Self::default()
        }
    }

    /// Fail the `n`-th append (0-based) with a write error.
    #[must_use]
    pub fn failing_append_at(n: usize) -> Self {
        Self {
            fail_append_at: Some(n),
            ..Self::default()
        }
    }

    /// Rows recorded so far.
    #[must_use]
    pub fn rows(&self) -> &[(String, u64, bool)] {
        &self.rows
    }

    /// Raw counter values recorded so far, in order.
    #[must_use]
    pub fn values(&self) -> Vec<u64> {
        self.rows.iter().map(|(_, v, _)| *v).collect()
    }

    /// Number of times `init` was invoked.
    #[must_use]
    pub fn init_count(&self) -> u32 {
        self.init_count
    }

    /// Number of times `close` was invoked.
    #[must_use]
    pub fn close_count(&self) -> u32 {
        self.close_count
    }
}

impl TimeSeriesSink for MemorySink {
    fn init(&mut self) -> Result<(), SinkError> {
        self.init_count += 1;
        if self.fail_init {
            return Err(SinkError::Create {
                path: PathBuf::from("<memory>"),
                source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
            });
        }
        self.open = true;
        Ok(())
    }

    fn append(&mut self, sample: &EnergySample) -> Result<(), SinkError> {
        if !self.open {
            return Err(SinkError::Closed);
        }
        let index = self.appends;
        self.appends += 1;
        if self.fail_append_at == Some(index) {
            return Err(SinkError::Write(std::io::Error::other(
                "injected append failure",
            )));
        }
        self.rows
            .push((sample.timestamp_string(), sample.raw_uj, sample.wrapped));
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        self.close_count += 1;
        self.open = false;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }
}
