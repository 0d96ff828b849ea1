//! A single timestamped energy reading.

use chrono::{DateTime, Local};

/// Format used for CSV timestamps (local time).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One timestamped reading of a cumulative energy counter.
///
/// The raw value is cumulative microjoules since the counter was
/// enabled. Consecutive values are non-decreasing unless the counter
/// wrapped at its native width, in which case the later sample carries
/// `wrapped = true` instead of a guessed correction (the counter width
/// is platform-dependent and not validated here).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnergySample {
    /// Wall-clock instant the reading was taken.
    pub timestamp: DateTime<Local>,
    /// Cumulative counter value in microjoules.
    pub raw_uj: u64,
    /// True when this reading is lower than its predecessor.
    pub wrapped: bool,
}

impl EnergySample {
    /// Create a sample stamped with the current wall-clock time.
    #[must_use]
    pub fn now(raw_uj: u64, wrapped: bool) -> Self {
        Self {
            timestamp: Local::now(),
            raw_uj,
            wrapped,
        }
    }

    /// Render the timestamp as `YYYY-MM-DD HH:MM:SS` local time.
    #[must_use]
    pub fn timestamp_string(&self) -> String {
        self.timestamp.format(TIMESTAMP_FORMAT).to_string()
    }
}
