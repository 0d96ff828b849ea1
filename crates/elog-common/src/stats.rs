//! Summary statistics for a completed sampling run.

use std::time::Duration;

/// Outcome counters of one sampling run.
///
/// A run is *degraded* when some, but not all, iterations failed;
/// degraded runs are reported as success with these counters, not as an
/// error. Consumers of the CSV must tolerate the resulting gaps.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct SummaryStats {
    /// Iterations the loop attempted.
    pub attempted: u64,
    /// Rows durably written to the sink.
    pub recorded: u64,
    /// Counter reads that failed.
    pub read_failures: u64,
    /// Sink appends that failed after a successful read.
    pub write_failures: u64,
    /// Samples tagged as counter wraparound.
    pub wraparounds: u64,
    /// Baseline (pre-loop) counter value, when the baseline read
    /// succeeded.
    pub first_uj: Option<u64>,
    /// Last successfully read counter value.
    pub last_uj: Option<u64>,
    /// Wall time spent in the loop.
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
}

impl SummaryStats {
    /// Whether the run captured fewer samples than attempted.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.read_failures > 0 || self.write_failures > 0
    }

    /// Energy consumed over the run in microjoules, as the delta between
    /// the last and baseline readings.
    ///
    /// Returns `None` when either endpoint is missing or a wraparound
    /// was observed: correcting across a wrap needs the counter's native
    /// bit width, which is platform-dependent and not known here.
    #[must_use]
    pub fn consumed_uj(&self) -> Option<u64> {
        if self.wraparounds > 0 {
            return None;
        }
        match (self.first_uj, self.last_uj) {
            (Some(first), Some(last)) => last.checked_sub(first),
            _ => None,
        }
    }
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(duration.as_secs_f64())
    }
}
