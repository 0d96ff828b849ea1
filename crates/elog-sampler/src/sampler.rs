//! The fixed-cadence sampling loop.
//!
//! Single-threaded and blocking: one flow of control owns the counter
//! source and the sink for the whole run, each tick's write completes
//! (or fails) before the next sleep begins, and the per-tick sleep is
//! the only suspension point.

use std::thread;
use std::time::{Duration, Instant};

use elog_common::{EnergySample, LoopError, SamplerConfig, SummaryStats};
use elog_counter::CounterSource;
use tracing::{debug, info, warn};

use crate::sink::TimeSeriesSink;

/// Drive `source` at the configured cadence and persist each sample.
///
/// Lifecycle guarantees:
/// - the source is opened before any sink I/O; if acquisition fails no
///   output file is ever created
/// - the source and the sink are both closed on every exit path
/// - per-tick read failures degrade the run instead of failing it; only
///   a run where every attempted read failed is an error
///
/// The sleep is best-effort and does not compensate for drift;
/// accumulated skew across many iterations is an accepted limitation.
/// `cancelled` is polled at each period boundary so early termination
/// still releases both resources.
///
/// # Errors
///
/// [`LoopError::AcquireFailed`] when the source cannot be opened,
/// [`LoopError::SinkFailed`] when the sink cannot be created, and
/// [`LoopError::NoSamples`] when every attempted read failed.
pub fn run<C, S, F>(
    config: &SamplerConfig,
    source: &mut C,
    sink: &mut S,
    cancelled: F,
) -> Result<SummaryStats, LoopError>
where
    C: CounterSource + ?Sized,
    S: TimeSeriesSink + ?Sized,
    F: Fn() -> bool,
{
    source.open()?;
    info!(source = source.describe(), "energy counter acquired");

    if let Err(e) = sink.init() {
        source.close();
        return Err(LoopError::SinkFailed(e));
    }

    let start = Instant::now();
    let mut stats = SummaryStats::default();

    // A session-bound source spends the whole window inside one blocking
    // read; scheduling it tick-by-tick (or taking a baseline reading)
    // would multiply the window.
    let (iterations, period) = if source.session_bound() {
        (1, Duration::ZERO)
    } else {
        (config.iterations(), config.period)
    };

    // Baseline reading: not emitted, but lets consumers compute a
    // zero-based delta over the whole run.
    if !source.session_bound() {
        match source.read() {
            Ok(value) => {
                debug!(value, "baseline reading");
                stats.first_uj = Some(value);
            }
            Err(e) => warn!(error = %e, "baseline read failed, continuing"),
        }
    }

    let mut previous = stats.first_uj;
    let mut successful_reads = 0u64;

    for iteration in 0..iterations {
        if cancelled() {
            info!(
                completed = stats.attempted,
                "cancellation requested, stopping early"
            );
            break;
        }

        if !period.is_zero() {
            thread::sleep(period);
        }
        stats.attempted += 1;

        match source.read() {
            Ok(value) => {
                successful_reads += 1;

                let mut wrapped = false;
                if let Some(prev) = previous {
                    if value < prev {
                        wrapped = true;
                        stats.wraparounds += 1;
                        warn!(
                            previous = prev,
                            current = value,
                            "counter decreased; tagging sample as wraparound"
                        );
                    }
                }

                let sample = EnergySample::now(value, wrapped);
                match sink.append(&sample) {
                    Ok(()) => stats.recorded += 1,
                    Err(e) => {
                        stats.write_failures += 1;
                        warn!(iteration, error = %e, "failed to persist sample");
                    }
                }

                stats.last_uj = Some(value);
                previous = Some(value);
            }
            Err(e) => {
                stats.read_failures += 1;
                warn!(iteration, error = %e, "counter read failed, continuing");
            }
        }
    }

    stats.elapsed = start.elapsed();

    // Release both resources on every exit path.
    source.close();
    if let Err(e) = sink.close() {
        warn!(error = %e, "failed to finalize sink");
    }

    if stats.attempted > 0 && successful_reads == 0 {
        return Err(LoopError::NoSamples {
            attempted: stats.attempted,
        });
    }

    debug!(
        attempted = stats.attempted,
        recorded = stats.recorded,
        read_failures = stats.read_failures,
        "sampling run finished"
    );
    Ok(stats)
}
