//! End-to-end sampling runs against a real CSV file.

use std::fs;
use std::time::Duration;

use elog_common::{LoopError, SamplerConfig};
use elog_counter::{AcquireErrorKind, SimulatedCounter, SimulatedReading};
use elog_sampler::{CsvSink, TimeSeriesSink, CSV_HEADER};

fn fast_config(iterations: u64) -> SamplerConfig {
    SamplerConfig {
        period: Duration::from_millis(2),
        duration: Duration::from_millis(2 * iterations),
        ..SamplerConfig::default()
    }
}

fn never() -> bool {
    false
}

/// `period=1s, total=3s` scaled down: all reads succeed with
/// `[100, 150, 225]` and the CSV carries exactly those rows in order.
#[test]
fn full_run_produces_ordered_csv() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("energy_log.csv");

    let config = fast_config(3);
    let mut source = SimulatedCounter::with_values(&[90, 100, 150, 225]);
    let mut sink = CsvSink::new(&path);

    let stats = elog_sampler::run(&config, &mut source, &mut sink, never).unwrap();

    let content = fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines[0], CSV_HEADER);

    let values: Vec<u64> = lines[1..]
        .iter()
        .map(|line| line.rsplit(',').next().unwrap().parse().unwrap())
        .collect();
    assert_eq!(values, vec![100, 150, 225]);
    assert!(values.windows(2).all(|w| w[0] <= w[1]));

    // Row count equals successful reads and never exceeds the schedule
    assert_eq!(values.len() as u64, stats.recorded);
    assert!(stats.recorded <= config.iterations());
    assert!(!stats.is_degraded());
}

/// Timestamps are rendered as `YYYY-MM-DD HH:MM:SS`.
#[test]
fn csv_timestamps_use_local_datetime_layout() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("energy_log.csv");

    let config = fast_config(1);
    let mut source = SimulatedCounter::with_values(&[90, 100]);
    let mut sink = CsvSink::new(&path);
    elog_sampler::run(&config, &mut source, &mut sink, never).unwrap();

    let content = fs::read_to_string(&path).unwrap();
    let row = content.lines().nth(1).unwrap();
    let timestamp = row.split(',').next().unwrap();

    assert_eq!(timestamp.len(), 19);
    let bytes = timestamp.as_bytes();
    assert_eq!(bytes[4], b'-');
    assert_eq!(bytes[7], b'-');
    assert_eq!(bytes[10], b' ');
    assert_eq!(bytes[13], b':');
    assert_eq!(bytes[16], b':');
}

/// A failed second read (`[100, <fail>, 225]`) yields exactly two rows
/// and a degraded success, not an error.
#[test]
fn degraded_run_keeps_surviving_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("energy_log.csv");

    let config = fast_config(3);
    let mut source = SimulatedCounter::new(vec![
        SimulatedReading::Value(90),
        SimulatedReading::Value(100),
        SimulatedReading::Fail,
        SimulatedReading::Value(225),
    ]);
    let mut sink = CsvSink::new(&path);

    let stats = elog_sampler::run(&config, &mut source, &mut sink, never).unwrap();

    let content = fs::read_to_string(&path).unwrap();
    let values: Vec<u64> = content
        .lines()
        .skip(1)
        .map(|line| line.rsplit(',').next().unwrap().parse().unwrap())
        .collect();
    assert_eq!(values, vec![100, 225]);
    assert!(stats.is_degraded());
    assert_eq!(stats.read_failures, 1);
}

/// Acquisition failure aborts before any sink I/O: no output file is
/// created.
#[test]
fn acquire_failure_creates_no_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("energy_log.csv");

    let config = fast_config(3);
    let mut source = SimulatedCounter::failing_open(AcquireErrorKind::Unsupported);
    let mut sink = CsvSink::new(&path);

    let err = elog_sampler::run(&config, &mut source, &mut sink, never).unwrap_err();
    assert!(matches!(err, LoopError::AcquireFailed(_)));
    assert!(!path.exists());
}

/// An unwritable sink path still closes the counter source: no
/// descriptor leaks across repeated invocations.
#[test]
fn unwritable_sink_still_closes_source() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("no-such-subdir").join("energy_log.csv");

    let config = fast_config(3);
    let mut source = SimulatedCounter::with_values(&[100]);
    let mut sink = CsvSink::new(&path);

    let err = elog_sampler::run(&config, &mut source, &mut sink, never).unwrap_err();
    assert!(matches!(err, LoopError::SinkFailed(_)));
    assert_eq!(source.close_count(), 1);
    assert!(!source.is_open());
}

/// Closing the sink twice after a run never faults.
#[test]
fn sink_close_is_idempotent_after_run() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("energy_log.csv");

    let config = fast_config(1);
    let mut source = SimulatedCounter::with_values(&[90, 100]);
    let mut sink = CsvSink::new(&path);
    elog_sampler::run(&config, &mut source, &mut sink, never).unwrap();

    // The loop already closed both; closing again must not fault
    sink.close().unwrap();
    source.close();
    assert_eq!(source.close_count(), 2);
}
