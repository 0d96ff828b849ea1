//! Sampling loop and time-series persistence.
//!
//! This crate provides:
//! - [`TimeSeriesSink`] trait and the [`CsvSink`] implementation
//! - [`run`](sampler::run), the fixed-cadence sampling loop driving one
//!   [`CounterSource`](elog_counter::CounterSource) for one bounded
//!   measurement window
//! - [`MemorySink`] for tests

pub mod sampler;
pub mod sink;

pub use sampler::run;
pub use sink::{CsvSink, MemorySink, TimeSeriesSink, CSV_HEADER};
