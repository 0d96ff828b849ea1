#![doc = "Common types shared across the energy-logger workspace."]

pub mod config;
pub mod error;
pub mod sample;
pub mod stats;

pub use config::*;
pub use error::*;
pub use sample::*;
pub use stats::*;
