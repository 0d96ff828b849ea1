//! Configuration structures for a sampling run.
//!
//! Supports TOML deserialization with sensible defaults for
//! casual use and explicit values for scripted measurement campaigns.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level sampling configuration. Immutable for the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Sampling period: one reading is taken per period.
    #[serde(with = "humantime_serde")]
    pub period: Duration,

    /// Total measurement window.
    #[serde(with = "humantime_serde")]
    pub duration: Duration,

    /// Path of the CSV output file.
    pub output: PathBuf,

    /// Which counter acquisition strategy to use.
    pub source: SourceKind,

    /// Direct kernel-counter configuration.
    pub counter: CounterConfig,

    /// External measurement utility configuration.
    pub proxy: ProxyConfig,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(1),
            duration: Duration::from_secs(30),
            output: PathBuf::from("energy_log.csv"),
            source: SourceKind::Perf,
            counter: CounterConfig::default(),
            proxy: ProxyConfig::default(),
        }
    }
}

/// Counter acquisition strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Direct kernel counter via perf_event_open(2).
    #[default]
    Perf,
    /// Delegation to an external measurement utility (one aggregate
    /// reading for the whole window).
    Proxy,
}

/// Configuration for the direct kernel counter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CounterConfig {
    /// CPU the counter is opened on. Package-energy events are
    /// system-wide; any online CPU of the package works.
    pub cpu: u32,

    /// Override for the power PMU type id. Resolved from sysfs when
    /// absent.
    pub pmu_type: Option<u32>,

    /// Override for the package-energy event config value. Resolved
    /// from sysfs when absent.
    pub event_config: Option<u64>,
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            cpu: 0,
            pmu_type: None,
            event_config: None,
        }
    }
}

/// Configuration for the external measurement utility.
///
/// The session duration, in whole seconds, is appended as the final
/// argument, yielding e.g. `perf stat -e power/energy-pkg/ -- sleep 30`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Command to invoke.
    pub command: String,

    /// Arguments preceding the duration.
    pub args: Vec<String>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            command: String::from("perf"),
            args: vec![
                String::from("stat"),
                String::from("-e"),
                String::from("power/energy-pkg/"),
                String::from("--"),
                String::from("sleep"),
            ],
        }
    }
}

impl SamplerConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::Parse)
    }

    /// Serialize configuration to a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Reject configurations the sampling loop cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a zero period or zero
    /// duration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.period.is_zero() {
            return Err(ConfigError::Invalid("period must be non-zero".into()));
        }
        if self.duration.is_zero() {
            return Err(ConfigError::Invalid("duration must be non-zero".into()));
        }
        Ok(())
    }

    /// Number of sampling iterations: `ceil(duration / period)`.
    ///
    /// Returns 0 when the period is zero; [`Self::validate`] rejects
    /// that case up front.
    #[must_use]
    pub fn iterations(&self) -> u64 {
        let period = self.period.as_nanos();
        if period == 0 {
            return 0;
        }
        let duration = self.duration.as_nanos();
        u64::try_from(duration.div_ceil(period)).unwrap_or(u64::MAX)
    }
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File I/O error.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// TOML parsing error.
    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("failed to serialize TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Semantically invalid configuration.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Serde helper module for `Duration` using humantime format.
mod humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = humantime::format_duration(*duration).to_string();
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SamplerConfig::default();
        assert_eq!(config.period, Duration::from_secs(1));
        assert_eq!(config.duration, Duration::from_secs(30));
        assert_eq!(config.source, SourceKind::Perf);
        assert_eq!(config.output, PathBuf::from("energy_log.csv"));
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
            period = "500ms"
            duration = "10s"
            output = "run.csv"
            source = "proxy"

            [counter]
            cpu = 2

            [proxy]
            command = "perf"
        "#;

        let config = SamplerConfig::from_toml(toml).unwrap();
        assert_eq!(config.period, Duration::from_millis(500));
        assert_eq!(config.duration, Duration::from_secs(10));
        assert_eq!(config.source, SourceKind::Proxy);
        assert_eq!(config.counter.cpu, 2);
        // Unspecified fields keep their defaults
        assert!(config.counter.pmu_type.is_none());
        assert_eq!(config.proxy.args.last().map(String::as_str), Some("sleep"));
    }

    #[test]
    fn test_roundtrip_toml() {
        let config = SamplerConfig::default();
        let toml = config.to_toml().unwrap();
        let parsed = SamplerConfig::from_toml(&toml).unwrap();
        assert_eq!(config.period, parsed.period);
        assert_eq!(config.duration, parsed.duration);
        assert_eq!(config.source, parsed.source);
    }

    #[test]
    fn test_iterations_exact_and_ceil() {
        let mut config = SamplerConfig {
            period: Duration::from_secs(1),
            duration: Duration::from_secs(3),
            ..SamplerConfig::default()
        };
        assert_eq!(config.iterations(), 3);

        // 3.5s at 1s period rounds up to 4 iterations
        config.duration = Duration::from_millis(3500);
        assert_eq!(config.iterations(), 4);
    }

    #[test]
    fn test_validate_rejects_zero_period() {
        let config = SamplerConfig {
            period: Duration::ZERO,
            ..SamplerConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_zero_duration() {
        let config = SamplerConfig {
            duration: Duration::ZERO,
            ..SamplerConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
