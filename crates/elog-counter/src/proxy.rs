//! Subprocess-driven proxy counter.
//!
//! Delegates the whole measurement window to a trusted external utility
//! (by default `perf stat -e power/energy-pkg/ -- sleep N`) and captures
//! one aggregate reading for the session. A strict reduced-functionality
//! fallback: no per-tick time series, just the session total.

use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::Duration;

use elog_common::{AcquireError, ProxyConfig, ReadError, SpawnError, WaitError};
use tracing::{debug, warn};

use crate::CounterSource;

/// Subprocess-proxy variant of [`CounterSource`].
#[derive(Debug)]
pub struct ProxyCounter {
    command: String,
    args: Vec<String>,
    duration: Duration,
    ready: bool,
    label: String,
}

/// A running external measurement session.
#[derive(Debug)]
pub struct ProxySession {
    child: Child,
}

/// Result of a completed proxy session.
#[derive(Debug)]
pub struct ProxyOutcome {
    /// Exit status of the external utility. Non-zero is reported but
    /// does not invalidate partial output already captured.
    pub status: ExitStatus,
    /// Aggregate energy reading in microjoules, when one could be
    /// parsed from the utility's output.
    pub reading_uj: Option<u64>,
    /// Combined stderr/stdout of the utility, kept as opaque
    /// diagnostic text.
    pub diagnostics: String,
}

impl ProxyCounter {
    /// Create a proxy for one session of the given duration.
    #[must_use]
    pub fn new(config: &ProxyConfig, duration: Duration) -> Self {
        let label = format!("proxy command {:?}", config.command);
        Self {
            command: config.command.clone(),
            args: config.args.clone(),
            duration,
            ready: false,
            label,
        }
    }

    /// Launch the external utility for one bounded session.
    ///
    /// The session duration in whole seconds is appended as the final
    /// argument.
    ///
    /// # Errors
    ///
    /// [`SpawnError::LaunchFailed`] when the command cannot be started.
    pub fn spawn(&self) -> Result<ProxySession, SpawnError> {
        let secs = self.duration.as_secs().max(1);
        debug!(command = %self.command, secs, "launching measurement session");

        let child = Command::new(&self.command)
            .args(&self.args)
            .arg(secs.to_string())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| SpawnError::LaunchFailed {
                command: self.command.clone(),
                source: e,
            })?;

        Ok(ProxySession { child })
    }
}

impl ProxySession {
    /// Block until the session terminates and collect its outcome.
    ///
    /// # Errors
    ///
    /// Returns [`WaitError`] only when the OS-level wait itself fails;
    /// a non-zero exit status is carried in the outcome instead.
    pub fn wait(self) -> Result<ProxyOutcome, WaitError> {
        let output = self.child.wait_with_output().map_err(WaitError)?;

        // perf stat prints its summary on stderr
        let mut diagnostics = String::from_utf8_lossy(&output.stderr).into_owned();
        diagnostics.push_str(&String::from_utf8_lossy(&output.stdout));

        if !output.status.success() {
            warn!(status = %output.status, "measurement process exited with non-zero status");
        }

        let reading_uj = parse_aggregate_uj(&diagnostics);
        Ok(ProxyOutcome {
            status: output.status,
            reading_uj,
            diagnostics,
        })
    }
}

impl CounterSource for ProxyCounter {
    fn open(&mut self) -> Result<(), AcquireError> {
        // Launch failures surface at read time; there is no descriptor
        // to acquire up front.
        self.ready = true;
        Ok(())
    }

    fn read(&mut self) -> Result<u64, ReadError> {
        if !self.ready {
            return Err(ReadError::Closed);
        }

        let session = self.spawn().map_err(|e| match e {
            SpawnError::LaunchFailed { source, .. } => ReadError::Io(source),
        })?;
        let outcome = session.wait().map_err(|WaitError(e)| ReadError::Io(e))?;
        outcome.reading_uj.ok_or(ReadError::NoReading)
    }

    fn close(&mut self) {
        self.ready = false;
    }

    fn is_open(&self) -> bool {
        self.ready
    }

    fn describe(&self) -> &str {
        &self.label
    }

    fn session_bound(&self) -> bool {
        true
    }
}

/// Extract an aggregate energy reading, in microjoules, from a
/// `perf stat`-style summary line such as
/// `             21.45 Joules power/energy-pkg/`.
fn parse_aggregate_uj(text: &str) -> Option<u64> {
    for line in text.lines() {
        if !line.contains("Joules") {
            continue;
        }
        for token in line.split_whitespace() {
            if let Some(joules) = parse_number(token) {
                if joules >= 0.0 && joules.is_finite() {
                    return Some((joules * 1_000_000.0).round() as u64);
                }
            }
        }
    }
    None
}

/// Parse a numeric token, tolerating thousands separators and
/// decimal-comma locales.
fn parse_number(token: &str) -> Option<f64> {
    if let Ok(v) = token.parse::<f64>() {
        return Some(v);
    }
    // "1,234.56" -> "1234.56"
    let stripped: String = token.chars().filter(|c| *c != ',').collect();
    if stripped.contains('.') {
        if let Ok(v) = stripped.parse::<f64>() {
            return Some(v);
        }
    }
    // "21,45" -> "21.45"
    token.replace(',', ".").parse::<f64>().ok()
}
