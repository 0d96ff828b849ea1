//! Energy logger daemon entry point.
//!
//! Wires the counter source, sampling loop, and CSV sink into a
//! complete run with configuration resolution, signal handling, and
//! exit-code policy.

mod signals;

use anyhow::{Context, Result};
use clap::Parser;
use elog_common::{SamplerConfig, SourceKind};
use elog_counter::{CounterSource, ProxyCounter};
use elog_sampler::CsvSink;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};

use crate::signals::SignalHandler;

/// Energy logger command-line arguments.
#[derive(Parser, Debug)]
#[command(
    name = "elog",
    about = "Energy logger - samples the CPU package energy counter into a timestamped CSV",
    version,
    long_about = None
)]
struct Args {
    /// Measurement window in seconds (overrides the configured duration).
    duration: Option<u64>,

    /// Path to a configuration file (TOML).
    #[arg(long, short = 'c', value_name = "FILE")]
    config: Option<PathBuf>,

    /// Path of the CSV output file (overrides the configured path).
    #[arg(long, short = 'o', value_name = "FILE")]
    output: Option<PathBuf>,

    /// Delegate the whole window to the external measurement utility
    /// instead of sampling the kernel counter per tick.
    #[arg(long)]
    proxy: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, short = 'l', default_value = "info")]
    log_level: String,
}

fn main() -> ExitCode {
    let args = Args::parse();

    init_logging(&args.log_level);

    info!(version = env!("CARGO_PKG_VERSION"), "Starting energy logger");

    let config = match resolve_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("{e:#}");
            return ExitCode::FAILURE;
        }
    };

    info!(
        period = ?config.period,
        duration = ?config.duration,
        output = %config.output.display(),
        source = ?config.source,
        "Configuration loaded"
    );

    let handler = match SignalHandler::install() {
        Ok(handler) => handler,
        Err(e) => {
            error!(error = %e, "Failed to set up signal handlers");
            return ExitCode::FAILURE;
        }
    };

    let mut source = match create_source(&config) {
        Ok(source) => source,
        Err(e) => {
            error!("{e:#}");
            return ExitCode::FAILURE;
        }
    };
    let mut sink = CsvSink::new(config.output.clone());

    match elog_sampler::run(&config, source.as_mut(), &mut sink, || {
        handler.shutdown_requested()
    }) {
        Ok(stats) => {
            if stats.is_degraded() {
                warn!(
                    read_failures = stats.read_failures,
                    write_failures = stats.write_failures,
                    "Run degraded: some samples were lost"
                );
            }
            info!(
                attempted = stats.attempted,
                recorded = stats.recorded,
                wraparounds = stats.wraparounds,
                consumed_uj = ?stats.consumed_uj(),
                elapsed_secs = stats.elapsed.as_secs_f64(),
                signals = handler.signal_count(),
                "Sampling run complete"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Sampling run failed");
            ExitCode::FAILURE
        }
    }
}

/// Initialize logging with the specified log level.
fn init_logging(level: &str) {
    let filter = format!(
        "elog_daemon={level},elog_sampler={level},elog_counter={level},elog_common={level}"
    );

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&filter)),
        )
        .with_target(true)
        .init();
}

/// Load configuration, apply CLI overrides, and validate.
fn resolve_config(args: &Args) -> Result<SamplerConfig> {
    let mut config = load_config(args)?;
    apply_overrides(&mut config, args);
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Load configuration from file or use defaults.
///
/// Resolution priority (first existing file wins):
/// 1. Command-line `--config` argument
/// 2. `ELOG_CONFIG_PATH` environment variable
/// 3. `/etc/elog/config.toml` (system path)
/// 4. `config/default.toml` (local development)
/// 5. Built-in defaults
fn load_config(args: &Args) -> Result<SamplerConfig> {
    if let Some(config_path) = &args.config {
        info!(?config_path, "Loading config from command-line argument");
        return SamplerConfig::from_file(config_path)
            .with_context(|| format!("Failed to load config from {config_path:?}"));
    }

    if let Ok(env_path) = std::env::var("ELOG_CONFIG_PATH") {
        let config_path = PathBuf::from(&env_path);
        if config_path.exists() {
            info!(?config_path, "Loading config from ELOG_CONFIG_PATH");
            return SamplerConfig::from_file(&config_path).with_context(|| {
                format!("Failed to load config from ELOG_CONFIG_PATH={env_path:?}")
            });
        }
        warn!(
            path = %env_path,
            "ELOG_CONFIG_PATH set but file does not exist, checking other locations"
        );
    }

    let system_path = PathBuf::from("/etc/elog/config.toml");
    if system_path.exists() {
        info!(?system_path, "Loading config from system path");
        return SamplerConfig::from_file(&system_path)
            .with_context(|| format!("Failed to load config from {system_path:?}"));
    }

    let local_path = PathBuf::from("config/default.toml");
    if local_path.exists() {
        info!(?local_path, "Loading config from local path");
        return SamplerConfig::from_file(&local_path)
            .with_context(|| format!("Failed to load config from {local_path:?}"));
    }

    info!("No config file found, using built-in defaults");
    Ok(SamplerConfig::default())
}

/// Apply command-line overrides onto the loaded configuration.
fn apply_overrides(config: &mut SamplerConfig, args: &Args) {
    if let Some(secs) = args.duration {
        config.duration = std::time::Duration::from_secs(secs);
    }
    if let Some(output) = &args.output {
        config.output = output.clone();
    }
    if args.proxy {
        config.source = SourceKind::Proxy;
    }
}

/// Create the counter source selected by the configuration.
fn create_source(config: &SamplerConfig) -> Result<Box<dyn CounterSource>> {
    match config.source {
        SourceKind::Proxy => {
            info!(command = %config.proxy.command, "Using subprocess-proxy counter");
            Ok(Box::new(ProxyCounter::new(&config.proxy, config.duration)))
        }
        SourceKind::Perf => {
            #[cfg(target_os = "linux")]
            {
                info!(cpu = config.counter.cpu, "Using direct kernel counter");
                Ok(Box::new(elog_counter::DirectCounter::new(
                    config.counter.clone(),
                )))
            }
            #[cfg(not(target_os = "linux"))]
            {
                anyhow::bail!("the direct kernel counter requires Linux; use --proxy")
            }
        }
    }
}
