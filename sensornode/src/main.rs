//! SensorNode host runtime
//!
//! Samples the channels every period, appends a record to the log under the
//! storage mount point and forwards the newest sample to the telemetry
//! endpoint on its own cadence.
//!
//! # Usage
//!
//! ```bash
//! # Defaults: 2 s period, logs under /sdcard, ThingSpeak endpoint
//! sensornode
//!
//! # Load a JSON configuration and override the mount point
//! sensornode --config node.json --mount-point ./card
//!
//! # Run for one minute, then stop and unmount storage
//! sensornode --period 1 --run-for 60 --verbose
//! ```
//!
//! Any initialization failure (configuration, timer, storage mount, channel
//! setup) is logged and ends the process with a non-zero status before the
//! tasks start.

mod channels;

use std::io;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::Parser;
use sensornode_connectors::{ConnectorError, TcpConfig, TcpTransport};
use sensornode_core::config::ConfigError;
use sensornode_core::runtime::run_node;
use sensornode_core::{
    AcquisitionTask, ChannelReader, DirectoryStorage, InitError, LogStorage, NodeConfig, NodeContext,
    PeriodicTimer, ReportingTask, ThreadWaker,
};
use thiserror::Error;

use crate::channels::SimulatedChannels;

// =============================================================================
// CLI Argument Structure
// =============================================================================

/// SensorNode - periodic acquisition with local logging and telemetry
#[derive(Parser, Debug)]
#[command(name = "sensornode")]
#[command(version)]
#[command(about = "Sample channels periodically, log locally, report remotely", long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Sampling period in seconds
    #[arg(short, long, value_name = "SECS")]
    period: Option<u32>,

    /// Directory the log storage is mounted at
    #[arg(short, long, value_name = "DIR")]
    mount_point: Option<PathBuf>,

    /// Stop after this many seconds and unmount storage
    #[arg(long, value_name = "SECS")]
    run_for: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Fatal start-up errors
#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Init(#[from] InitError),

    #[error(transparent)]
    Transport(#[from] ConnectorError),

    #[error("Cannot start pipeline threads: {0}")]
    Spawn(#[from] io::Error),
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(&cli) {
        log::error!("{e}");
        process::exit(1);
    }
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Warn)
        .filter_module("sensornode", level)
        .filter_module("sensornode_core", level)
        .filter_module("sensornode_connectors", level)
        .init();
}

/// Configuration file (or defaults) with command-line overrides applied
fn load_config(cli: &Cli) -> Result<NodeConfig, AppError> {
    let mut config = match &cli.config {
        Some(path) => NodeConfig::from_json_file(path)?,
        None => NodeConfig::default(),
    };

    if let Some(period) = cli.period {
        config.trigger.period_secs = period;
    }
    if let Some(mount_point) = &cli.mount_point {
        config.storage.mount_point = mount_point.clone();
    }

    config.validate()?;
    Ok(config)
}

fn run(cli: &Cli) -> Result<(), AppError> {
    let config = load_config(cli)?;

    // Initialization: any failure here ends the process
    let timer = PeriodicTimer::new(&config.trigger.timer_config())?;

    let mut channels = SimulatedChannels::new();
    channels.setup()?;

    let mut storage = DirectoryStorage::new(&config.storage.mount_point);
    storage.mount()?;

    let transport = TcpTransport::new(
        TcpConfig::new()
            .connect_timeout(config.transport.connect_timeout())
            .receive_timeout(config.transport.receive_timeout()),
    )?;

    if config.endpoint.api_key.is_empty() {
        log::warn!("No telemetry write key configured, the endpoint may reject updates");
    }

    // Steady state
    let context = NodeContext::new(ThreadWaker::new(), config.mailbox.mailbox_config());
    let acquisition = AcquisitionTask::new(&context, channels, storage, &config.storage.log_name)
        .with_format(config.storage.format);
    let reporting = ReportingTask::new(&context, transport, config.endpoint.endpoint())
        .with_policy(config.backoff.policy())
        .with_startup_delay(config.reporting.startup_delay());

    log::info!(
        "SensorNode {} started: period {} s, log {}",
        sensornode_core::VERSION,
        config.trigger.period_secs,
        config.storage.mount_point.join(&config.storage.log_name).display()
    );

    let run_for = cli.run_for.map(Duration::from_secs);
    let (acquisition, reporting) = run_node(&context, timer, acquisition, reporting, run_for)?;

    let stats = acquisition.stats();
    let (_, mut storage) = acquisition.into_parts();
    storage.unmount();

    log::info!(
        "Stopped: {} cycles, {} records, {} log failures, {} delivered, {} failed",
        stats.cycles,
        stats.records_written,
        stats.log_failures,
        reporting.stats().delivered,
        reporting.transport().stats().failed
    );
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
