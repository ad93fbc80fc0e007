//! VSS actuator provider - main entry point

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use vss_actuator::config::ActuatorConfig;
use vss_actuator::error::{ActuatorError, ActuatorResult};
use vss_actuator::lifecycle::{self, ActuatorProvider};
use vss_actuator::link::LinkError;
use vss_actuator::locator::Locator;
use vss_actuator::observability::init_default_logging;
use vss_actuator::transport::mqtt::SessionState;

const DEFAULT_CONFIG_PATHS: &[&str] = &["actuator.toml", "config/actuator.toml"];

/// Bridges a digital output to a VSS signal on the bus
#[derive(Parser)]
#[command(name = "vss-actuator")]
#[command(about = "VSS actuator provider driving a digital output from bus commands")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the provider until SIGINT/SIGTERM or permanent link loss
    Run,
    /// Validate configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Validate a locator literal and print its parts
    CheckLocator {
        locator: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_default_logging(cli.verbose > 0);

    info!("Starting VSS actuator provider v{}", env!("CARGO_PKG_VERSION"));

    let result = match cli.command {
        Commands::CheckLocator { locator } => check_locator(&locator),
        Commands::Run => match load_configuration(&cli.config) {
            Ok(config) => run_provider(config).await,
            Err(e) => Err(e),
        },
        Commands::Config { show } => match load_configuration(&cli.config) {
            Ok(config) => handle_config_command(&config, show),
            Err(e) => Err(e),
        },
    };

    if let Err(e) = result {
        error!(kind = e.kind(), "Command failed: {}", e);
        process::exit(1);
    }

    info!("Application shutdown complete");
}

fn load_configuration(config_path: &Option<PathBuf>) -> ActuatorResult<ActuatorConfig> {
    let path = match config_path {
        Some(path) => path.clone(),
        None => match DEFAULT_CONFIG_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
        {
            Some(path) => path,
            None => {
                error!(
                    "No configuration file found. Please provide one with -c/--config or create actuator.toml"
                );
                process::exit(1);
            }
        },
    };

    info!("Loading configuration from: {}", path.display());
    Ok(ActuatorConfig::load_from_file(&path)?)
}

async fn run_provider(config: ActuatorConfig) -> ActuatorResult<()> {
    info!(device_id = %config.device.id, key_expr = %config.bus.key_expr, "Provider starting");

    let connectivity = lifecycle::connect_link(lifecycle::link_driver(&config)?, &config).await?;
    let output = lifecycle::open_output(&config)?;
    let session = lifecycle::open_session(&config).await?;
    tokio::spawn(log_session_state(session.state_receiver()));

    let provider = ActuatorProvider::start(session, &config.bus.key_expr, output).await?;

    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())
        .map_err(ActuatorError::Signal)?;
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
        .map_err(ActuatorError::Signal)?;

    info!("Provider is running and waiting for commands...");

    let link_lost = tokio::select! {
        _ = sigint.recv() => {
            info!("Received SIGINT, shutting down gracefully...");
            false
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down gracefully...");
            false
        }
        _ = connectivity.wait_exhausted() => {
            error!("Link permanently lost, shutting down provider...");
            true
        }
    };

    if let Err(e) = provider.shutdown().await {
        error!("Error during shutdown: {}", e);
        return Err(e);
    }

    if link_lost {
        return Err(LinkError::RetriesExhausted {
            max_retries: config.link.max_retries,
        }
        .into());
    }

    Ok(())
}

fn handle_config_command(config: &ActuatorConfig, show: bool) -> ActuatorResult<()> {
    if show {
        match toml::to_string_pretty(config) {
            Ok(rendered) => {
                println!("Current configuration:");
                println!("{rendered}");
            }
            Err(e) => warn!("Unable to render configuration: {}", e),
        }
    }

    info!("Configuration validation complete");
    Ok(())
}

fn check_locator(locator: &str) -> ActuatorResult<()> {
    match Locator::parse(locator)? {
        Some(parsed) => println!(
            "host={} port={} iface={}",
            parsed.host(),
            parsed.port(),
            parsed.iface()
        ),
        None => println!("empty locator: default endpoint will be used"),
    }
    Ok(())
}

/// Log every session state transition
async fn log_session_state(mut state_rx: watch::Receiver<SessionState>) {
    while state_rx.changed().await.is_ok() {
        let state = state_rx.borrow_and_update().clone();
        match state {
            SessionState::Connected => info!("Session connected"),
            SessionState::Disconnected(reason) => warn!(%reason, "Session disconnected"),
            SessionState::Closed => break,
            SessionState::Connecting => {}
        }
    }
}
