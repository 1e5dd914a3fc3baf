//! Mowerlink - Main Entry Point

use clap::Parser;
use mowerlink::auth::{Bootstrap, BootstrapOrchestrator};
use mowerlink::config::{BridgeConfig, BridgePaths};
use mowerlink::observability::init_cli_logging;
use mowerlink::session::BrokerSession;
use std::path::PathBuf;
use std::process;
use tracing::{error, info};

/// Bridge between the mower vendor cloud and local files
#[derive(Parser)]
#[command(name = "mowerlink")]
#[command(about = "Telemetry and command bridge for cloud-connected robotic mowers")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    debug: bool,

    /// Telemetry CSV destination (defaults to telemetry.csv)
    #[arg(short, long, value_name = "FILE")]
    log: Option<PathBuf>,

    /// Fetch one API path (e.g. users/me) with a fresh token, print the
    /// JSON response and exit without connecting to the broker
    #[arg(short = 'w', long, value_name = "PATH")]
    inspect: Option<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_cli_logging(cli.debug);

    info!("Starting mowerlink v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_configuration(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = run_bridge(config, cli.log, cli.inspect.as_deref()).await {
        error!("Bridge failed: {}", e);
        process::exit(1);
    }

    info!("Shutdown complete");
}

fn load_configuration(config_path: &Option<PathBuf>) -> mowerlink::BridgeResult<BridgeConfig> {
    match config_path {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            Ok(BridgeConfig::load_from_file(path)?)
        }
        None => {
            let default_paths = ["mowerlink.toml", "config/mowerlink.toml"];

            for path_str in default_paths {
                let path = PathBuf::from(path_str);
                if path.exists() {
                    info!("Loading configuration from: {}", path.display());
                    return Ok(BridgeConfig::load_from_file(&path)?);
                }
            }

            // No silent no-op when the config is absent; report which
            // default was expected.
            Err(mowerlink::config::ConfigError::Missing(PathBuf::from(default_paths[0])).into())
        }
    }
}

async fn run_bridge(
    config: BridgeConfig,
    telemetry_log: Option<PathBuf>,
    inspect: Option<&str>,
) -> mowerlink::BridgeResult<()> {
    let mut paths = BridgePaths::default();
    if let Some(log_path) = telemetry_log {
        paths = paths.with_telemetry_log(log_path);
    }

    let orchestrator = BootstrapOrchestrator::new(&config, paths.certificate.clone())?;

    let certificate = match orchestrator.run(inspect).await? {
        Bootstrap::Inspected(data) => {
            println!("{data:#}");
            return Ok(());
        }
        Bootstrap::Ready(certificate) => certificate,
    };

    let session = BrokerSession::connect(&config, &certificate, &paths)?;
    session.run().await?;
    Ok(())
}
