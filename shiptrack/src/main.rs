mod config;
mod telemetry;

use clap::{Args, Parser};
use config::{Config, ConfigError};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "shiptrack", about = "Shipment tracking records kept in a spreadsheet")]
enum CliCommand {
    /// Run the tracking API
    Serve(ConfigArgs),
    /// Load and validate the config file, then exit
    CheckConfig(ConfigArgs),
}

#[derive(Args)]
struct ConfigArgs {
    #[arg(long, default_value = "shiptrack.yaml")]
    config: PathBuf,
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Validation(#[from] tracker::config::ValidationError),
    #[error(transparent)]
    Telemetry(#[from] telemetry::TelemetryError),
    #[error(transparent)]
    Tracker(#[from] tracker::TrackerError),
    #[error("could not start runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

fn main() -> Result<(), CliError> {
    let cli = CliCommand::parse();

    match cli {
        CliCommand::Serve(args) => {
            let config = Config::from_file(&args.config)?;
            let _sentry = telemetry::init_logging(&config.logging);
            telemetry::init_metrics(config.metrics.as_ref())?;

            tracing::info!(config = %args.config.display(), "Starting shiptrack");
            let rt = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            rt.block_on(tracker::run(config.tracker)).inspect_err(|e| {
                tracing::error!(error = %e, "shiptrack exited with an error");
            })?;
        }
        CliCommand::CheckConfig(args) => {
            let config = Config::from_file(&args.config)?;
            config.tracker.validate()?;
            println!("{} is valid", args.config.display());
        }
    }

    Ok(())
}
