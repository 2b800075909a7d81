use std::io;
use std::process::ExitCode;

use anyhow::{anyhow, Result};
use arbiter_cli::{logging_config, run, Cli};
use arbiter_core::config::{AppConfig, LogFormat};
use clap::Parser;
use tracing::Level;

fn init_logging(config: &AppConfig) -> Result<()> {
    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    let builder = tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_target(false)
        .with_max_level(log_level);
    let installed = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|error| anyhow!("failed to initialise logging: {error}"))
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(&logging_config(&cli))?;
    Ok(run(cli))
}
