mod cli;
mod commands;
mod config;
mod error;
mod inventory;
mod models;
mod provision;
mod transcript;
mod transport;
mod utils;

use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::Settings;

/// Configure Cisco access switches over their serial consoles
#[derive(Parser, Debug)]
#[command(name = "switch-provisioner", version, about)]
struct Cli {
    #[command(subcommand)]
    command: cli::Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();

    // Logs go to stderr so rendered sequences on stdout stay clean
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "switch_provisioner=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let settings = Settings::load();
    tracing::debug!("Settings: {:?}", settings);

    if cli::dispatch(cli.command, settings).await? {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
