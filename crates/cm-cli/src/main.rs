//! Commesse command-line front end

use std::process::ExitCode;

use clap::Parser;
use cm_core::config::{AppConfig, LoggingConfig};
use cm_core::error::CmError;
use cm_services::Commesse;
use tracing::{debug, error};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli;
mod commands;
mod render;

use cli::Cli;
use commands::Runner;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = match AppConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Configurazione non valida: {}", err);
            return ExitCode::from(exit_code(&CmError::from(err)));
        }
    };
    if let Some(dir) = cli.data_dir.clone() {
        config.storage.data_dir = dir;
    }

    init_tracing(&config.logging);
    debug!(
        version = env!("CARGO_PKG_VERSION"),
        data_dir = %config.storage.data_dir.display(),
        layout = ?config.storage.layout,
        "Starting commesse"
    );

    match run(cli, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "Command failed");
            eprintln!("Errore: {:#}", err);
            let code = err.downcast_ref::<CmError>().map(exit_code).unwrap_or(1);
            ExitCode::from(code)
        }
    }
}

async fn run(cli: Cli, config: &AppConfig) -> anyhow::Result<()> {
    let (app, report) = Commesse::open(config).await?;
    Runner::new(&app, report).run(cli.command).await
}

fn exit_code(err: &CmError) -> u8 {
    u8::try_from(err.exit_code()).unwrap_or(1)
}

/// Logs go to stderr; stdout carries command output
fn init_tracing(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter));
    let registry = tracing_subscriber::registry().with(filter);

    if config.json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}
