use anyhow::{Context as _, Result};
use clap::Parser;
use client_core::{login_with_retry, Connection};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod config;

use cli::{Cli, Command};
use config::{load_settings, Settings};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut settings = load_settings(cli.config.as_deref())?;
    cli.apply(&mut settings);

    if let Command::Context(command) = cli.command {
        return commands::context(command);
    }

    let mut connection = connect(&settings).await?;
    commands::run_session(&mut connection, cli.command).await
}

/// Logs in when credentials are configured; otherwise talks to the server
/// anonymously.
async fn connect(settings: &Settings) -> Result<Connection> {
    match settings.credentials() {
        Some((email, password)) => login_with_retry(
            &settings.server_url,
            email,
            password,
            &settings.retry_policy(),
        )
        .await
        .with_context(|| format!("failed to log in to {}", settings.server_url)),
        None => {
            info!(server = %settings.server_url, "no credentials configured; continuing anonymously");
            Ok(Connection::new(settings.server_url.as_str())?)
        }
    }
}
