//! Paytoe server binary.

use anyhow::{Context, Result};
use clap::Parser;
use paytoe_server::cli::{Cli, Command};
use paytoe_server::payment::{Facilitator, HttpFacilitator, PaymentGate, build_payment_required};
use paytoe_server::session::{InMemorySessionStore, SessionStore, WalletLocks, spawn_sweeper};
use paytoe_server::{ServerConfig, build_app};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,paytoe_server=debug,tower_http=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve { config, host, port } => serve(config, host, port).await,
        Command::Requirements { config } => print_requirements(config),
    }
}

/// Prints the advertised requirement as JSON.
fn print_requirements(config_path: Option<PathBuf>) -> Result<()> {
    let config = ServerConfig::load(config_path.as_deref())?;
    let required = build_payment_required(&config)?;
    println!("{}", serde_json::to_string_pretty(&required)?);
    Ok(())
}

/// Runs the HTTP server until Ctrl-C.
#[instrument]
async fn serve(config_path: Option<PathBuf>, host: Option<String>, port: Option<u16>) -> Result<()> {
    let config = ServerConfig::load(config_path.as_deref())?.with_bind(host, port);
    info!(
        network = %config.network(),
        price_usdc = %config.price_usdc(),
        pay_to = %config.pay_to(),
        facilitator = %config.facilitator_url(),
        "Starting paytoe server"
    );

    let facilitator: Arc<dyn Facilitator> = Arc::new(HttpFacilitator::new(
        config.facilitator_url(),
        config.facilitator_timeout(),
    )?);
    let gate = PaymentGate::initialize(&config, facilitator)
        .await
        .context("Payment facilitator is unavailable")?;

    let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new(config.session_ttl()));
    let locks = WalletLocks::new();
    let sweeper = spawn_sweeper(Arc::clone(&store), locks.clone(), config.sweep_interval());

    let app = build_app(&config, store, locks, gate);

    let addr = format!("{}:{}", config.host(), config.port());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(addr = %addr, "Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => warn!(error = %e, "Failed to listen for Ctrl-C"),
    }
}
