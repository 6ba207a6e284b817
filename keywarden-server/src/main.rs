//! Keywarden license key server.
//!
//! Issues license keys with usage limits and TTL expiry, redeems them
//! against hardware ids, and sweeps expired keys in the background.
//!
//! Usage:
//!   keywarden-server --port 8080 --db keywarden.db
//!
//! The store path can also come from the KEYWARDEN_DB environment variable.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use keywarden_engine::{KeyService, Sweeper, MIN_SWEEP_INTERVAL};
use keywarden_server::{build_router, AppState};
use keywarden_store::SqliteKeyStore;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "keywarden-server")]
#[command(about = "License key issuing and redemption server")]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Path to the SQLite key store
    #[arg(long, env = "KEYWARDEN_DB", default_value = "keywarden.db")]
    db: String,

    /// Seconds between expiry sweeps (floored at 1)
    #[arg(long, default_value = "60")]
    sweep_interval_secs: u64,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    info!("Keywarden starting...");
    let store = SqliteKeyStore::open(&args.db)
        .with_context(|| format!("failed to open key store at {}", args.db))?;
    let service = Arc::new(KeyService::new(Arc::new(store)));

    let sweep_interval =
        Duration::from_secs(args.sweep_interval_secs).max(MIN_SWEEP_INTERVAL);
    let sweeper = Sweeper::new(Arc::clone(&service), sweep_interval).spawn();

    let state = AppState {
        service,
        sweep_interval,
    };
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", args.port))
        .await
        .with_context(|| format!("failed to bind port {}", args.port))?;

    println!("\n========================================");
    println!("  Keywarden Running");
    println!("========================================");
    println!("  Port:           {}", args.port);
    println!("  Store:          {}", args.db);
    println!("  Sweep interval: {}s", sweep_interval.as_secs());
    println!("========================================\n");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    // Let the sweeper finish its current tick before exiting.
    info!("shutting down, stopping sweeper");
    sweeper.shutdown().await;
    info!("Keywarden stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
    }
}
