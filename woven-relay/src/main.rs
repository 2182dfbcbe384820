//! Woven Relay Server
//!
//! Hosts the access request state machine for paired devices. The relay
//! sees requester public keys and sealed approval payloads only; vault keys
//! and key shares never reach it in the clear.
//!
//! # Expiry
//!
//! Requests expire lazily on every read and write. A background sweep only
//! deletes resolved requests once they are older than the retention window.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use woven_custody::access::{AccessRequestMachine, MemoryRequestStore, TracingNotifier};
use woven_custody::clock::SystemClock;
use woven_custody::config::RequestSettings;
use woven_relay::{router, DirectoryFile, RelayState};

/// Woven Relay Server
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Address to serve the HTTP API on
    #[arg(short, long, default_value = "0.0.0.0:8080")]
    listen: SocketAddr,

    /// JSON file with bearer tokens and vault memberships
    #[arg(long, default_value = "directory.json")]
    directory: PathBuf,

    /// Lifetime of a pending access request in seconds
    #[arg(long, default_value = "300")]
    request_ttl_secs: u64,

    /// How long resolved requests are kept, in seconds
    #[arg(long, default_value = "86400")]
    retention_secs: u64,

    /// Interval between retention sweeps, in seconds
    #[arg(long, default_value = "600")]
    sweep_interval_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("woven_relay=info".parse()?)
                .add_directive("woven_custody=info".parse()?),
        )
        .init();

    let args = Args::parse();

    info!("Starting Woven Relay Server");
    info!("Request TTL: {}s, retention: {}s", args.request_ttl_secs, args.retention_secs);

    let (tokens, vaults) = DirectoryFile::load(&args.directory)?.into_parts();
    if vaults.is_empty() {
        warn!("Directory {:?} lists no vaults; every request will be rejected", args.directory);
    }

    let settings = RequestSettings {
        request_ttl_secs: args.request_ttl_secs,
        retention_secs: args.retention_secs,
    };
    let retention = settings.retention();
    let machine = Arc::new(AccessRequestMachine::new(
        Arc::new(MemoryRequestStore::new()),
        Arc::new(vaults),
        Arc::new(TracingNotifier),
        Arc::new(SystemClock),
        settings,
    ));

    // Retention sweep
    let sweeper = machine.clone();
    let sweep_every = Duration::from_secs(args.sweep_interval_secs.max(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_every);
        loop {
            ticker.tick().await;
            if let Err(e) = sweeper.purge_resolved(retention).await {
                warn!("Retention sweep failed: {}", e);
            }
        }
    });

    let listener = tokio::net::TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("Failed to bind {}", args.listen))?;
    info!("Relay listening on {}", args.listen);

    axum::serve(listener, router(RelayState::new(machine, tokens)))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
        .context("Relay server error")?;

    Ok(())
}
