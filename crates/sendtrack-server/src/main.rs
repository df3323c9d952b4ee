//! `SendTrack` Server
//!
//! Serves the dashboard API over the local cache and syncs it from the
//! remote Sendy database on demand or on a fixed interval.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};

use sendtrack_core::config::{self, Config};
use sendtrack_core::tracing_init::init_tracing;
use sendtrack_server::{AppState, build_router, scheduler};
use sendtrack_sync::{LocalStore, MySqlSource, SyncLimits, SyncService};

#[derive(Parser, Debug)]
#[command(name = "sendtrack-server")]
#[command(version, about = "SendTrack server - Sendy sync engine and dashboard API")]
struct Args {
    /// Address to listen on (overrides `server.addr`).
    #[arg(long, env = "SENDTRACK_ADDR")]
    addr: Option<SocketAddr>,

    /// Path to the local cache database.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Explicit config file, merged over the global one.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Sync every N seconds in the background.
    #[arg(long)]
    sync_interval: Option<u64>,

    /// Run a single sync, print the outcome as JSON and exit.
    #[arg(long)]
    sync_once: bool,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long)]
    log_json: bool,
}

fn resolve_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = config::load_config(args.config.as_deref())?;
    if let Some(addr) = args.addr {
        config.server.addr = addr.to_string();
    }
    if let Some(path) = &args.db_path {
        config.local.database_path = Some(path.clone());
    }
    if let Some(secs) = args.sync_interval {
        config.sync.interval_secs = Some(secs);
    }
    if args.log_json {
        config.server.log_json = true;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = resolve_config(&args)?;

    init_tracing(
        "sendtrack_server=info,sendtrack_sync=info",
        config.server.log_json,
    );

    info!(
        version = env!("CARGO_PKG_VERSION"),
        remote = ?config.remote,
        "Starting sendtrack-server"
    );

    config.validate_for_sync()?;

    let db_path = config
        .local
        .database_path
        .clone()
        .or_else(config::database_path)
        .context("Cannot determine local cache path; pass --db-path")?;
    info!(path = %db_path.display(), "Opening local cache");
    let store = LocalStore::open(&db_path).await?;

    let remote = MySqlSource::connect_lazy(&config.remote);
    let service = SyncService::new(remote, store, SyncLimits::from(&config.sync));

    if args.sync_once {
        return sync_once(&service).await;
    }

    let state = AppState::new(service, config.sync.stale_after_secs);

    if let Some(secs) = config.sync.interval_secs {
        info!(interval_secs = secs, "Background sync enabled");
        scheduler::spawn(
            Arc::clone(&state.service),
            Arc::clone(&state.sync_lock),
            Duration::from_secs(secs),
        );
    }

    let addr: SocketAddr = config
        .server
        .addr
        .parse()
        .with_context(|| format!("Invalid listen address {}", config.server.addr))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "Listening");

    let app = build_router(state);
    tokio::select! {
        result = axum::serve(listener, app) => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    info!("sendtrack-server stopped");
    Ok(())
}

#[allow(clippy::print_stdout)]
async fn sync_once(service: &SyncService<MySqlSource>) -> anyhow::Result<()> {
    match service.run_sync().await {
        Ok(outcome) => {
            println!("{}", serde_json::to_string(&outcome)?);
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Sync failed");
            println!("{}", serde_json::json!({ "success": false, "error": e.to_string() }));
            Err(e.into())
        }
    }
}
