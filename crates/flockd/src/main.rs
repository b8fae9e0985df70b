//! flockd — the flock fleet manager daemon.
//!
//! Single binary that assembles the subsystems:
//! - Compute provider (HTTP provisioner client)
//! - Server manager + autoscaling control loop
//! - Directory REST API
//!
//! # Usage
//!
//! ```text
//! flockd --config /etc/flock/flock.toml --port 8080
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::watch;
use tracing::{info, warn};

use flock_compute::HttpProvider;
use flock_core::FlockConfig;
use flock_pool::ServerManager;

#[derive(Parser)]
#[command(name = "flockd", about = "flock fleet manager daemon")]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, default_value = "flock.toml")]
    config: PathBuf,

    /// Override the directory listen port.
    #[arg(long)]
    port: Option<u16>,

    /// Override the backup address handed out when the pool is empty.
    #[arg(long)]
    backup_address: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,flockd=debug,flock=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    // Config contract violations (margin ordering) are fatal here, before
    // any subsystem starts.
    let mut config = if cli.config.exists() {
        FlockConfig::from_file(&cli.config)?
    } else {
        warn!(path = ?cli.config, "config file not found, using defaults");
        FlockConfig::default()
    };
    if let Some(port) = cli.port {
        config.directory.listen_port = port;
    }
    if let Some(backup) = cli.backup_address {
        config.directory.backup_address = backup;
    }
    config.validate()?;

    info!("flock daemon starting");

    // ── Initialize subsystems ──────────────────────────────────

    let compute = Arc::new(HttpProvider::new(
        config.compute.endpoint.clone(),
        config.compute.provision_timeout(),
    ));
    info!(endpoint = %config.compute.endpoint, "compute provider initialized");

    let manager = ServerManager::init(&config, compute)?;
    info!(
        upscale = config.scaling.upscale_margin,
        downscale = config.scaling.downscale_margin,
        "server manager initialized"
    );

    // Adopt instances already running at the provider. A failure here is
    // not fatal: the pool starts empty and the loop upscales as needed.
    if let Err(e) = manager.adopt_running().await {
        warn!(error = %e, "could not adopt running servers");
    }

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Start the control loop ─────────────────────────────────

    let loop_handle = tokio::spawn(manager.clone().run(shutdown_rx));

    // ── Start the directory API ────────────────────────────────

    let router = flock_api::build_router(manager);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.directory.listen_port));

    info!(%addr, "directory API starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Graceful shutdown on Ctrl-C.
    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C handler");
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    server.await?;

    // Wait for the control loop to finish its cycle.
    let _ = loop_handle.await;

    info!("flock daemon stopped");
    Ok(())
}
