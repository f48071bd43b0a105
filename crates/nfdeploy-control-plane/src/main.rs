//! nfdeploy Control Plane Server

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use nfdeploy_control_plane::config::{parse_env_pair, Config};
use nfdeploy_control_plane::http::create_router;
use nfdeploy_control_plane::AppState;

/// Control plane for deploying 5G network functions.
#[derive(Parser, Debug)]
#[command(name = "nfdeploy-control-plane", about = "5G deployment console backend")]
struct Args {
    /// HTTP server address
    #[arg(long, default_value = "[::1]:8186")]
    http_addr: String,

    /// Maximum simultaneously running actions (0 = unlimited)
    #[arg(long, default_value = "1")]
    max_concurrent: usize,

    /// Seconds between SIGTERM and SIGKILL when canceling
    #[arg(long, default_value = "10")]
    cancel_grace_secs: u64,

    /// Toolchain program that runs deployment targets
    #[arg(long, default_value = "make")]
    make_command: String,

    /// Deployment repository checkout the toolchain runs in
    #[arg(long, default_value = "aether-onramp")]
    onramp_dir: PathBuf,

    /// JSON file for action history (in-memory when omitted)
    #[arg(long)]
    store_path: Option<PathBuf>,

    /// Extra toolchain environment, repeatable (KEY=VALUE)
    #[arg(long = "env", value_parser = parse_env_pair)]
    env: Vec<(String, String)>,
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Self {
            http_addr: args.http_addr,
            max_concurrent: args.max_concurrent,
            cancel_grace_secs: args.cancel_grace_secs,
            make_command: args.make_command,
            onramp_dir: args.onramp_dir,
            store_path: args.store_path,
            toolchain_env: args.env.into_iter().collect(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("nfdeploy=info".parse()?))
        .with_target(true)
        .init();

    let config = Config::from(args);
    let http_addr: SocketAddr = config.http_addr.parse()?;

    if !config.onramp_dir.is_dir() {
        warn!(
            onramp_dir = %config.onramp_dir.display(),
            "Deployment repository not found; actions will fail until it exists"
        );
    }

    let state = AppState::from_config(&config).await?;

    info!(
        http_addr = %http_addr,
        max_concurrent = config.max_concurrent,
        make_command = %config.make_command,
        store = ?config.store_path,
        "Starting nfdeploy control plane"
    );

    let listener = TcpListener::bind(http_addr).await?;
    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("nfdeploy control plane stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
