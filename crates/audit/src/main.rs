//! Audit service binary: serves the repository audit query endpoint.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use audit::config::Config;
use audit::server::{build_router, AppState};

/// GitHub repository audit service.
#[derive(Parser)]
#[command(name = "audit")]
#[command(about = "GitHub repository audit service")]
#[command(version)]
struct Cli {
    /// Port to listen on (overrides AUDIT_PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Root directory for per-query workspaces (overrides AUDIT_WORK_ROOT)
    #[arg(long)]
    work_root: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    let mut config = Config::default();
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(work_root) = cli.work_root {
        config.work_root = work_root;
    }

    info!("Starting audit service v{}", env!("CARGO_PKG_VERSION"));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let app = build_router(AppState { config });

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Audit HTTP server listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Audit service stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully");
        },
        () = terminate => {
            info!("Received terminate signal, shutting down gracefully");
        },
    }
}
