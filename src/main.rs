use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tracing::{info, Level};
use tracing_subscriber;

use gatekeeper::admission::AdmissionController;
use gatekeeper::audit::{AuditSink, CsvFileStorage};
use gatekeeper::config::GatekeeperConfig;
use gatekeeper::http::{AppState, HttpServer};

#[derive(Parser, Debug)]
#[command(name = "gatekeeper")]
#[command(about = "Per-client request admission control service")]
struct Args {
    /// Path to a YAML configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// HTTP listen address
    #[arg(long)]
    listen_addr: Option<SocketAddr>,

    /// Admission window in seconds
    #[arg(long)]
    window_secs: Option<u64>,

    /// Maximum admitted requests per client per window
    #[arg(long)]
    limit: Option<u64>,

    /// Path of the audit log
    #[arg(long)]
    audit_log: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .init();

    info!("Starting Gatekeeper Admission Control Service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();

    // Load configuration: file, then environment, then CLI flags
    let mut config = GatekeeperConfig::load(args.config.as_deref())?;
    if let Some(listen_addr) = args.listen_addr {
        config.server.listen_addr = listen_addr;
    }
    if let Some(window_secs) = args.window_secs {
        config.admission.window_secs = window_secs;
    }
    if let Some(limit) = args.limit {
        config.admission.limit = limit;
    }
    if let Some(audit_log) = args.audit_log {
        config.server.audit_log_path = audit_log;
    }
    info!(
        listen_addr = %config.server.listen_addr,
        window_secs = config.admission.window_secs,
        limit = config.admission.limit,
        "Configuration loaded"
    );

    // Initialize the admission controller
    let controller = Arc::new(AdmissionController::new(
        config.admission.window(),
        config.admission.limit,
    ));
    info!("Admission controller initialized");

    // Start the audit writer
    let storage = CsvFileStorage::open(&config.server.audit_log_path)?;
    let (audit, audit_writer) = AuditSink::spawn(storage);

    // Create and start the HTTP server
    let state = Arc::new(AppState::new(controller, audit));
    let server = HttpServer::new(config.server.listen_addr, state);

    // Run the server with graceful shutdown on Ctrl+C
    server.serve_with_shutdown(shutdown_signal()).await?;

    // Let the audit writer drain what is still queued
    audit_writer.await?;

    info!("Gatekeeper Admission Control Service stopped");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
