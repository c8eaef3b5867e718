use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use windowgate::config::{AppConfig, PolicyReloader};
use windowgate::http::HttpServer;
use windowgate::ratelimit::{AdmissionService, FixedWindowStore, PolicyHandle};

/// Fixed-window admission control over HTTP.
#[derive(Debug, Parser)]
#[command(name = "windowgate", version, about)]
struct Args {
    /// Configuration file (YAML, TOML or JSON); re-read periodically
    #[arg(short, long, env = "WINDOWGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address, overriding the configuration file
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match args.log_format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(true)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }

    info!("Starting Windowgate Admission Service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(listen) = args.listen {
        config.server.listen_addr = listen;
    }

    let policy = config.rate_limiting.policy();
    info!(
        listen_addr = %config.server.listen_addr,
        permit_limit = policy.permit_limit,
        time_window_secs = policy.time_window.as_secs(),
        "Configuration loaded"
    );

    let policy = PolicyHandle::new(policy);
    let store = Arc::new(FixedWindowStore::new());
    let service = Arc::new(AdmissionService::new(store, policy.clone()));
    info!("Admission service initialized");

    let reloader = args.config.map(|path| {
        let reloader = PolicyReloader::new(path, policy);
        tokio::spawn(reloader.run(config.rate_limiting.reload_interval()))
    });

    let server = HttpServer::new(config.server.listen_addr, service);

    // Run the server with graceful shutdown on Ctrl+C
    server.serve_with_shutdown(shutdown_signal()).await?;

    if let Some(reloader) = reloader {
        reloader.abort();
    }

    info!("Windowgate Admission Service stopped");
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
