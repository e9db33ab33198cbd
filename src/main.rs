use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use scribe_gateway::{create_router, AppState, Config};
use tracing::{info, warn};

/// Real-time medical transcription gateway
#[derive(Debug, Parser)]
#[command(name = "scribe-gateway", version)]
struct Cli {
    /// Path to the configuration file (without extension)
    #[arg(long, default_value = "config/scribe-gateway")]
    config: String,

    /// Override the HTTP bind address
    #[arg(long)]
    bind: Option<String>,

    /// Override the HTTP port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let mut config = Config::load(&cli.config)?;
    if let Some(bind) = cli.bind {
        config.service.http.bind = bind;
    }
    if let Some(port) = cli.port {
        config.service.http.port = port;
    }

    info!("{} starting", config.service.name);

    let backend_available = probe_backend(&config).await;
    let addr = format!("{}:{}", config.service.http.bind, config.service.http.port);

    let state = AppState::new(config, backend_available)
        .context("Failed to initialize application state")?;
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

/// Probe the recognition backend once at startup. Advisory only: sessions
/// re-attempt backend creation on every `ready`.
async fn probe_backend(config: &Config) -> bool {
    let Some(url) = &config.recognition.nats_url else {
        info!("no recognition backend configured; sessions will use the simulated recognizer");
        return false;
    };

    let timeout = Duration::from_millis(config.recognition.connect_timeout_ms);
    match tokio::time::timeout(timeout, async_nats::connect(url.as_str())).await {
        Ok(Ok(_)) => {
            info!("recognition backend reachable at {}", url);
            true
        }
        Ok(Err(e)) => {
            warn!("recognition backend unreachable at {}: {}", url, e);
            false
        }
        Err(_) => {
            warn!("timed out probing recognition backend at {}", url);
            false
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("shutdown signal received");
}
