//! `card-vault` — binary entry point.
//!
//! Startup sequence:
//! 1. Load and validate [`Config`] from environment variables.
//! 2. Initialise the telemetry pipeline (tracing, optional OTLP export).
//! 3. Resolve the encryption key; a missing or malformed key stops startup.
//! 4. Create the storage directory.
//! 5. Build the Axum router and serve until SIGINT or SIGTERM.

use anyhow::{Context, Result};
use tracing::info;

use card_vault::config::Config;
use card_vault::server::{self, middleware::Limits, state::AppState};
use card_vault::telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    // -----------------------------------------------------------------------
    // 1. Configuration
    // -----------------------------------------------------------------------
    let cfg = Config::from_env().map_err(|e| {
        // Telemetry is not yet up; write to stderr directly.
        eprintln!("ERROR: configuration invalid: {e:#}");
        e
    })?;

    // -----------------------------------------------------------------------
    // 2. Telemetry
    // -----------------------------------------------------------------------
    telemetry::init_telemetry(cfg.otel_exporter_otlp_endpoint.as_deref(), &cfg.log_level)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        listen_port = cfg.listen_port,
        storage_dir = %cfg.storage_dir,
        "card-vault starting"
    );

    // -----------------------------------------------------------------------
    // 3. Encryption key
    // -----------------------------------------------------------------------
    let key = cfg
        .encryption_key()
        .context("ENCRYPTION_KEY is not usable")?;

    // -----------------------------------------------------------------------
    // 4. Storage directory
    // -----------------------------------------------------------------------
    let storage_dir = cfg.storage_path();
    tokio::fs::create_dir_all(&storage_dir)
        .await
        .with_context(|| format!("failed to create storage dir {}", storage_dir.display()))?;

    // -----------------------------------------------------------------------
    // 5. HTTP server
    // -----------------------------------------------------------------------
    let state = AppState::new(key, storage_dir, cfg.stream_chunk_size);
    let limits = Limits {
        request_timeout: cfg.request_timeout(),
        max_upload_bytes: cfg.max_upload_bytes,
    };
    let router = server::router::build(state, limits);

    let addr: std::net::SocketAddr = ([0, 0, 0, 0], cfg.listen_port).into();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(addr = %addr, "listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("card-vault stopped");
    telemetry::shutdown_telemetry();
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
