//! Rackopt Gateway
//!
//! Front-line service: accepts file uploads, packs them into one archive,
//! stores it in the bucket and asks the worker to optimize it.

mod api;
mod config;

use anyhow::{Context, Result};
use rackopt_client::OptimizationClient;
use rackopt_io::{ArchiveCodec, Metrics, Storage, StorageBackend};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api::AppState;
use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rackopt_gateway=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Rackopt Gateway");

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate()?;
    info!(
        "Loaded configuration: worker_url={}, max_upload_bytes={}",
        config.worker_url, config.max_upload_bytes
    );

    let storage = Storage::connect(
        config.storage_kind,
        &config.storage_bucket,
        config.storage_region.as_deref(),
        config.storage_endpoint.as_deref(),
    )
    .await
    .context("Failed to initialize storage")?;
    info!(
        "Storage initialized: kind={:?}, bucket={}",
        storage.kind(),
        config.storage_bucket
    );
    let storage: Arc<dyn StorageBackend> = Arc::new(storage);

    let state = AppState {
        storage,
        worker: OptimizationClient::new(config.worker_url.clone()),
        archive: ArchiveCodec::default(),
        env_base_dir: config.env_base_dir.clone(),
        metrics: Metrics::new().context("Failed to register metrics")?,
    };
    let app = api::create_router(state, config.max_upload_bytes);

    info!("Listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
