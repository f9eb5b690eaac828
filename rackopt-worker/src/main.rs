//! Rackopt Worker
//!
//! Executes optimization jobs for archives already placed in the bucket.
//!
//! Architecture:
//! - Configuration: Load settings from environment variables
//! - Storage: Local folder or S3 bucket, resolved once at startup
//! - Pipeline: Environment, download, unpack, script, pack, upload
//! - API: Health check, the optimize endpoint and Prometheus metrics
//!
//! Each request runs its own job; jobs share nothing but the storage backend.

mod api;
mod config;
mod pipeline;
mod script;

use anyhow::{Context, Result};
use rackopt_io::{ArchiveCodec, Metrics, Storage, StorageBackend};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::pipeline::{OptimizationPipeline, Pipeline, PipelineSettings};
use crate::script::ScriptRunner;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rackopt_worker=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Rackopt Worker");

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate()?;

    let script_path = std::path::absolute(&config.script_path).with_context(|| {
        format!(
            "Failed to resolve script path '{}'",
            config.script_path.display()
        )
    })?;
    info!(
        "Loaded configuration: interpreter={}, script={}, timeout={:?}",
        config.interpreter,
        script_path.display(),
        config.script_timeout
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

    let metrics = Metrics::new().context("Failed to register metrics")?;

    let runner = ScriptRunner::new(
        config.interpreter.clone(),
        script_path,
        config.script_timeout,
    );
    let pipeline: Arc<dyn Pipeline> = Arc::new(OptimizationPipeline::new(
        storage,
        runner,
        ArchiveCodec::default(),
        PipelineSettings::from(&config),
        metrics.clone(),
    ));

    let app = api::create_router(pipeline, metrics);

    info!("Listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Worker stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
