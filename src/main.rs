mod api;
mod config;
mod error;
mod identity_store;
mod media_files;
mod media_store;
mod tweet_store;
mod workflow;

use anyhow::{Context, Result};
use api::{start_api_server, AppState};
use config::Config;
use identity_store::IdentityStore;
use media_files::MediaFiles;
use media_store::MediaStore;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use tweet_store::TweetStore;
use workflow::TweetWorkflow;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load().context("Failed to load configuration")?;

    // Initialize logging
    init_tracing(&config.service.log_level);

    info!(
        service = %config.service.name,
        "Starting Chirp Service"
    );

    // Initialize metrics
    init_metrics(config.service.metrics_port)?;

    // Connect to PostgreSQL; the pool is the one process-wide handle to the
    // persistence engine and is closed explicitly on shutdown.
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(config.db_connect_timeout())
        .idle_timeout(Some(config.db_idle_timeout()))
        .connect(&config.database.url)
        .await
        .context("Failed to connect to PostgreSQL")?;

    info!("Connected to PostgreSQL database");

    // Run migrations if enabled
    if config.database.run_migrations {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("Failed to run database migrations")?;
        info!("Database migrations completed");
    }

    // Initialize components
    let identity = Arc::new(IdentityStore::new(pool.clone()));
    let tweets = Arc::new(TweetStore::new(pool.clone()));
    let media = Arc::new(MediaStore::new(pool.clone()));

    let files = Arc::new(MediaFiles::new(config.media.media_dir.clone()));
    files
        .ensure_dir()
        .await
        .context("Failed to prepare media directory")?;

    let workflow = Arc::new(TweetWorkflow::new(
        identity.clone(),
        tweets.clone(),
        media.clone(),
        files.clone(),
        pool.clone(),
    ));

    // Create API state
    let api_state = AppState {
        workflow,
        identity,
        static_dir: config.media.static_dir.clone(),
        max_upload_bytes: config.media.max_upload_bytes,
    };

    // Spawn API server task
    let api_config = config.api.clone();
    let api_handle = tokio::spawn(async move {
        if let Err(e) = start_api_server(api_state, &api_config).await {
            error!(error = %e, "API server error");
        }
    });

    info!("Chirp service started successfully");

    // Wait for shutdown signal
    shutdown_signal().await;

    info!("Shutting down chirp service");

    api_handle.abort();
    pool.close().await;

    info!("Chirp service stopped");

    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().json())
        .init();
}

/// Initialize Prometheus metrics exporter
fn init_metrics(port: u16) -> Result<()> {
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new();

    builder
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("Failed to install Prometheus metrics exporter")?;

    info!(port = port, "Prometheus metrics exporter started");

    Ok(())
}

/// Wait for shutdown signal (SIGINT or SIGTERM)
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
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}
