use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use relay3d_core::{
    create_blob_store, load_config, validate_config, GradioClient, HttpImageSource,
    ImageSource, InferenceClient, Orchestrator,
};
use relay3d_server::api::create_router;
use relay3d_server::state::AppState;

/// How long shutdown waits for detached mesh extractions.
const MESH_DRAIN_TIMEOUT: Duration = Duration::from_secs(660);

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("RELAY3D_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Inference space: {}", config.inference.url);
    info!("Storage backend: {:?}", config.storage.backend);

    // Create inference client
    let inference: Arc<dyn InferenceClient> = Arc::new(
        GradioClient::new(config.inference.clone()).context("Failed to create inference client")?,
    );

    // Create blob store
    let store = create_blob_store(&config.storage)
        .await
        .context("Failed to create blob store")?;
    info!("Using blob store: {}", store.name());

    // Create image source
    let source: Arc<dyn ImageSource> = Arc::new(
        HttpImageSource::new(&config.download).context("Failed to create image source")?,
    );

    let orchestrator = Orchestrator::new(&config, inference, store, source);

    // Create app state
    let state = Arc::new(AppState::new(config.clone(), orchestrator));

    // Create router
    let app = create_router(Arc::clone(&state));

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    if tokio::time::timeout(MESH_DRAIN_TIMEOUT, state.drain_mesh_extractions())
        .await
        .is_err()
    {
        warn!("Gave up waiting for mesh extractions");
    }

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
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
}
