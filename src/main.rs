use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

mod config;
mod error;
mod handlers;
mod metrics;
mod middleware;
mod observability;
mod server;
mod source;
mod store;

use config::{Config, StorageBackend};
use metrics::sampler::Sampler;
use metrics::ConnectionChurnTracker;
use source::{MetricsSource, SystemSource};
use store::{MemoryStore, RedisStore, SampleStore};

/// Shared application state available to every handler via `State<Arc<AppState>>`.
pub struct AppState {
    /// Sample history; the sampler writes, history queries read.
    pub store: Arc<dyn SampleStore>,

    /// Live host readings for the realtime and connection endpoints.
    pub source: Arc<dyn MetricsSource>,

    /// Single process-wide churn baseline.
    pub churn: ConnectionChurnTracker,

    /// Trailing window used when a history query omits `minutes`.
    pub default_history_minutes: i64,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!(error = %e, "host-pulse exited with error");
        eprintln!("host-pulse: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // ── 1. Config & logging ─────────────────────────────────────
    let config = Config::load()?;
    observability::init_tracing(&config.log_level);
    info!(?config, "starting host-pulse");

    // ── 2. History store ────────────────────────────────────────
    let store: Arc<dyn SampleStore> = match config.storage {
        StorageBackend::Memory => Arc::new(MemoryStore::new()),
        StorageBackend::Redis => {
            Arc::new(RedisStore::connect(&config.redis_url, &config.redis_key_prefix).await?)
        }
    };

    // ── 3. Build shared state ───────────────────────────────────
    let source: Arc<dyn MetricsSource> = Arc::new(SystemSource::new());
    let state = Arc::new(AppState {
        store: store.clone(),
        source: source.clone(),
        churn: ConnectionChurnTracker::new(),
        default_history_minutes: config.default_history_minutes,
    });

    // ── 4. Background sampler ───────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sampler = Sampler::new(store, source, config.sample_interval()).spawn(shutdown_rx);

    // ── 5. Bind & serve ─────────────────────────────────────────
    let app = server::create_router(state, &config.static_dir);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %config.bind_addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // ── 6. Stop the sampler ─────────────────────────────────────
    let _ = shutdown_tx.send(true);
    if let Err(e) = sampler.await {
        error!(error = %e, "sampler task ended abnormally");
    }
    info!("shutdown complete");
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
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
                error!(error = %e, "failed to listen for SIGTERM");
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
