//! icoproxy server entry point.
//!
//! Boots the HTTP favicon proxy. Logs are JSON on stderr.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use icoproxy_client::{FetchClient, FetchConfig, Orchestrator, ResolvePolicy};
use icoproxy_core::{AppConfig, MemoryStore, MetaStore, ResponseCache, SqliteStore, StoreBackend};

mod error;
mod handler;
mod routes;

const PURGE_INTERVAL: Duration = Duration::from_secs(3600);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;

    let (meta, cache) = open_stores(&config).await?;

    let fetcher = FetchClient::new(FetchConfig::from_app(&config))?;
    let orchestrator = Orchestrator::new(Arc::new(fetcher), ResolvePolicy::from_config(&config));
    let service = Arc::new(handler::FaviconService::new(
        meta.clone(),
        cache.clone(),
        orchestrator,
        handler::CachePolicy::from_config(&config),
    ));

    let shutdown = CancellationToken::new();
    let purge = tokio::spawn(purge_expired(meta, cache, shutdown.clone()));

    let app = routes::router(routes::AppState {
        service: service.clone(),
        api_key: config.api_key.clone().filter(|k| !k.is_empty()),
        require_same_origin: config.require_same_origin,
    });

    let addr = config.socket_addr()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, source_order = ?config.source_order, store = ?config.store_backend, "icoproxy listening");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    shutdown.cancel();
    service.shutdown().await;
    if let Err(e) = purge.await {
        tracing::warn!(error = %e, "purge task ended abnormally");
    }

    tracing::info!("icoproxy stopped");
    Ok(())
}

async fn open_stores(config: &AppConfig) -> Result<(Arc<dyn MetaStore>, Arc<dyn ResponseCache>)> {
    match config.store_backend {
        StoreBackend::Sqlite => {
            let db = SqliteStore::open(&config.db_path).await?;
            tracing::info!(path = %config.db_path.display(), "opened sqlite store");
            let meta: Arc<dyn MetaStore> = Arc::new(db.clone());
            let cache: Arc<dyn ResponseCache> = Arc::new(db);
            Ok((meta, cache))
        }
        StoreBackend::Memory => {
            let store = MemoryStore::new();
            let meta: Arc<dyn MetaStore> = Arc::new(store.clone());
            let cache: Arc<dyn ResponseCache> = Arc::new(store);
            Ok((meta, cache))
        }
    }
}

/// Periodically drop expired rows until `shutdown` fires.
async fn purge_expired(meta: Arc<dyn MetaStore>, cache: Arc<dyn ResponseCache>, shutdown: CancellationToken) {
    let mut ticker = tokio::time::interval(PURGE_INTERVAL);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        match meta.purge_expired_meta().await {
            Ok(n) => tracing::debug!(removed = n, "purged expired metadata"),
            Err(e) => tracing::warn!(error = %e, "metadata purge failed"),
        }
        match cache.purge_expired_responses().await {
            Ok(n) => tracing::debug!(removed = n, "purged expired responses"),
            Err(e) => tracing::warn!(error = %e, "response purge failed"),
        }
    }
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
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
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

    tracing::info!("shutdown signal received");
}
