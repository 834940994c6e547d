//! HTTP JSON API over the engine's command surface
//!
//! The daemon binary serves this router on `api.listen_addr`. Every route
//! maps onto one `MemoryEngine` operation; `/events` streams engine events
//! as server-sent events.

pub mod handlers;

use axum::{
    Router,
    routing::{get, post, put},
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::engine::MemoryEngine;
use crate::error::{CrossmemError, Result};

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<MemoryEngine>,
}

impl AppState {
    pub fn new(engine: Arc<MemoryEngine>) -> Self {
        Self { engine }
    }
}

/// Create the router with all routes configured
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/stats", get(handlers::stats_handler))
        .route(
            "/config",
            get(handlers::get_config_handler).put(handlers::update_config_handler),
        )
        .route("/gc", post(handlers::gc_handler))
        .route("/events", get(handlers::events_handler))
        .route("/similarity", get(handlers::similarity_handler))
        .route("/memories", post(handlers::store_memory_handler))
        .route("/memories/search", get(handlers::search_handler))
        .route("/memories/{id}", get(handlers::get_memory_handler))
        .route(
            "/memories/{id}/relevance",
            put(handlers::update_relevance_handler),
        )
        .route("/sessions/merge", post(handlers::merge_sessions_handler))
        .route(
            "/sessions/{session_id}",
            axum::routing::delete(handlers::clear_session_handler),
        )
        .route(
            "/sessions/{session_id}/memories",
            get(handlers::session_memories_handler),
        )
        .route(
            "/sessions/{session_id}/context",
            get(handlers::retrieve_context_handler),
        )
        .route(
            "/sessions/{session_id}/summaries",
            get(handlers::list_summaries_handler).post(handlers::create_summary_handler),
        )
        .route(
            "/sessions/{session_id}/transfer",
            post(handlers::transfer_handler),
        )
        .route(
            "/sessions/{session_id}/transfer/preview",
            post(handlers::preview_transfer_handler),
        )
        .route(
            "/sessions/{session_id}/recommendation",
            get(handlers::recommend_handler),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the API until `shutdown` resolves
pub async fn serve_with_shutdown<F>(
    engine: Arc<MemoryEngine>,
    config: &ApiConfig,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(Arc::new(AppState::new(engine))).layer(TimeoutLayer::new(
        Duration::from_secs(config.request_timeout_secs),
    ));

    let addr: SocketAddr = config
        .listen_addr
        .parse()
        .map_err(|e| CrossmemError::Config(format!("Invalid listen address: {e}")))?;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| CrossmemError::Api(format!("Failed to bind to {addr}: {e}")))?;
    tracing::info!("Listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| CrossmemError::Api(format!("Server error: {e}")))?;

    tracing::info!("API server shut down gracefully");
    Ok(())
}

/// Serve the API until Ctrl+C or SIGTERM
pub async fn serve(engine: Arc<MemoryEngine>, config: &ApiConfig) -> Result<()> {
    serve_with_shutdown(engine, config, shutdown_signal()).await
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        },
    }
}
