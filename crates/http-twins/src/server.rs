//! Axum HTTP server: router, listener, graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::config::TwinsConfig;
use crate::demo::{self, BookStore};
use crate::mirror::{mirror_requests, DirectiveTable, MirrorCoordinator, MirrorLayerState};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: TwinsConfig,
    pub coordinator: MirrorCoordinator,
    pub directives: Arc<DirectiveTable>,
    pub books: BookStore,
}

/// Build the application router.
///
/// The book routes sit behind the mirror middleware; operational endpoints
/// are never mirrored.
pub fn router(state: AppState) -> Router {
    let mirror_state = MirrorLayerState {
        coordinator: state.coordinator.clone(),
        directives: state.directives.clone(),
    };

    let mirrored = demo::router(state.books.clone()).route_layer(
        axum::middleware::from_fn_with_state(mirror_state, mirror_requests),
    );

    Router::new()
        .route("/health", get(handle_health))
        .route("/api/stats", get(handle_get_stats))
        .with_state(Arc::new(state))
        .merge(mirrored)
        .layer(TraceLayer::new_for_http())
}

/// Build and run the HTTP server.
pub async fn run(state: AppState) -> anyhow::Result<()> {
    let listen_addr = state.config.server.listen_address.clone();
    let drain = Duration::from_secs(state.config.mirror.drain_secs);
    let coordinator = state.coordinator.clone();

    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    tracing::info!(address = %listen_addr, "http-twins listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!(in_flight = coordinator.in_flight(), "Draining mirror dispatch");
    coordinator.drain(drain).await;

    tracing::info!("http-twins shut down gracefully");
    Ok(())
}

/// GET /api/stats — return mirror counters.
async fn handle_get_stats(State(state): State<Arc<AppState>>) -> Response {
    axum::Json(state.coordinator.stats().report()).into_response()
}

/// Health check endpoint.
async fn handle_health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Wait for SIGINT (Ctrl+C) for graceful shutdown.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install CTRL+C signal handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, draining connections...");
}
