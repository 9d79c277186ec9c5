//! Read-only control surface (spec §6): a small axum router exposing the
//! current Download/Account state for operational visibility. Non-goal:
//! no mutating endpoints — enqueueing, cancelling, or otherwise changing
//! state only ever happens through the claim protocol in [`crate::orchestrator`].
//!
//! Grounded on the teacher's `api/mod.rs` (the `Router`/`AppState`/
//! tower-http tracing-layer wiring, and `start_api_server`'s
//! bind-and-serve shape); the teacher's OpenAPI surface, auth middleware,
//! and rate limiting are dropped along with the NZB-era routes they
//! guarded — there is nothing left to authenticate or rate-limit once the
//! surface is three read-only `GET`s.

pub mod error_response;
pub mod routes;
pub mod state;

pub use state::AppState;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Build the router. Exposed separately from [`start_api_server`] so tests
/// can drive it with `tower::ServiceExt::oneshot` without binding a socket.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/downloads", get(routes::list_downloads))
        .route("/accounts", get(routes::list_accounts))
        .route("/health", get(routes::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve the control surface until the process exits. Blocking;
/// callers spawn this as a background task alongside the heartbeat/reaper
/// loops (§9 "Global state").
pub async fn start_api_server(store: crate::store::Store, worker_id: Arc<str>, bind_address: &str) -> crate::Result<()> {
    let state = AppState::new(store, worker_id);
    let app = create_router(state);

    tracing::info!(address = %bind_address, "starting control surface");

    let listener = tokio::net::TcpListener::bind(bind_address)
        .await
        .map_err(crate::Error::Io)?;

    tracing::info!(address = %bind_address, "control surface listening");

    axum::serve(listener, app)
        .await
        .map_err(|e| crate::Error::Other(e.to_string()))?;

    tracing::info!("control surface stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn health_route_returns_200() {
        let store = Store::open_in_memory().await.unwrap();
        let router = create_router(AppState::new(store, Arc::from("worker-1")));

        let response = router
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn downloads_route_returns_200_when_empty() {
        let store = Store::open_in_memory().await.unwrap();
        let router = create_router(AppState::new(store, Arc::from("worker-1")));

        let response = router
            .oneshot(Request::builder().uri("/downloads").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
