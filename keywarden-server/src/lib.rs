//! HTTP access API for the Keywarden license key server.
//!
//! The router is built by [`build_router`] so tests can serve it on an
//! ephemeral port; the binary wires the same router to a configured port.
//! All state lives in an explicit [`AppState`] handed to axum, there are no
//! globals.

pub mod error;
pub mod handlers;

use axum::routing::{get, post};
use axum::Router;
use keywarden_engine::KeyService;
use std::sync::Arc;
use std::time::Duration;

/// Shared state for every handler, constructed once at startup.
#[derive(Clone)]
pub struct AppState {
    /// The lifecycle service all operations go through.
    pub service: Arc<KeyService>,
    /// Sweep interval, reported by the status endpoint.
    pub sweep_interval: Duration,
}

/// Build the HTTP API router with the given application state.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/v1/keys",
            get(handlers::list_keys)
                .post(handlers::create_key)
                .delete(handlers::purge_keys),
        )
        .route("/api/v1/keys/redeem", post(handlers::redeem_key))
        .route("/api/v1/keys/check", post(handlers::check_key))
        .route("/api/v1/status", get(handlers::service_status))
        .route("/health", get(handlers::health))
        .with_state(state)
}
