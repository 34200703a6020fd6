//! Two-stage code generation gateway.
//!
//! A request (`message`, `code_language`) is first decomposed into a
//! numbered plan by the inference backend, then turned into source code by a
//! second call that sees the plan. `pipeline` holds the core; the rest is the
//! HTTP gateway around it.

pub mod backend;
pub mod config;
pub mod error;
pub mod handlers;
pub mod inference;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod state;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/api/generate", post(handlers::generate_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(state)
}
