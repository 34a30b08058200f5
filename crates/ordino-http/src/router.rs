//! Router assembly and shared application state.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use ordino_core::{Orchestrator, Planner, RunStore, ToolRegistry};

use crate::handlers::{create_run, get_run, health_check, list_tools};

/// Shared dependencies injected into every handler.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ToolRegistry>,
    pub store: Arc<dyn RunStore>,
    pub planner: Arc<dyn Planner>,
    pub orchestrator: Arc<Orchestrator>,
}

/// Build the application router over the given state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/runs", post(create_run))
        .route("/runs/{run_id}", get(get_run))
        .route("/tools", get(list_tools))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
