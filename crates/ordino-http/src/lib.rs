//! HTTP API for the ordino agent runtime.
//!
//! Four endpoints over an [`AppState`] holding the shared registry,
//! store, planner, and orchestrator:
//!
//! - `GET /health` — service liveness plus the registered tool names.
//! - `POST /runs` — accept a prompt, return 201 immediately, then plan
//!   and execute in a background task.
//! - `GET /runs/{run_id}` — full run state including the execution log.
//! - `GET /tools` — the tool catalog with input schemas.

pub mod error;
pub mod handlers;
pub mod router;
pub mod types;

pub use error::ApiError;
pub use router::{router, AppState};
pub use types::{CreateRunRequest, CreateRunResponse, HealthResponse};
