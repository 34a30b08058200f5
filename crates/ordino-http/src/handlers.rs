//! Request handlers.

use std::collections::BTreeMap;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;

use ordino_core::{Run, RunStatus, ToolInfo};

use crate::error::ApiError;
use crate::router::AppState;
use crate::types::{CreateRunRequest, CreateRunResponse, HealthResponse};

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "ordino".to_string(),
        available_tools: state.registry.tool_names().join(", "),
    })
}

/// Accept a prompt and start executing it in the background.
///
/// The run is saved pending and 201 returns immediately; planning and
/// execution continue in a detached task that re-saves the run as it
/// reaches a terminal state. Clients poll `GET /runs/{run_id}`.
pub async fn create_run(
    State(state): State<AppState>,
    Json(request): Json<CreateRunRequest>,
) -> Result<(StatusCode, Json<CreateRunResponse>), ApiError> {
    let run = Run::new(request.prompt);
    let response = CreateRunResponse {
        run_id: run.run_id.clone(),
        status: run.status,
    };
    state.store.save(run.clone());

    tokio::spawn(execute_in_background(state, run));

    Ok((StatusCode::CREATED, Json(response)))
}

/// Plan and execute one run, saving the terminal state.
///
/// The orchestrator is synchronous and may sleep between retries, so it
/// runs on the blocking pool. Any failure along the way, planning
/// included, lands in the stored run rather than escaping the task.
async fn execute_in_background(state: AppState, mut run: Run) {
    let planned = state.planner.create_plan(&run.prompt).await;

    let plan = match planned {
        Ok(plan) => plan,
        Err(e) => {
            tracing::warn!(run_id = %run.run_id, error = %e, "planning failed");
            run.status = RunStatus::Failed;
            run.error = Some(format!("Execution failed: {e}"));
            state.store.save(run);
            return;
        }
    };

    let orchestrator = state.orchestrator.clone();
    let executed = tokio::task::spawn_blocking(move || orchestrator.execute_run(run, plan)).await;

    match executed {
        Ok(run) => state.store.save(run),
        Err(e) => tracing::error!(error = %e, "background execution task aborted"),
    }
}

pub async fn get_run(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<Json<Run>, ApiError> {
    state
        .store
        .get(&run_id)
        .map(Json)
        .ok_or_else(|| ApiError::run_not_found(run_id))
}

pub async fn list_tools(State(state): State<AppState>) -> Json<BTreeMap<String, ToolInfo>> {
    Json(state.registry.list_tools())
}
