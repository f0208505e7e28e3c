//! `POST /v2/workflows/:name/executions`, `GET /v2/executions/:id`,
//! `GET /v2/executions/:id/tasks`.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use engine::{EngineError, TaskExecution, WorkflowExecution};

use super::AppState;

#[derive(serde::Deserialize, Default)]
pub struct StartWorkflowDto {
    #[serde(default)]
    pub input: Value,
    #[serde(default)]
    pub params: Value,
}

fn status_for(err: &EngineError) -> StatusCode {
    match err {
        EngineError::NotFound => StatusCode::NOT_FOUND,
        EngineError::Duplicate(_) => StatusCode::CONFLICT,
        EngineError::InvalidInput(_) | EngineError::InvalidAction(_) | EngineError::InvalidSpec(_) => {
            StatusCode::BAD_REQUEST
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub async fn start(
    Path(name): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<StartWorkflowDto>,
) -> Result<(StatusCode, Json<WorkflowExecution>), StatusCode> {
    let input = if payload.input.is_null() { json!({}) } else { payload.input };
    let params = if payload.params.is_null() { json!({}) } else { payload.params };

    state
        .engine
        .start_workflow(&name, input, params)
        .await
        .map(|exec| (StatusCode::ACCEPTED, Json(exec)))
        .map_err(|e| status_for(&e))
}

pub async fn get(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<WorkflowExecution>, StatusCode> {
    state.engine.get_execution(id).await.map(Json).map_err(|e| status_for(&e))
}

pub async fn list_tasks(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Vec<TaskExecution>>, StatusCode> {
    state
        .engine
        .list_tasks_for_execution(id)
        .await
        .map(Json)
        .map_err(|e| status_for(&e))
}
