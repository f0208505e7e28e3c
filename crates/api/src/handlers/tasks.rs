//! `GET /v2/tasks`, `GET /v2/tasks/:id`, `PUT /v2/tasks/:id`.
//!
//! `GET /v2/tasks` is scoped to "the caller" without a defined tenancy
//! model; absent one, scope is expressed as a required `execution_id`
//! query parameter rather than inventing auth.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use engine::{EngineError, TaskExecution, TaskResult};

use super::AppState;

fn status_for(err: &EngineError) -> StatusCode {
    match err {
        EngineError::NotFound => StatusCode::NOT_FOUND,
        EngineError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[derive(Deserialize)]
pub struct ListTasksQuery {
    pub execution_id: Uuid,
}

pub async fn list(
    Query(query): Query<ListTasksQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<TaskExecution>>, StatusCode> {
    state
        .engine
        .list_tasks_for_execution(query.execution_id)
        .await
        .map(Json)
        .map_err(|e| status_for(&e))
}

pub async fn get(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<TaskExecution>, StatusCode> {
    state.engine.get_task(id).await.map(Json).map_err(|e| status_for(&e))
}

#[derive(Deserialize)]
#[serde(rename_all = "UPPERCASE")]
enum CompletionState {
    Success,
    Error,
}

#[derive(Deserialize)]
pub struct CompleteTaskDto {
    state: CompletionState,
    #[serde(default)]
    result: Value,
}

pub async fn complete(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(payload): Json<CompleteTaskDto>,
) -> Result<Json<TaskExecution>, StatusCode> {
    let result = match payload.state {
        CompletionState::Success => TaskResult::success(payload.result),
        CompletionState::Error => TaskResult { success: false, data: payload.result },
    };

    state
        .engine
        .on_task_result(id, result)
        .await
        .map(Json)
        .map_err(|e| status_for(&e))
}
