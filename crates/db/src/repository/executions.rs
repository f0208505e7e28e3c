//! Workflow execution repository functions.

use chrono::Utc;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{DbError, models::WorkflowExecutionRow};

/// Create a new workflow execution record.
///
/// `state` is the caller-supplied initial state — the engine creates
/// executions directly in `running` per its `start_workflow` operation;
/// tests may pass other values.
pub async fn create_workflow_execution(
    pool: &PgPool,
    workflow_name: &str,
    spec: Value,
    input: Value,
    start_params: Value,
    state: &str,
) -> Result<WorkflowExecutionRow, DbError> {
    let id = Uuid::new_v4();
    let now = Utc::now();

    let row = sqlx::query_as!(
        WorkflowExecutionRow,
        r#"
        INSERT INTO workflow_executions
            (id, workflow_name, spec, input, output, context, state, state_info, start_params, created_at, updated_at)
        VALUES ($1, $2, $3, $4, '{}'::jsonb, '{}'::jsonb, $5, NULL, $6, $7, $7)
        RETURNING id, workflow_name, spec, input, output, context, state, state_info, start_params, created_at, updated_at
        "#,
        id,
        workflow_name,
        spec,
        input,
        state,
        start_params,
        now,
    )
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Fetch a workflow execution by its primary key.
pub async fn get_workflow_execution(
    pool: &PgPool,
    id: Uuid,
) -> Result<WorkflowExecutionRow, DbError> {
    let row = sqlx::query_as!(
        WorkflowExecutionRow,
        r#"
        SELECT id, workflow_name, spec, input, output, context, state, state_info, start_params, created_at, updated_at
        FROM workflow_executions WHERE id = $1
        "#,
        id,
    )
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Persist the full mutable surface of a workflow execution: `state`,
/// `state_info`, `context`, and `output`. Called from within the engine's
/// owning transaction after every state-machine transition.
pub async fn update_workflow_execution(
    pool: &PgPool,
    id: Uuid,
    state: &str,
    state_info: Option<&str>,
    context: Value,
    output: Value,
) -> Result<(), DbError> {
    let result = sqlx::query!(
        r#"
        UPDATE workflow_executions
        SET state = $1, state_info = $2, context = $3, output = $4, updated_at = $5
        WHERE id = $6
        "#,
        state,
        state_info,
        context,
        output,
        Utc::now(),
        id,
    )
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}
