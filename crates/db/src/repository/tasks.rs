//! Task execution repository functions.

use chrono::Utc;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{DbError, models::TaskExecutionRow};

/// Create a new task execution, always starting `processed = false`.
pub async fn create_task_execution(
    pool: &PgPool,
    workflow_execution_id: Uuid,
    name: &str,
    spec_ref: &str,
    in_context: Value,
    state: &str,
) -> Result<TaskExecutionRow, DbError> {
    let id = Uuid::new_v4();
    let now = Utc::now();

    let row = sqlx::query_as!(
        TaskExecutionRow,
        r#"
        INSERT INTO task_executions
            (id, workflow_execution_id, name, spec_ref, in_context, input, result,
             published, state, state_info, runtime_context, processed, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, '{}'::jsonb, NULL, '{}'::jsonb, $6, NULL, '{}'::jsonb, FALSE, $7, $7)
        RETURNING id, workflow_execution_id, name, spec_ref, in_context, input, result,
                  published, state, state_info, runtime_context, processed, created_at, updated_at
        "#,
        id,
        workflow_execution_id,
        name,
        spec_ref,
        in_context,
        state,
        now,
    )
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Fetch a task execution by its primary key.
pub async fn get_task_execution(pool: &PgPool, id: Uuid) -> Result<TaskExecutionRow, DbError> {
    let row = sqlx::query_as!(
        TaskExecutionRow,
        r#"
        SELECT id, workflow_execution_id, name, spec_ref, in_context, input, result,
               published, state, state_info, runtime_context, processed, created_at, updated_at
        FROM task_executions WHERE id = $1
        "#,
        id,
    )
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Find a task execution within a workflow execution by task name.
///
/// Used to enforce "a join task is created at most once per workflow
/// execution" and to check `requires:` satisfaction in reverse workflows.
pub async fn find_task_execution_by_name(
    pool: &PgPool,
    workflow_execution_id: Uuid,
    name: &str,
) -> Result<Option<TaskExecutionRow>, DbError> {
    let row = sqlx::query_as!(
        TaskExecutionRow,
        r#"
        SELECT id, workflow_execution_id, name, spec_ref, in_context, input, result,
               published, state, state_info, runtime_context, processed, created_at, updated_at
        FROM task_executions WHERE workflow_execution_id = $1 AND name = $2
        "#,
        workflow_execution_id,
        name,
    )
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// List every task execution belonging to a workflow execution.
pub async fn list_task_executions(
    pool: &PgPool,
    workflow_execution_id: Uuid,
) -> Result<Vec<TaskExecutionRow>, DbError> {
    let rows = sqlx::query_as!(
        TaskExecutionRow,
        r#"
        SELECT id, workflow_execution_id, name, spec_ref, in_context, input, result,
               published, state, state_info, runtime_context, processed, created_at, updated_at
        FROM task_executions WHERE workflow_execution_id = $1 ORDER BY created_at ASC
        "#,
        workflow_execution_id,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Persist the full mutable surface of a task execution.
#[allow(clippy::too_many_arguments)]
pub async fn update_task_execution(
    pool: &PgPool,
    id: Uuid,
    input: Value,
    result: Option<Value>,
    published: Value,
    state: &str,
    state_info: Option<&str>,
    runtime_context: Value,
    processed: bool,
) -> Result<(), DbError> {
    let affected = sqlx::query!(
        r#"
        UPDATE task_executions
        SET input = $1, result = $2, published = $3, state = $4, state_info = $5,
            runtime_context = $6, processed = $7, updated_at = $8
        WHERE id = $9
        "#,
        input,
        result,
        published,
        state,
        state_info,
        runtime_context,
        processed,
        Utc::now(),
        id,
    )
    .execute(pool)
    .await?;

    if affected.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}
