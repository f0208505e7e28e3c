//! Action-invocation repository functions.
//!
//! One row per dispatch of a task to an `ActionRunner`, distinct from the
//! owning task execution so that a retried task accumulates one action row
//! per attempt.

use chrono::Utc;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{DbError, models::ActionRow};

/// Record a new action invocation in `running` state.
pub async fn create_action(
    pool: &PgPool,
    task_execution_id: Uuid,
    action_name: &str,
    input: Value,
) -> Result<ActionRow, DbError> {
    let id = Uuid::new_v4();
    let now = Utc::now();

    let row = sqlx::query_as!(
        ActionRow,
        r#"
        INSERT INTO actions (id, task_execution_id, action_name, input, result, state, created_at, updated_at)
        VALUES ($1, $2, $3, $4, NULL, 'running', $5, $5)
        RETURNING id, task_execution_id, action_name, input, result, state, created_at, updated_at
        "#,
        id,
        task_execution_id,
        action_name,
        input,
        now,
    )
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Fetch a single action invocation by its primary key.
pub async fn get_action(pool: &PgPool, id: Uuid) -> Result<ActionRow, DbError> {
    let row = sqlx::query_as!(
        ActionRow,
        r#"
        SELECT id, task_execution_id, action_name, input, result, state, created_at, updated_at
        FROM actions WHERE id = $1
        "#,
        id,
    )
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Record the outcome of an action invocation.
pub async fn complete_action(
    pool: &PgPool,
    id: Uuid,
    result: Value,
    state: &str,
) -> Result<(), DbError> {
    sqlx::query!(
        r#"UPDATE actions SET result = $1, state = $2, updated_at = $3 WHERE id = $4"#,
        result,
        state,
        Utc::now(),
        id,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// List every action invocation recorded for a task execution, oldest first.
///
/// Used by tests to assert the number of observed dispatches under retry.
pub async fn list_actions_for_task(
    pool: &PgPool,
    task_execution_id: Uuid,
) -> Result<Vec<ActionRow>, DbError> {
    let rows = sqlx::query_as!(
        ActionRow,
        r#"
        SELECT id, task_execution_id, action_name, input, result, state, created_at, updated_at
        FROM actions WHERE task_execution_id = $1 ORDER BY created_at ASC
        "#,
        task_execution_id,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
