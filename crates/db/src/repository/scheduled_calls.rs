//! Scheduled (delayed) call repository functions.
//!
//! The scheduler is the sole source of future work: a poll loop claims due,
//! unlocked rows and invokes them. Claiming follows the same
//! `SELECT ... FOR UPDATE SKIP LOCKED` discipline a `job_queue` poller
//! uses, so concurrent scheduler instances never double-dispatch a call
//! that's still within its lease.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{DbError, models::ScheduledCallRow};

/// Persist a new scheduled call.
pub async fn schedule_call(
    pool: &PgPool,
    target: Option<&str>,
    method_name: &str,
    execute_at: DateTime<Utc>,
    args: Value,
    serializers: Value,
) -> Result<ScheduledCallRow, DbError> {
    let id = Uuid::new_v4();

    let row = sqlx::query_as!(
        ScheduledCallRow,
        r#"
        INSERT INTO scheduled_calls
            (id, target, method_name, execute_at, args, serializers, locked_until, processed)
        VALUES ($1, $2, $3, $4, $5, $6, NULL, FALSE)
        RETURNING id, target, method_name, execute_at, args, serializers, locked_until, processed
        "#,
        id,
        target,
        method_name,
        execute_at,
        args,
        serializers,
    )
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Atomically claim the next due, unlocked scheduled call and lease it for
/// `lease_secs` seconds.
///
/// Returns `None` if no call is due. Leaves the row locked but not deleted
/// — the caller marks it `processed` (and this repository deletes it) only
/// after invocation succeeds, giving at-least-once delivery: a call whose
/// invocation fails stays claimable once its lease expires.
pub async fn claim_next_due_call(
    pool: &PgPool,
    now: DateTime<Utc>,
    lease_secs: i64,
) -> Result<Option<ScheduledCallRow>, DbError> {
    let mut tx = pool.begin().await?;

    let row = sqlx::query_as!(
        ScheduledCallRow,
        r#"
        SELECT id, target, method_name, execute_at, args, serializers, locked_until, processed
        FROM scheduled_calls
        WHERE NOT processed AND execute_at <= $1 AND (locked_until IS NULL OR locked_until < $1)
        ORDER BY execute_at ASC
        LIMIT 1
        FOR UPDATE SKIP LOCKED
        "#,
        now,
    )
    .fetch_optional(&mut *tx)
    .await?;

    if let Some(ref call) = row {
        let locked_until = now + chrono::Duration::seconds(lease_secs);
        sqlx::query!(
            "UPDATE scheduled_calls SET locked_until = $1 WHERE id = $2",
            locked_until,
            call.id,
        )
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
    } else {
        tx.rollback().await?;
    }

    Ok(row)
}

/// Mark a scheduled call as processed and remove it.
pub async fn mark_processed(pool: &PgPool, id: Uuid) -> Result<(), DbError> {
    sqlx::query!("DELETE FROM scheduled_calls WHERE id = $1", id)
        .execute(pool)
        .await?;
    Ok(())
}
