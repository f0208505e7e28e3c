//! Poll loop that claims due scheduled calls and dispatches them.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use sqlx::PgPool;
use tracing::{error, info, warn};

use db::repository::scheduled_calls;

use crate::error::SchedulerError;
use crate::registry::Registry;

/// Lease window a claimed call is held for before it becomes reclaimable.
/// Must comfortably exceed the slowest expected `CallTarget::invoke`.
const DEFAULT_LEASE_SECS: i64 = 30;

pub struct Scheduler {
    pool: PgPool,
    registry: Arc<Registry>,
    poll_interval: StdDuration,
    lease_secs: i64,
}

impl Scheduler {
    pub fn new(pool: PgPool, registry: Arc<Registry>) -> Self {
        Self {
            pool,
            registry,
            poll_interval: StdDuration::from_millis(500),
            lease_secs: DEFAULT_LEASE_SECS,
        }
    }

    pub fn with_poll_interval(mut self, interval: StdDuration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Run the poll loop forever. Intended to be the body of the `worker`
    /// CLI sub-command.
    pub async fn run(&self) -> ! {
        info!("scheduler poll loop starting");
        loop {
            match self.tick().await {
                Ok(true) => continue, // a call was claimed; check again immediately
                Ok(false) => tokio::time::sleep(self.poll_interval).await,
                Err(e) => {
                    error!(error = %e, "scheduler tick failed");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }

    /// Claim and dispatch at most one due call. Returns `true` if a call
    /// was claimed (regardless of whether dispatch succeeded).
    pub async fn tick(&self) -> Result<bool, SchedulerError> {
        let now = Utc::now();
        let Some(call) = scheduled_calls::claim_next_due_call(&self.pool, now, self.lease_secs)
            .await?
        else {
            return Ok(false);
        };

        match self
            .registry
            .dispatch(call.target.as_deref(), &call.method_name, call.args.clone())
            .await
        {
            Ok(()) => {
                scheduled_calls::mark_processed(&self.pool, call.id).await?;
            }
            Err(e) => {
                // Leave the row in place; its lease expires and a future
                // tick reclaims it. At-least-once, not at-most-once.
                warn!(call_id = %call.id, method = %call.method_name, error = %e, "scheduled call failed, will retry after lease expiry");
            }
        }

        Ok(true)
    }
}

/// Schedule `method_name` on `target` to run after `delay` from now.
pub async fn schedule_in(
    pool: &PgPool,
    target: Option<&str>,
    method_name: &str,
    delay: Duration,
    args: Value,
) -> Result<db::models::ScheduledCallRow, SchedulerError> {
    schedule_at(pool, target, method_name, Utc::now() + delay, args).await
}

/// Schedule `method_name` on `target` to run at an absolute instant.
pub async fn schedule_at(
    pool: &PgPool,
    target: Option<&str>,
    method_name: &str,
    execute_at: DateTime<Utc>,
    args: Value,
) -> Result<db::models::ScheduledCallRow, SchedulerError> {
    let row = scheduled_calls::schedule_call(
        pool,
        target,
        method_name,
        execute_at,
        args,
        Value::Null,
    )
    .await?;
    Ok(row)
}
