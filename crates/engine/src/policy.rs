//! The six-policy pipeline wrapped around every task dispatch.
//!
//! A closed `enum Policy` rather than a trait object: the variant set is
//! fixed and dispatch is a single `match` — no dynamic subclass lookup
//! needed. All bookkeeping lives in `TaskExecution::runtime_context`, so
//! policies stay stateless across tasks.

use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::EngineError;
use crate::execution::TaskExecution;
use crate::spec::{RetrySpec, TaskPolicies};
use crate::state::TaskState;
use crate::store::Store;

/// What the caller should do after a hook runs.
#[derive(Debug, PartialEq, Eq)]
pub enum PolicyOutcome {
    /// Proceed to the next policy / to dispatch / to successor evaluation.
    Continue,
    /// The task has been moved to a waiting state and a callback scheduled;
    /// the caller must stop processing this task for now.
    Deferred,
    /// The enclosing workflow was moved to `PAUSED`; stop processing.
    WorkflowPaused,
}

#[derive(Debug, Clone)]
pub enum Policy {
    WaitBefore { delay: u64 },
    WaitAfter { delay: u64 },
    Retry { count: u32, delay: u64, break_on: Option<String> },
    Timeout { seconds: u64 },
    PauseBefore { condition: String },
    Concurrency { cap: u32 },
}

impl Policy {
    /// Build the fixed-order pipeline for one task. `wait_before: 0` /
    /// `wait_after: 0` are treated as "no policy."
    pub fn pipeline(policies: &TaskPolicies) -> Vec<Policy> {
        let mut pipeline = Vec::new();
        if let Some(delay) = policies.wait_before {
            if delay > 0 {
                pipeline.push(Policy::WaitBefore { delay });
            }
        }
        if let Some(delay) = policies.wait_after {
            if delay > 0 {
                pipeline.push(Policy::WaitAfter { delay });
            }
        }
        if let Some(RetrySpec { count, delay, break_on }) = policies.retry.clone() {
            pipeline.push(Policy::Retry { count, delay, break_on });
        }
        if let Some(seconds) = policies.timeout {
            pipeline.push(Policy::Timeout { seconds });
        }
        if let Some(condition) = policies.pause_before.clone() {
            pipeline.push(Policy::PauseBefore { condition });
        }
        if let Some(cap) = policies.concurrency {
            pipeline.push(Policy::Concurrency { cap });
        }
        pipeline
    }

    /// Hook run once, before the first dispatch of a task.
    pub async fn before_task_start(
        &self,
        task: &mut TaskExecution,
        store: &dyn Store,
        expr: &dyn expr::Expr,
    ) -> Result<PolicyOutcome, EngineError> {
        match self {
            Policy::WaitBefore { delay } => {
                if task.runtime_get("wait_before_policy").get("skip").and_then(Value::as_bool).unwrap_or(false) {
                    let mut rt = task.runtime_get("wait_before_policy");
                    rt.as_object_mut().unwrap().remove("skip");
                    task.runtime_set("wait_before_policy", rt);
                    Ok(PolicyOutcome::Continue)
                } else {
                    task.runtime_set("wait_before_policy", json!({ "skip": true }));
                    task.state = TaskState::Delayed;
                    store
                        .schedule_call(None, "run_task", *delay as i64, json!({ "task_id": task.id }))
                        .await?;
                    Ok(PolicyOutcome::Deferred)
                }
            }

            Policy::Timeout { seconds } => {
                store
                    .schedule_call(
                        None,
                        "fail_task_if_incomplete",
                        *seconds as i64,
                        json!({ "task_id": task.id, "timeout": seconds }),
                    )
                    .await?;
                Ok(PolicyOutcome::Continue)
            }

            Policy::PauseBefore { condition } => {
                let truthy = expr.evaluate_bool(condition, &task.in_context)?;
                if truthy {
                    task.state = TaskState::Idle;
                    Ok(PolicyOutcome::WorkflowPaused)
                } else {
                    Ok(PolicyOutcome::Continue)
                }
            }

            Policy::Concurrency { cap } => {
                // Open Question (DESIGN.md): recorded for visibility; this
                // engine has no with-items fan-out construct, so there is
                // never more than one TaskExecution per spec name per
                // workflow execution and the cap has nothing to enforce
                // against. Kept for fidelity with the source's own
                // write-only ConcurrencyPolicy.
                task.runtime_set("concurrency", json!(cap));
                Ok(PolicyOutcome::Continue)
            }

            Policy::WaitAfter { .. } | Policy::Retry { .. } => Ok(PolicyOutcome::Continue),
        }
    }

    /// Hook run after a task reaches a terminal state, before successor
    /// evaluation.
    pub async fn after_task_complete(
        &self,
        task: &mut TaskExecution,
        workflow_execution_id: Uuid,
        store: &dyn Store,
        expr: &dyn expr::Expr,
    ) -> Result<PolicyOutcome, EngineError> {
        match self {
            Policy::WaitAfter { delay } => {
                if task.runtime_get("wait_after_policy").get("skip").and_then(Value::as_bool).unwrap_or(false) {
                    let mut rt = task.runtime_get("wait_after_policy");
                    rt.as_object_mut().unwrap().remove("skip");
                    task.runtime_set("wait_after_policy", rt);
                    Ok(PolicyOutcome::Continue)
                } else if task.state.is_terminal() {
                    // Preserve the result that drove us here (Design Note
                    // §9: the re-entry must see the original result, not a
                    // re-read) by carrying it in the scheduled call's args.
                    let result_value = task
                        .result
                        .as_ref()
                        .map(|r| serde_json::to_value(r).unwrap_or(Value::Null))
                        .unwrap_or(Value::Null);
                    task.runtime_set("wait_after_policy", json!({ "skip": true }));
                    task.state = TaskState::Delayed;
                    store
                        .schedule_call(
                            None,
                            "on_task_result",
                            *delay as i64,
                            json!({ "task_id": task.id, "result": result_value }),
                        )
                        .await?;
                    Ok(PolicyOutcome::Deferred)
                } else {
                    // Already revived by something else (cancellation
                    // race) — do not re-delay a non-terminal task.
                    Ok(PolicyOutcome::Continue)
                }
            }

            Policy::Retry { count, delay, break_on } => {
                if task.state != TaskState::Error {
                    return Ok(PolicyOutcome::Continue);
                }
                let retry_no = task
                    .runtime_get("retry_task_policy")
                    .get("retry_no")
                    .and_then(Value::as_u64)
                    .unwrap_or(0) as u32;

                let break_truthy = match break_on {
                    Some(cond) => expr.evaluate_bool(cond, &task.in_context)?,
                    None => false,
                };

                if retry_no + 1 < *count && !break_truthy {
                    task.runtime_set(
                        "retry_task_policy",
                        json!({ "retry_no": retry_no + 1 }),
                    );
                    task.state = TaskState::Delayed;
                    let _ = workflow_execution_id;
                    store
                        .schedule_call(None, "run_task", *delay as i64, json!({ "task_id": task.id }))
                        .await?;
                    Ok(PolicyOutcome::Deferred)
                } else {
                    task.runtime_remove("retry_task_policy");
                    Ok(PolicyOutcome::Continue)
                }
            }

            Policy::WaitBefore { .. } | Policy::Timeout { .. } | Policy::PauseBefore { .. } | Policy::Concurrency { .. } => {
                Ok(PolicyOutcome::Continue)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use expr::TemplateExpr;
    use serde_json::json;
    use uuid::Uuid;

    fn sample_task() -> TaskExecution {
        use chrono::Utc;
        TaskExecution {
            id: Uuid::new_v4(),
            workflow_execution_id: Uuid::new_v4(),
            name: "t".into(),
            spec_ref: "t".into(),
            in_context: json!({}),
            input: json!({}),
            result: None,
            published: json!({}),
            state: TaskState::Idle,
            state_info: None,
            runtime_context: json!({}),
            processed: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn zero_wait_before_is_filtered_out_of_pipeline() {
        let policies = TaskPolicies {
            wait_before: Some(0),
            ..Default::default()
        };
        assert!(Policy::pipeline(&policies).is_empty());
    }

    #[tokio::test]
    async fn wait_before_defers_then_continues_on_reentry() {
        let store = crate::store::FakeStore::new();
        let expr = TemplateExpr;
        let policy = Policy::WaitBefore { delay: 5 };
        let mut task = sample_task();

        let outcome = policy.before_task_start(&mut task, &store, &expr).await.unwrap();
        assert_eq!(outcome, PolicyOutcome::Deferred);
        assert_eq!(task.state, TaskState::Delayed);
        assert_eq!(store.scheduled_calls().len(), 1);

        let outcome = policy.before_task_start(&mut task, &store, &expr).await.unwrap();
        assert_eq!(outcome, PolicyOutcome::Continue);
    }

    #[tokio::test]
    async fn retry_exhausts_after_count_attempts() {
        let store = crate::store::FakeStore::new();
        let expr = TemplateExpr;
        let policy = Policy::Retry { count: 2, delay: 1, break_on: None };
        let mut task = sample_task();
        task.state = TaskState::Error;

        let outcome = policy
            .after_task_complete(&mut task, task.workflow_execution_id, &store, &expr)
            .await
            .unwrap();
        assert_eq!(outcome, PolicyOutcome::Deferred);
        assert_eq!(task.runtime_get("retry_task_policy")["retry_no"], json!(1));

        task.state = TaskState::Error; // simulate the retried attempt also failing
        let outcome = policy
            .after_task_complete(&mut task, task.workflow_execution_id, &store, &expr)
            .await
            .unwrap();
        assert_eq!(outcome, PolicyOutcome::Continue);
        assert!(task.runtime_get("retry_task_policy").is_null());
    }
}
