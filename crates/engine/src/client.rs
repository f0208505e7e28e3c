//! Wires [`crate::engine::Engine`] into the scheduler's call-target registry.
//!
//! Design Note §9 re-architects the source's module-level dotted-path RPC
//! client lookup as an explicit interface resolved through a process-wide
//! registry initialized at startup. `scheduler::Registry`/`CallTarget`
//! already provide that registry; the engine simply registers itself as
//! the default target so scheduled `run_task`/`on_task_result`/
//! `fail_task_if_incomplete` callbacks route back into it.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use scheduler::{CallTarget, Registry, SchedulerError, DEFAULT_TARGET};

use crate::engine::Engine;
use crate::error::EngineError;
use crate::execution::TaskResult;

fn to_scheduler_err(e: EngineError) -> SchedulerError {
    SchedulerError::TargetFailed(e.to_string())
}

fn parse_task_id(args: &Value) -> Result<Uuid, SchedulerError> {
    serde_json::from_value(args.get("task_id").cloned().unwrap_or(Value::Null))
        .map_err(|_| SchedulerError::TargetFailed("missing or invalid task_id".into()))
}

#[async_trait]
impl CallTarget for Engine {
    async fn invoke(&self, method_name: &str, args: Value) -> Result<(), SchedulerError> {
        let task_id = parse_task_id(&args)?;

        match method_name {
            "run_task" => self.run_task(task_id).await.map_err(to_scheduler_err),
            "on_task_result" => {
                let result: TaskResult = serde_json::from_value(
                    args.get("result").cloned().unwrap_or(Value::Null),
                )
                .map_err(|e| SchedulerError::TargetFailed(e.to_string()))?;
                self.on_task_result(task_id, result)
                    .await
                    .map(|_| ())
                    .map_err(to_scheduler_err)
            }
            "fail_task_if_incomplete" => {
                let timeout = args.get("timeout").and_then(Value::as_u64).unwrap_or(0);
                self.fail_task_if_incomplete(task_id, timeout)
                    .await
                    .map_err(to_scheduler_err)
            }
            other => Err(SchedulerError::UnknownTarget(other.to_string())),
        }
    }
}

pub fn register_default(registry: &mut Registry, engine: Arc<Engine>) {
    registry.register(DEFAULT_TARGET, engine);
}
