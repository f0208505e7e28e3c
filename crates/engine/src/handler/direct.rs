//! Forward edge-driven workflow handler.

use async_trait::async_trait;
use uuid::Uuid;

use super::{merge_objects, HandlerDecision, Terminal, WorkflowHandler};
use crate::error::EngineError;
use crate::execution::{TaskExecution, WorkflowExecution};
use crate::spec::{EdgeSpec, JoinSpec, Sentinel, WorkflowSpec};
use crate::state::TaskState;
use crate::store::Store;

pub struct DirectHandler;

#[async_trait]
impl WorkflowHandler for DirectHandler {
    async fn initial_tasks(&self, workflow: &WorkflowExecution) -> Result<Vec<String>, EngineError> {
        Ok(workflow
            .spec
            .initial_tasks_direct()
            .into_iter()
            .map(String::from)
            .collect())
    }

    async fn on_task_terminal(
        &self,
        workflow: &WorkflowExecution,
        task: &TaskExecution,
        store: &dyn Store,
        expr: &dyn expr::Expr,
    ) -> Result<HandlerDecision, EngineError> {
        let spec = &workflow.spec;
        let task_spec = spec
            .task(&task.name)
            .ok_or_else(|| EngineError::InvalidSpec(format!("unknown task '{}'", task.name)))?;

        // An ERROR task with no on-error/on-complete outbound edge at all
        // terminates the workflow.
        if task.state == TaskState::Error
            && task_spec.on_error.is_empty()
            && task_spec.on_complete.is_empty()
        {
            return Ok(HandlerDecision {
                activate: Vec::new(),
                terminate: Some(Terminal::Fail(format!(
                    "task '{}' failed with no error-handling edge",
                    task.name
                ))),
            });
        }

        let mut candidates: Vec<&EdgeSpec> = Vec::new();
        match task.state {
            TaskState::Success => candidates.extend(task_spec.on_success.iter()),
            TaskState::Error => candidates.extend(task_spec.on_error.iter()),
            _ => {}
        }
        candidates.extend(task_spec.on_complete.iter());

        let merged_ctx = merge_objects(&workflow.context, &task.published);
        let mut decision = HandlerDecision::default();

        for edge in candidates {
            match edge {
                EdgeSpec::Sentinel(Sentinel::Succeed) => {
                    decision.terminate = Some(Terminal::Succeed);
                    break;
                }
                EdgeSpec::Sentinel(Sentinel::Fail) => {
                    decision.terminate = Some(Terminal::Fail(format!(
                        "sentinel 'fail' activated by task '{}'",
                        task.name
                    )));
                    break;
                }
                EdgeSpec::Sentinel(Sentinel::Noop) => continue,
                EdgeSpec::Next {
                    task: next,
                    condition,
                } => {
                    let truthy = match condition {
                        Some(cond) => expr.evaluate_bool(cond, &merged_ctx)?,
                        None => true,
                    };
                    if !truthy {
                        continue;
                    }

                    if ready_to_activate(spec, next, store, workflow.id).await? {
                        decision.activate.push(next.clone());
                    }
                }
            }
        }

        Ok(decision)
    }
}

/// Apply the "created at most once" rule and join-cardinality gating for a
/// candidate successor.
async fn ready_to_activate(
    spec: &WorkflowSpec,
    task_name: &str,
    store: &dyn Store,
    workflow_execution_id: Uuid,
) -> Result<bool, EngineError> {
    if store
        .find_task_execution_by_name(workflow_execution_id, task_name)
        .await?
        .is_some()
    {
        return Ok(false);
    }

    let Some(task_spec) = spec.task(task_name) else {
        return Ok(false);
    };

    match task_spec.join {
        JoinSpec::None => Ok(true),
        JoinSpec::All | JoinSpec::One | JoinSpec::Count(_) => {
            let predecessors = spec.predecessors_of(task_name);
            let mut terminal_count = 0usize;
            for pred in &predecessors {
                if let Some(p) = store
                    .find_task_execution_by_name(workflow_execution_id, pred)
                    .await?
                {
                    if p.state.is_terminal() {
                        terminal_count += 1;
                    }
                }
            }
            Ok(match task_spec.join {
                JoinSpec::All => !predecessors.is_empty() && terminal_count == predecessors.len(),
                JoinSpec::One => terminal_count >= 1,
                JoinSpec::Count(n) => terminal_count >= n as usize,
                JoinSpec::None => unreachable!(),
            })
        }
    }
}
