//! Goal-driven workflow handler.

use std::collections::HashSet;

use async_trait::async_trait;
use serde_json::Value;

use super::{HandlerDecision, Terminal, WorkflowHandler};
use crate::error::EngineError;
use crate::execution::{TaskExecution, WorkflowExecution};
use crate::spec::WorkflowSpec;
use crate::state::TaskState;
use crate::store::Store;

pub struct ReverseHandler;

impl ReverseHandler {
    fn goal(&self, workflow: &WorkflowExecution) -> Result<String, EngineError> {
        workflow
            .start_params
            .get("task_name")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                EngineError::InvalidInput(
                    "reverse workflow requires 'task_name' in start_params".into(),
                )
            })
    }

    /// Transitive closure of `requires:` starting from the goal task.
    fn goal_closure<'a>(&self, spec: &'a WorkflowSpec, goal: &str) -> HashSet<&'a str> {
        let mut closure: HashSet<&str> = HashSet::new();
        let mut stack = vec![goal];
        while let Some(name) = stack.pop() {
            let Some(canonical) = spec.tasks.get_key_value(name).map(|(k, _)| k.as_str()) else {
                continue;
            };
            if !closure.insert(canonical) {
                continue;
            }
            if let Some(t) = spec.task(canonical) {
                for req in &t.requires {
                    stack.push(req.as_str());
                }
            }
        }
        closure
    }
}

#[async_trait]
impl WorkflowHandler for ReverseHandler {
    async fn initial_tasks(&self, workflow: &WorkflowExecution) -> Result<Vec<String>, EngineError> {
        let goal = self.goal(workflow)?;
        let closure = self.goal_closure(&workflow.spec, &goal);
        let mut initial: Vec<String> = closure
            .into_iter()
            .filter(|name| {
                workflow
                    .spec
                    .task(name)
                    .map(|t| t.requires.is_empty())
                    .unwrap_or(false)
            })
            .map(str::to_string)
            .collect();
        initial.sort();
        Ok(initial)
    }

    async fn on_task_terminal(
        &self,
        workflow: &WorkflowExecution,
        task: &TaskExecution,
        store: &dyn Store,
        _expr: &dyn expr::Expr,
    ) -> Result<HandlerDecision, EngineError> {
        let goal = self.goal(workflow)?;

        if task.state == TaskState::Error {
            return Ok(HandlerDecision {
                activate: Vec::new(),
                terminate: Some(Terminal::Fail(format!(
                    "required task '{}' failed",
                    task.name
                ))),
            });
        }

        if task.name == goal {
            return Ok(HandlerDecision {
                activate: Vec::new(),
                terminate: Some(Terminal::Succeed),
            });
        }

        let closure = self.goal_closure(&workflow.spec, &goal);
        let mut activate = Vec::new();

        for name in &closure {
            if store
                .find_task_execution_by_name(workflow.id, name)
                .await?
                .is_some()
            {
                continue;
            }
            let Some(spec_task) = workflow.spec.task(name) else {
                continue;
            };
            if spec_task.requires.is_empty() {
                continue; // handled by initial_tasks
            }
            let mut all_satisfied = true;
            for req in &spec_task.requires {
                match store.find_task_execution_by_name(workflow.id, req).await? {
                    Some(t) if t.state == TaskState::Success => {}
                    _ => {
                        all_satisfied = false;
                        break;
                    }
                }
            }
            if all_satisfied {
                activate.push(name.to_string());
            }
        }

        Ok(HandlerDecision {
            activate,
            terminate: None,
        })
    }
}
