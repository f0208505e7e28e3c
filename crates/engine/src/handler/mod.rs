//! Per-workflow-type control-flow strategy.
//!
//! The direct handler resolves forward edges (`on_success`/`on_error`/
//! `on_complete`); the reverse handler resolves a goal task's transitive
//! `requires:` closure. Both are consulted by [`crate::engine::Engine`]
//! at the same two points: once to find a workflow's initial task set,
//! once per completed task to find its successors (or workflow
//! termination).

pub mod direct;
pub mod reverse;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::EngineError;
use crate::execution::{TaskExecution, WorkflowExecution};
use crate::spec::WorkflowType;
use crate::store::Store;

pub use direct::DirectHandler;
pub use reverse::ReverseHandler;

/// What a completed task's handler evaluation produced.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct HandlerDecision {
    /// Task names newly ready to run (handler has already applied join
    /// gating and the "at most once" check).
    pub activate: Vec<String>,
    /// Set if the workflow itself reached a terminal state.
    pub terminate: Option<Terminal>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Terminal {
    Succeed,
    Fail(String),
}

#[async_trait]
pub trait WorkflowHandler: Send + Sync {
    async fn initial_tasks(
        &self,
        workflow: &WorkflowExecution,
    ) -> Result<Vec<String>, EngineError>;

    async fn on_task_terminal(
        &self,
        workflow: &WorkflowExecution,
        task: &TaskExecution,
        store: &dyn Store,
        expr: &dyn expr::Expr,
    ) -> Result<HandlerDecision, EngineError>;
}

pub fn for_workflow_type(workflow_type: WorkflowType) -> Box<dyn WorkflowHandler> {
    match workflow_type {
        WorkflowType::Direct => Box::new(DirectHandler),
        WorkflowType::Reverse => Box::new(ReverseHandler),
    }
}

/// Shallow merge of two JSON objects, `b` winning on key conflicts.
/// Non-object inputs are treated as empty objects — both `context` and
/// `published` are schemaless maps per Design Note §9.
pub(crate) fn merge_objects(a: &Value, b: &Value) -> Value {
    let mut out = a.as_object().cloned().unwrap_or_default();
    if let Some(bo) = b.as_object() {
        for (k, v) in bo {
            out.insert(k.clone(), v.clone());
        }
    }
    Value::Object(out)
}
