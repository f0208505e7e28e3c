//! Engine-level error taxonomy.
//!
//! Variant names follow the kinds in the error-handling design, not the
//! originating collaborator, so API handlers can match on them directly
//! (`EngineError::NotFound` → 404, `EngineError::Duplicate` → 409, ...).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Input does not match the workflow's declared `input_params`.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Action name unresolved, or argument set mismatched, at dispatch.
    #[error("invalid action: {0}")]
    InvalidAction(String),

    /// The expression evaluator rejected a template.
    #[error("expression error: {0}")]
    Expression(#[from] expr::ExprError),

    /// A worker-reported action failure.
    #[error("action runtime error: {0}")]
    ActionRuntime(String),

    /// Synthetic error injected by the `timeout` policy.
    #[error("task timed out after {0}s")]
    Timeout(u64),

    /// Unknown execution or task id.
    #[error("not found")]
    NotFound,

    /// Name collision creating a workflow/action.
    #[error("duplicate: {0}")]
    Duplicate(String),

    /// The requested workflow graph is malformed (cycle, dangling edge).
    #[error("invalid workflow spec: {0}")]
    InvalidSpec(String),

    /// Scheduler-layer failure (e.g. no `CallTarget` registered).
    #[error("scheduler error: {0}")]
    Scheduler(#[from] scheduler::SchedulerError),

    /// Persistence error from the store.
    #[error("store error: {0}")]
    Store(#[from] db::DbError),

    /// Action dispatcher-layer failure.
    #[error("action error: {0}")]
    Action(#[from] actions::ActionError),

    /// Anything else — parse failures of embedded state strings and the
    /// like, which indicate a bug rather than a caller error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Human-readable explanation suitable for `WorkflowExecution.state_info`
    /// / `TaskExecution.state_info`.
    pub fn as_state_info(&self) -> String {
        self.to_string()
    }
}
