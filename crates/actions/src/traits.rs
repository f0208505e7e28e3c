//! The `ActionRunner` trait — the contract every action implementation must fulfil.

use async_trait::async_trait;
use serde_json::Value;

use crate::ActionError;

/// Shared context passed to an action on every invocation.
///
/// Defined here (in the actions crate) so both the engine and individual
/// action implementations can import it without a circular dependency.
#[derive(Debug, Clone)]
pub struct ActionContext {
    /// ID of the parent workflow execution.
    pub workflow_execution_id: uuid::Uuid,
    /// ID of the task execution this invocation belongs to.
    pub task_execution_id: uuid::Uuid,
    /// Name of the task (as declared in the workflow spec) that triggered this action.
    pub task_name: String,
}

/// The action-runner contract.
///
/// A single implementation typically fronts a whole family of named
/// actions (e.g. an HTTP-calling runner, a shell-command runner, or — as
/// shipped here — the in-process registry used for tests and demos). The
/// dispatcher resolves `action_name` to a runner and hands off the call.
#[async_trait]
pub trait ActionRunner: Send + Sync {
    /// Execute `action_name` with `input` and return its JSON result.
    ///
    /// # Errors
    /// - [`ActionError::NotFound`] if `action_name` isn't recognised.
    /// - [`ActionError::InvalidArguments`] if `input` doesn't match what
    ///   the action expects.
    /// - [`ActionError::Runtime`] if the action ran and failed.
    async fn execute(
        &self,
        action_name: &str,
        input: Value,
        ctx: &ActionContext,
    ) -> Result<Value, ActionError>;
}
