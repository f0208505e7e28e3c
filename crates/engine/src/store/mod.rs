//! The engine's persistence boundary.
//!
//! `Store` is the one external collaborator the engine talks to — it only
//! ever reaches the database through this trait, never through `sqlx`
//! directly, so tests can swap in [`fake::FakeStore`] and drop the Postgres
//! dependency entirely.

pub mod fake;
pub mod pg;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::error::EngineError;
use crate::execution::{TaskExecution, TaskResult, WorkflowExecution};
use crate::spec::WorkflowSpec;
use crate::state::{TaskState, WorkflowState};

pub use fake::FakeStore;
pub use pg::PgStore;

#[async_trait]
pub trait Store: Send + Sync {
    async fn get_workflow_spec(&self, name: &str) -> Result<WorkflowSpec, EngineError>;

    async fn create_workflow_execution(
        &self,
        workflow_name: &str,
        spec: WorkflowSpec,
        input: Value,
        start_params: Value,
        state: WorkflowState,
    ) -> Result<WorkflowExecution, EngineError>;

    async fn get_workflow_execution(&self, id: Uuid) -> Result<WorkflowExecution, EngineError>;

    async fn update_workflow_execution(
        &self,
        id: Uuid,
        state: WorkflowState,
        state_info: Option<String>,
        context: Value,
        output: Value,
    ) -> Result<(), EngineError>;

    async fn create_task_execution(
        &self,
        workflow_execution_id: Uuid,
        name: &str,
        spec_ref: &str,
        in_context: Value,
        state: TaskState,
    ) -> Result<TaskExecution, EngineError>;

    async fn get_task_execution(&self, id: Uuid) -> Result<TaskExecution, EngineError>;

    async fn find_task_execution_by_name(
        &self,
        workflow_execution_id: Uuid,
        name: &str,
    ) -> Result<Option<TaskExecution>, EngineError>;

    async fn list_task_executions(
        &self,
        workflow_execution_id: Uuid,
    ) -> Result<Vec<TaskExecution>, EngineError>;

    #[allow(clippy::too_many_arguments)]
    async fn update_task_execution(
        &self,
        id: Uuid,
        input: Value,
        result: Option<TaskResult>,
        published: Value,
        state: TaskState,
        state_info: Option<String>,
        runtime_context: Value,
        processed: bool,
    ) -> Result<(), EngineError>;

    /// Record one action dispatch against the `actions` table, returning
    /// its row id. Distinct from the owning task so a retried task
    /// accumulates one row per attempt (used to test quantified invariant
    /// 3: observed dispatches == `min(k+1, retry.count)`).
    async fn record_action_dispatch(
        &self,
        task_execution_id: Uuid,
        action_name: &str,
        input: Value,
    ) -> Result<Uuid, EngineError>;

    async fn record_action_result(
        &self,
        action_id: Uuid,
        result: &TaskResult,
    ) -> Result<(), EngineError>;

    /// Resolve the owning task of an action invocation, for
    /// `on_action_complete`.
    async fn find_task_id_for_action(&self, action_id: Uuid) -> Result<Uuid, EngineError>;

    async fn count_action_dispatches(&self, task_execution_id: Uuid) -> Result<usize, EngineError>;

    /// Durably schedule `method_name(args)` to run after `delay_secs`.
    /// `target` names the `scheduler::CallTarget` that should receive the
    /// callback (`None` resolves to the default engine target — see
    /// [`crate::client`]).
    async fn schedule_call(
        &self,
        target: Option<&str>,
        method_name: &str,
        delay_secs: i64,
        args: Value,
    ) -> Result<(), EngineError>;
}
