//! Postgres-backed [`Store`], a thin adapter over `db::repository`.
//!
//! Each method is one or two repository calls against the same pool. This
//! does not thread a single `sqlx::Transaction` across an entire engine
//! operation (see DESIGN.md for why that's accepted as a documented
//! simplification rather than implemented); every individual repository
//! call is itself atomic.

use async_trait::async_trait;
use chrono::Duration;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use db::models::{TaskExecutionRow, WorkflowExecutionRow};
use db::repository::{actions, executions, tasks, workflows};

use super::Store;
use crate::error::EngineError;
use crate::execution::{TaskExecution, TaskResult, WorkflowExecution};
use crate::spec::WorkflowSpec;
use crate::state::{TaskState, WorkflowState};

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn spec_from_value(value: &Value) -> Result<WorkflowSpec, EngineError> {
    serde_json::from_value(value.clone())
        .map_err(|e| EngineError::Internal(format!("corrupt embedded spec: {e}")))
}

fn workflow_execution_from_row(row: WorkflowExecutionRow) -> Result<WorkflowExecution, EngineError> {
    Ok(WorkflowExecution {
        id: row.id,
        workflow_name: row.workflow_name,
        spec: spec_from_value(&row.spec)?,
        input: row.input,
        output: row.output,
        context: row.context,
        state: row.state.parse()?,
        state_info: row.state_info,
        start_params: row.start_params,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn task_execution_from_row(row: TaskExecutionRow) -> Result<TaskExecution, EngineError> {
    let result = row
        .result
        .map(|v| serde_json::from_value(v).map_err(|e| EngineError::Internal(e.to_string())))
        .transpose()?;
    Ok(TaskExecution {
        id: row.id,
        workflow_execution_id: row.workflow_execution_id,
        name: row.name,
        spec_ref: row.spec_ref,
        in_context: row.in_context,
        input: row.input,
        result,
        published: row.published,
        state: row.state.parse()?,
        state_info: row.state_info,
        runtime_context: row.runtime_context,
        processed: row.processed,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

#[async_trait]
impl Store for PgStore {
    async fn get_workflow_spec(&self, name: &str) -> Result<WorkflowSpec, EngineError> {
        let row = workflows::get_workflow_by_name(&self.pool, name)
            .await
            .map_err(|e| match e {
                db::DbError::NotFound => EngineError::NotFound,
                other => EngineError::Store(other),
            })?;
        spec_from_value(&row.definition)
    }

    async fn create_workflow_execution(
        &self,
        workflow_name: &str,
        spec: WorkflowSpec,
        input: Value,
        start_params: Value,
        state: WorkflowState,
    ) -> Result<WorkflowExecution, EngineError> {
        let spec_value = serde_json::to_value(&spec)
            .map_err(|e| EngineError::Internal(e.to_string()))?;
        let row = executions::create_workflow_execution(
            &self.pool,
            workflow_name,
            spec_value,
            input,
            start_params,
            &state.to_string(),
        )
        .await?;
        workflow_execution_from_row(row)
    }

    async fn get_workflow_execution(&self, id: Uuid) -> Result<WorkflowExecution, EngineError> {
        let row = executions::get_workflow_execution(&self.pool, id)
            .await
            .map_err(|e| match e {
                db::DbError::NotFound => EngineError::NotFound,
                other => EngineError::Store(other),
            })?;
        workflow_execution_from_row(row)
    }

    async fn update_workflow_execution(
        &self,
        id: Uuid,
        state: WorkflowState,
        state_info: Option<String>,
        context: Value,
        output: Value,
    ) -> Result<(), EngineError> {
        executions::update_workflow_execution(
            &self.pool,
            id,
            &state.to_string(),
            state_info.as_deref(),
            context,
            output,
        )
        .await?;
        Ok(())
    }

    async fn create_task_execution(
        &self,
        workflow_execution_id: Uuid,
        name: &str,
        spec_ref: &str,
        in_context: Value,
        state: TaskState,
    ) -> Result<TaskExecution, EngineError> {
        let row = tasks::create_task_execution(
            &self.pool,
            workflow_execution_id,
            name,
            spec_ref,
            in_context,
            &state.to_string(),
        )
        .await?;
        task_execution_from_row(row)
    }

    async fn get_task_execution(&self, id: Uuid) -> Result<TaskExecution, EngineError> {
        let row = tasks::get_task_execution(&self.pool, id)
            .await
            .map_err(|e| match e {
                db::DbError::NotFound => EngineError::NotFound,
                other => EngineError::Store(other),
            })?;
        task_execution_from_row(row)
    }

    async fn find_task_execution_by_name(
        &self,
        workflow_execution_id: Uuid,
        name: &str,
    ) -> Result<Option<TaskExecution>, EngineError> {
        let row = tasks::find_task_execution_by_name(&self.pool, workflow_execution_id, name)
            .await?;
        row.map(task_execution_from_row).transpose()
    }

    async fn list_task_executions(
        &self,
        workflow_execution_id: Uuid,
    ) -> Result<Vec<TaskExecution>, EngineError> {
        let rows = tasks::list_task_executions(&self.pool, workflow_execution_id).await?;
        rows.into_iter().map(task_execution_from_row).collect()
    }

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
    ) -> Result<(), EngineError> {
        let result_value = result
            .map(|r| serde_json::to_value(r).map_err(|e| EngineError::Internal(e.to_string())))
            .transpose()?;
        tasks::update_task_execution(
            &self.pool,
            id,
            input,
            result_value,
            published,
            &state.to_string(),
            state_info.as_deref(),
            runtime_context,
            processed,
        )
        .await?;
        Ok(())
    }

    async fn record_action_dispatch(
        &self,
        task_execution_id: Uuid,
        action_name: &str,
        input: Value,
    ) -> Result<Uuid, EngineError> {
        let row = actions::create_action(&self.pool, task_execution_id, action_name, input).await?;
        Ok(row.id)
    }

    async fn record_action_result(
        &self,
        action_id: Uuid,
        result: &TaskResult,
    ) -> Result<(), EngineError> {
        let result_value =
            serde_json::to_value(result).map_err(|e| EngineError::Internal(e.to_string()))?;
        actions::complete_action(&self.pool, action_id, result_value, &result.state().to_string())
            .await?;
        Ok(())
    }

    async fn find_task_id_for_action(&self, action_id: Uuid) -> Result<Uuid, EngineError> {
        let row = actions::get_action(&self.pool, action_id)
            .await
            .map_err(|e| match e {
                db::DbError::NotFound => EngineError::NotFound,
                other => EngineError::Store(other),
            })?;
        Ok(row.task_execution_id)
    }

    async fn count_action_dispatches(&self, task_execution_id: Uuid) -> Result<usize, EngineError> {
        let rows = actions::list_actions_for_task(&self.pool, task_execution_id).await?;
        Ok(rows.len())
    }

    async fn schedule_call(
        &self,
        target: Option<&str>,
        method_name: &str,
        delay_secs: i64,
        args: Value,
    ) -> Result<(), EngineError> {
        scheduler::schedule_in(
            &self.pool,
            target,
            method_name,
            Duration::seconds(delay_secs),
            args,
        )
        .await?;
        Ok(())
    }
}
