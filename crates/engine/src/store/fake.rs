//! In-memory [`Store`] for engine unit/integration tests.
//!
//! Mirrors the shape of `actions::mock::RecordingActionRunner`: plain
//! `Mutex`-guarded maps, no I/O, and a way for the test to inspect what was
//! recorded — here, the scheduled calls a test drives manually instead of
//! running a real `scheduler::Scheduler` poll loop.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use super::Store;
use crate::error::EngineError;
use crate::execution::{TaskExecution, TaskResult, WorkflowExecution};
use crate::spec::WorkflowSpec;
use crate::state::{TaskState, WorkflowState};

#[derive(Debug, Clone)]
pub struct FakeScheduledCall {
    pub target: Option<String>,
    pub method_name: String,
    pub execute_at: DateTime<Utc>,
    pub args: Value,
}

#[derive(Debug, Clone)]
struct FakeAction {
    task_execution_id: Uuid,
    #[allow(dead_code)]
    action_name: String,
    result: Option<TaskResult>,
}

#[derive(Default)]
pub struct FakeStore {
    workflows: Mutex<HashMap<String, WorkflowSpec>>,
    workflow_executions: Mutex<HashMap<Uuid, WorkflowExecution>>,
    task_executions: Mutex<HashMap<Uuid, TaskExecution>>,
    actions: Mutex<HashMap<Uuid, FakeAction>>,
    scheduled: Mutex<Vec<FakeScheduledCall>>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_workflow(&self, spec: WorkflowSpec) {
        self.workflows
            .lock()
            .unwrap()
            .insert(spec.name.clone(), spec);
    }

    /// Snapshot of every call scheduled so far, oldest first.
    pub fn scheduled_calls(&self) -> Vec<FakeScheduledCall> {
        self.scheduled.lock().unwrap().clone()
    }

    /// Pop every call due at or before `now`, in scheduling order. Tests
    /// drive the engine's deferred callbacks by draining these and
    /// re-invoking the named engine method, simulating the real
    /// `scheduler::Scheduler` poll loop without needing Postgres.
    pub fn drain_due_calls(&self, now: DateTime<Utc>) -> Vec<FakeScheduledCall> {
        let mut guard = self.scheduled.lock().unwrap();
        let (due, pending): (Vec<_>, Vec<_>) =
            guard.drain(..).partition(|c| c.execute_at <= now);
        *guard = pending;
        due
    }
}

#[async_trait]
impl Store for FakeStore {
    async fn get_workflow_spec(&self, name: &str) -> Result<WorkflowSpec, EngineError> {
        self.workflows
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or(EngineError::NotFound)
    }

    async fn create_workflow_execution(
        &self,
        workflow_name: &str,
        spec: WorkflowSpec,
        input: Value,
        start_params: Value,
        state: WorkflowState,
    ) -> Result<WorkflowExecution, EngineError> {
        let now = Utc::now();
        let exec = WorkflowExecution {
            id: Uuid::new_v4(),
            workflow_name: workflow_name.to_string(),
            spec,
            input,
            output: Value::Object(Default::default()),
            context: Value::Object(Default::default()),
            state,
            state_info: None,
            start_params,
            created_at: now,
            updated_at: now,
        };
        self.workflow_executions
            .lock()
            .unwrap()
            .insert(exec.id, exec.clone());
        Ok(exec)
    }

    async fn get_workflow_execution(&self, id: Uuid) -> Result<WorkflowExecution, EngineError> {
        self.workflow_executions
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(EngineError::NotFound)
    }

    async fn update_workflow_execution(
        &self,
        id: Uuid,
        state: WorkflowState,
        state_info: Option<String>,
        context: Value,
        output: Value,
    ) -> Result<(), EngineError> {
        let mut guard = self.workflow_executions.lock().unwrap();
        let exec = guard.get_mut(&id).ok_or(EngineError::NotFound)?;
        exec.state = state;
        exec.state_info = state_info;
        exec.context = context;
        exec.output = output;
        exec.updated_at = Utc::now();
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
        let now = Utc::now();
        let task = TaskExecution {
            id: Uuid::new_v4(),
            workflow_execution_id,
            name: name.to_string(),
            spec_ref: spec_ref.to_string(),
            in_context,
            input: Value::Object(Default::default()),
            result: None,
            published: Value::Object(Default::default()),
            state,
            state_info: None,
            runtime_context: Value::Object(Default::default()),
            processed: false,
            created_at: now,
            updated_at: now,
        };
        self.task_executions
            .lock()
            .unwrap()
            .insert(task.id, task.clone());
        Ok(task)
    }

    async fn get_task_execution(&self, id: Uuid) -> Result<TaskExecution, EngineError> {
        self.task_executions
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(EngineError::NotFound)
    }

    async fn find_task_execution_by_name(
        &self,
        workflow_execution_id: Uuid,
        name: &str,
    ) -> Result<Option<TaskExecution>, EngineError> {
        Ok(self
            .task_executions
            .lock()
            .unwrap()
            .values()
            .find(|t| t.workflow_execution_id == workflow_execution_id && t.name == name)
            .cloned())
    }

    async fn list_task_executions(
        &self,
        workflow_execution_id: Uuid,
    ) -> Result<Vec<TaskExecution>, EngineError> {
        let mut tasks: Vec<TaskExecution> = self
            .task_executions
            .lock()
            .unwrap()
            .values()
            .filter(|t| t.workflow_execution_id == workflow_execution_id)
            .cloned()
            .collect();
        tasks.sort_by_key(|t| t.created_at);
        Ok(tasks)
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
        let mut guard = self.task_executions.lock().unwrap();
        let task = guard.get_mut(&id).ok_or(EngineError::NotFound)?;
        task.input = input;
        task.result = result;
        task.published = published;
        task.state = state;
        task.state_info = state_info;
        task.runtime_context = runtime_context;
        task.processed = processed;
        task.updated_at = Utc::now();
        Ok(())
    }

    async fn record_action_dispatch(
        &self,
        task_execution_id: Uuid,
        action_name: &str,
        _input: Value,
    ) -> Result<Uuid, EngineError> {
        let id = Uuid::new_v4();
        self.actions.lock().unwrap().insert(
            id,
            FakeAction {
                task_execution_id,
                action_name: action_name.to_string(),
                result: None,
            },
        );
        Ok(id)
    }

    async fn record_action_result(
        &self,
        action_id: Uuid,
        result: &TaskResult,
    ) -> Result<(), EngineError> {
        let mut guard = self.actions.lock().unwrap();
        let action = guard.get_mut(&action_id).ok_or(EngineError::NotFound)?;
        action.result = Some(result.clone());
        Ok(())
    }

    async fn find_task_id_for_action(&self, action_id: Uuid) -> Result<Uuid, EngineError> {
        self.actions
            .lock()
            .unwrap()
            .get(&action_id)
            .map(|a| a.task_execution_id)
            .ok_or(EngineError::NotFound)
    }

    async fn count_action_dispatches(&self, task_execution_id: Uuid) -> Result<usize, EngineError> {
        Ok(self
            .actions
            .lock()
            .unwrap()
            .values()
            .filter(|a| a.task_execution_id == task_execution_id)
            .count())
    }

    async fn schedule_call(
        &self,
        target: Option<&str>,
        method_name: &str,
        delay_secs: i64,
        args: Value,
    ) -> Result<(), EngineError> {
        self.scheduled.lock().unwrap().push(FakeScheduledCall {
            target: target.map(str::to_string),
            method_name: method_name.to_string(),
            execute_at: Utc::now() + chrono::Duration::seconds(delay_secs),
            args,
        });
        Ok(())
    }
}
