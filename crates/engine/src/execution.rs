//! In-memory domain views of persisted executions.
//!
//! These mirror `db::models::{WorkflowExecutionRow, TaskExecutionRow}` but
//! use engine-native types (`WorkflowState`/`TaskState` enums, parsed
//! `WorkflowSpec`) instead of raw strings/JSON, so engine code never
//! stringly-types a state comparison.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::spec::WorkflowSpec;
use crate::state::{TaskState, WorkflowState};

/// The outcome a dispatcher or the `PUT /v2/tasks/{id}` channel reports
/// back to [`crate::engine::Engine::on_task_result`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub success: bool,
    /// On success, the action's return value. On error, an error payload.
    pub data: Value,
}

impl TaskResult {
    pub fn success(data: Value) -> Self {
        Self { success: true, data }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: Value::String(message.into()),
        }
    }

    pub fn state(&self) -> TaskState {
        if self.success {
            TaskState::Success
        } else {
            TaskState::Error
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkflowExecution {
    pub id: Uuid,
    pub workflow_name: String,
    pub spec: WorkflowSpec,
    pub input: Value,
    pub output: Value,
    pub context: Value,
    pub state: WorkflowState,
    pub state_info: Option<String>,
    pub start_params: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskExecution {
    pub id: Uuid,
    pub workflow_execution_id: Uuid,
    pub name: String,
    pub spec_ref: String,
    pub in_context: Value,
    pub input: Value,
    pub result: Option<TaskResult>,
    pub published: Value,
    pub state: TaskState,
    pub state_info: Option<String>,
    pub runtime_context: Value,
    pub processed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskExecution {
    /// Read a `runtime_context` field, defaulting to `Value::Null`.
    pub fn runtime_get(&self, key: &str) -> Value {
        self.runtime_context
            .get(key)
            .cloned()
            .unwrap_or(Value::Null)
    }

    /// Set a `runtime_context` field in place, creating the object if needed.
    pub fn runtime_set(&mut self, key: &str, value: Value) {
        if !self.runtime_context.is_object() {
            self.runtime_context = Value::Object(Default::default());
        }
        self.runtime_context
            .as_object_mut()
            .expect("just ensured object")
            .insert(key.to_string(), value);
    }

    pub fn runtime_remove(&mut self, key: &str) {
        if let Some(obj) = self.runtime_context.as_object_mut() {
            obj.remove(key);
        }
    }
}
