//! Row structs that map 1-to-1 onto database tables.
//!
//! These are *persistence* models — they carry no business logic. The
//! domain types (state machines, policy evaluation, ...) live in the
//! `engine` crate and convert to/from these rows at the repository
//! boundary. JSON columns (`spec`, `context`, `runtime_context`, ...) are
//! carried as `serde_json::Value` the whole way through — the db crate
//! never interprets their contents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// workflows
// ---------------------------------------------------------------------------

/// A persisted workflow definition row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WorkflowRow {
    pub id: Uuid,
    pub name: String,
    /// Full JSON workflow definition (`engine::spec::WorkflowSpec`).
    pub definition: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// workflow_executions
// ---------------------------------------------------------------------------

/// A persisted workflow execution row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WorkflowExecutionRow {
    pub id: Uuid,
    pub workflow_name: String,
    /// Point-in-time snapshot of the `WorkflowSpec` this execution is running.
    pub spec: serde_json::Value,
    pub input: serde_json::Value,
    pub output: serde_json::Value,
    /// Accumulating publish namespace, merged across all completed tasks.
    pub context: serde_json::Value,
    pub state: String,
    pub state_info: Option<String>,
    pub start_params: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// task_executions
// ---------------------------------------------------------------------------

/// A persisted task execution row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TaskExecutionRow {
    pub id: Uuid,
    pub workflow_execution_id: Uuid,
    pub name: String,
    /// Key into the embedded spec's `tasks` map.
    pub spec_ref: String,
    pub in_context: serde_json::Value,
    pub input: serde_json::Value,
    pub result: Option<serde_json::Value>,
    pub published: serde_json::Value,
    pub state: String,
    pub state_info: Option<String>,
    /// Policy bookkeeping bag (retry counters, skip flags, concurrency cap).
    pub runtime_context: serde_json::Value,
    /// Has this task's completion already driven successor evaluation?
    pub processed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// scheduled_calls
// ---------------------------------------------------------------------------

/// A persisted scheduled (delayed) call row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ScheduledCallRow {
    pub id: Uuid,
    /// `None` means "invoke `method_name` as a module-qualified function";
    /// `Some(name)` names an RPC client/registry entry.
    pub target: Option<String>,
    pub method_name: String,
    pub execute_at: DateTime<Utc>,
    pub args: serde_json::Value,
    pub serializers: serde_json::Value,
    pub locked_until: Option<DateTime<Utc>>,
    pub processed: bool,
}

// ---------------------------------------------------------------------------
// actions
// ---------------------------------------------------------------------------

/// A persisted action-invocation row, one per dispatch of a task.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ActionRow {
    pub id: Uuid,
    pub task_execution_id: Uuid,
    pub action_name: String,
    pub input: serde_json::Value,
    pub result: Option<serde_json::Value>,
    pub state: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
