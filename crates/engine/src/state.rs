//! Workflow and task state machines.
//!
//! States round-trip through the `state` text columns of
//! `workflow_executions`/`task_executions` as lowercase strings so the
//! persisted value is self-describing in a `psql` session.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowState {
    Idle,
    Running,
    Paused,
    Success,
    Error,
}

impl WorkflowState {
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkflowState::Success | WorkflowState::Error)
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkflowState::Idle => "idle",
            WorkflowState::Running => "running",
            WorkflowState::Paused => "paused",
            WorkflowState::Success => "success",
            WorkflowState::Error => "error",
        };
        f.write_str(s)
    }
}

impl FromStr for WorkflowState {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(WorkflowState::Idle),
            "running" => Ok(WorkflowState::Running),
            "paused" => Ok(WorkflowState::Paused),
            "success" => Ok(WorkflowState::Success),
            "error" => Ok(WorkflowState::Error),
            other => Err(EngineError::Internal(format!(
                "unknown workflow state '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Idle,
    Running,
    Delayed,
    Success,
    Error,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Success | TaskState::Error)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::Idle => "idle",
            TaskState::Running => "running",
            TaskState::Delayed => "delayed",
            TaskState::Success => "success",
            TaskState::Error => "error",
        };
        f.write_str(s)
    }
}

impl FromStr for TaskState {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(TaskState::Idle),
            "running" => Ok(TaskState::Running),
            "delayed" => Ok(TaskState::Delayed),
            "success" => Ok(TaskState::Success),
            "error" => Ok(TaskState::Error),
            other => Err(EngineError::Internal(format!(
                "unknown task state '{other}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workflow_state_round_trips_through_strings() {
        for s in [
            WorkflowState::Idle,
            WorkflowState::Running,
            WorkflowState::Paused,
            WorkflowState::Success,
            WorkflowState::Error,
        ] {
            assert_eq!(s.to_string().parse::<WorkflowState>().unwrap(), s);
        }
    }

    #[test]
    fn task_state_is_terminal() {
        assert!(!TaskState::Idle.is_terminal());
        assert!(!TaskState::Running.is_terminal());
        assert!(!TaskState::Delayed.is_terminal());
        assert!(TaskState::Success.is_terminal());
        assert!(TaskState::Error.is_terminal());
    }
}
