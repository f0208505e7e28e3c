//! `RecordingActionRunner` — a test double for `ActionRunner`.
//!
//! Useful in unit and integration tests where a real action implementation
//! is either unavailable or irrelevant. Records every call it receives and
//! returns a programmer-specified result, keyed by action name.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::{ActionError, ActionRunner, traits::ActionContext};

/// Behaviour injected into `RecordingActionRunner` for a given action name.
#[derive(Clone)]
pub enum MockBehaviour {
    /// Return a specific JSON value.
    ReturnValue(Value),
    /// Fail with [`ActionError::Runtime`].
    FailRuntime(String),
}

/// A mock runner that records every call it receives and dispatches to a
/// programmer-specified behaviour per action name. Unregistered action
/// names yield [`ActionError::NotFound`], mirroring a real dispatcher.
#[derive(Default)]
pub struct RecordingActionRunner {
    behaviours: Mutex<HashMap<String, MockBehaviour>>,
    calls: Mutex<Vec<(String, Value)>>,
}

impl RecordingActionRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a deterministic result for `action_name`.
    pub fn returning(&self, action_name: impl Into<String>, value: Value) {
        self.behaviours
            .lock()
            .unwrap()
            .insert(action_name.into(), MockBehaviour::ReturnValue(value));
    }

    /// Register a runtime failure for `action_name`.
    pub fn failing(&self, action_name: impl Into<String>, msg: impl Into<String>) {
        self.behaviours
            .lock()
            .unwrap()
            .insert(action_name.into(), MockBehaviour::FailRuntime(msg.into()));
    }

    /// Number of times `action_name` has been invoked.
    pub fn call_count(&self, action_name: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(name, _)| name == action_name)
            .count()
    }
}

#[async_trait]
impl ActionRunner for RecordingActionRunner {
    async fn execute(
        &self,
        action_name: &str,
        input: Value,
        _ctx: &ActionContext,
    ) -> Result<Value, ActionError> {
        self.calls
            .lock()
            .unwrap()
            .push((action_name.to_string(), input));

        let behaviour = self.behaviours.lock().unwrap().get(action_name).cloned();

        match behaviour {
            Some(MockBehaviour::ReturnValue(v)) => Ok(v),
            Some(MockBehaviour::FailRuntime(msg)) => Err(ActionError::Runtime(msg)),
            None => Err(ActionError::NotFound(action_name.to_string())),
        }
    }
}
