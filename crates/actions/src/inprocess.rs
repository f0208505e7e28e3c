//! `InProcessActionRunner` — a registry of named closures.
//!
//! The concrete, in-process `ActionRunner` the CLI wires up for `serve`/
//! `worker`, grounded on `mock::RecordingActionRunner`'s shape but backed by
//! real callables instead of canned behaviours. Actions register a
//! `Fn(Value) -> Result<Value, ActionError>` under a name; unregistered
//! names behave like a real out-of-process dispatcher that can't resolve
//! the action.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::{traits::ActionContext, ActionError, ActionRunner};

type ActionFn = Box<dyn Fn(Value) -> Result<Value, ActionError> + Send + Sync>;

#[derive(Default)]
pub struct InProcessActionRunner {
    actions: Mutex<HashMap<String, ActionFn>>,
}

impl InProcessActionRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name` with the built-in `echo` action alongside it.
    pub fn with_builtins() -> Self {
        let runner = Self::new();
        runner.register("echo", |input| Ok(input));
        runner.register("noop", |_input| Ok(Value::Null));
        runner.register("fail", |input| {
            Err(ActionError::Runtime(
                input.as_str().unwrap_or("action failed").to_string(),
            ))
        });
        runner
    }

    pub fn register<F>(&self, name: impl Into<String>, f: F)
    where
        F: Fn(Value) -> Result<Value, ActionError> + Send + Sync + 'static,
    {
        self.actions.lock().unwrap().insert(name.into(), Box::new(f));
    }
}

#[async_trait]
impl ActionRunner for InProcessActionRunner {
    async fn execute(
        &self,
        action_name: &str,
        input: Value,
        _ctx: &ActionContext,
    ) -> Result<Value, ActionError> {
        let guard = self.actions.lock().unwrap();
        let Some(action) = guard.get(action_name) else {
            return Err(ActionError::NotFound(action_name.to_string()));
        };
        action(input)
    }
}
