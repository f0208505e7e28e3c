//! Process-wide registry of call targets.
//!
//! A [`ScheduledCallRow`](db::models::ScheduledCallRow) names a `target`
//! (or `None` for the default engine target) and a `method_name`. The
//! registry resolves `target` to a concrete [`CallTarget`] at dispatch time,
//! the same string-keyed-lookup shape `engine::client` uses to resolve
//! `EngineClient` implementations — both stand in for Mistral's
//! dotted-module-path RPC dispatch with an explicit Rust interface.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::SchedulerError;

/// Something a scheduled call can be dispatched to.
#[async_trait]
pub trait CallTarget: Send + Sync {
    async fn invoke(&self, method_name: &str, args: Value) -> Result<(), SchedulerError>;
}

pub const DEFAULT_TARGET: &str = "engine";

/// Maps target names to the [`CallTarget`] that handles them.
#[derive(Default, Clone)]
pub struct Registry {
    targets: HashMap<String, Arc<dyn CallTarget>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            targets: HashMap::new(),
        }
    }

    pub fn register(&mut self, name: impl Into<String>, target: Arc<dyn CallTarget>) {
        self.targets.insert(name.into(), target);
    }

    pub async fn dispatch(
        &self,
        target: Option<&str>,
        method_name: &str,
        args: Value,
    ) -> Result<(), SchedulerError> {
        let key = target.unwrap_or(DEFAULT_TARGET);
        let target = self
            .targets
            .get(key)
            .ok_or_else(|| SchedulerError::UnknownTarget(key.to_string()))?;

        target.invoke(method_name, args).await
    }
}
