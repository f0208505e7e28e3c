//! Bridges a ready task to an [`actions::ActionRunner`].
//!
//! Every action runner in this workspace is in-process, so unlike a real
//! out-of-process RPC worker there is no separate async hand-off: dispatch
//! awaits the runner directly and returns a [`TaskResult`] the caller feeds
//! into `on_task_result` itself. `on_action_complete` still exists on
//! [`crate::engine::Engine`] for callers that complete a task out of band
//! (e.g. the `PUT /v2/tasks/{id}` external-completion channel).

use std::sync::Arc;

use actions::{ActionContext, ActionRunner};
use serde_json::Value;

use crate::execution::TaskResult;
use crate::spec::ActionRef;

pub struct Dispatcher {
    runner: Arc<dyn ActionRunner>,
}

impl Dispatcher {
    pub fn new(runner: Arc<dyn ActionRunner>) -> Self {
        Self { runner }
    }

    /// Invoke the action named by `action_ref` with `input`, translating
    /// both runtime success and failure into a [`TaskResult`] so the
    /// engine can run the same publish/retry pipeline regardless of
    /// outcome. A dispatch that can't even start (unknown action,
    /// malformed args) surfaces the same way — folded into a synchronous
    /// `on_task_result` too.
    pub async fn dispatch(
        &self,
        action_ref: &ActionRef,
        input: Value,
        ctx: &ActionContext,
    ) -> TaskResult {
        let action_name = match action_ref {
            // Sub-workflow recursion is outside this engine's scope; treated
            // as a named action so a registered runner can still stand in
            // for one.
            ActionRef::Action(name) | ActionRef::SubWorkflow(name) => name.as_str(),
        };

        match self.runner.execute(action_name, input, ctx).await {
            Ok(value) => TaskResult::success(value),
            Err(e) => TaskResult::error(e.to_string()),
        }
    }
}
