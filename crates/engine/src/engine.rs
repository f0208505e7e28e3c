//! The orchestrator: `start_workflow`, `run_task`, `on_task_result`,
//! `on_action_complete`, plus the pause/resume/stop lifecycle and the
//! read-only accessors the REST surface needs.
//!
//! Every public operation here is meant to be safe under concurrent,
//! at-least-once invocation (the scheduler's failure semantics demand it):
//! state-machine guards at the top of `run_task`/`on_task_result` make
//! repeat calls no-ops rather than double effects.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use actions::ActionContext;

use crate::dispatch::Dispatcher;
use crate::error::EngineError;
use crate::execution::{TaskExecution, TaskResult, WorkflowExecution};
use crate::handler::{self, merge_objects, Terminal};
use crate::policy::{Policy, PolicyOutcome};
use crate::spec::{ActionRef, WorkflowSpec};
use crate::state::{TaskState, WorkflowState};
use crate::store::Store;

pub struct Engine {
    store: Arc<dyn Store>,
    dispatcher: Dispatcher,
    expr: Arc<dyn expr::Expr>,
}

impl Engine {
    pub fn new(store: Arc<dyn Store>, dispatcher: Dispatcher, expr: Arc<dyn expr::Expr>) -> Self {
        Self { store, dispatcher, expr }
    }

    #[instrument(skip(self, input, params), fields(workflow_name = %name))]
    pub async fn start_workflow(
        &self,
        name: &str,
        input: Value,
        params: Value,
    ) -> Result<WorkflowExecution, EngineError> {
        let spec = self.store.get_workflow_spec(name).await?;
        validate_input(&spec, &input)?;

        let mut workflow = self
            .store
            .create_workflow_execution(name, spec, input, params, WorkflowState::Running)
            .await?;

        // Seed the evaluation context with the submitted input so
        // `input_expressions`/`publish` templates can reference `$.param1`
        // directly, the way the workflows this engine runs expect.
        workflow.context = merge_objects(&workflow.context, &workflow.input.clone());
        self.persist_workflow_context(&workflow).await?;

        let handler = handler::for_workflow_type(workflow.spec.workflow_type);
        let initial = handler.initial_tasks(&workflow).await?;
        info!(execution_id = %workflow.id, tasks = ?initial, "workflow started");

        // `activate_task` itself no-ops once the workflow has gone terminal,
        // so a sibling leaf that hard-fails earlier in this loop (no
        // on-error/on-complete edge) stops the remaining initial tasks from
        // ever being created.
        for task_name in &initial {
            self.activate_task(&workflow, task_name).await?;
        }

        self.store.get_workflow_execution(workflow.id).await
    }

    #[instrument(skip(self), fields(task_id = %task_id))]
    pub async fn run_task(&self, task_id: Uuid) -> Result<TaskExecution, EngineError> {
        let mut task = self.store.get_task_execution(task_id).await?;
        if task.state == TaskState::Running || task.state.is_terminal() {
            return Ok(task);
        }

        let workflow = self.store.get_workflow_execution(task.workflow_execution_id).await?;
        let task_spec = workflow
            .spec
            .task(&task.name)
            .cloned()
            .ok_or_else(|| EngineError::InvalidSpec(format!("unknown task '{}'", task.name)))?;
        let policies = workflow.spec.effective_policies(&task_spec);

        for policy in &Policy::pipeline(&policies) {
            match policy.before_task_start(&mut task, self.store.as_ref(), self.expr.as_ref()).await? {
                PolicyOutcome::Continue => {}
                PolicyOutcome::Deferred => {
                    self.persist_task(&task).await?;
                    return Ok(task);
                }
                PolicyOutcome::WorkflowPaused => {
                    self.persist_task(&task).await?;
                    self.persist_workflow_state(&workflow, WorkflowState::Paused, workflow.state_info.clone())
                        .await?;
                    return Ok(task);
                }
            }
        }

        if task.state.is_terminal() {
            return Ok(task);
        }

        // Persist whatever the policy pipeline above mutated before we risk
        // bailing out below; an expression failure must not lose it.
        self.persist_task(&task).await?;

        let mut resolved = serde_json::Map::new();
        for (key, template) in &task_spec.input_expressions {
            match self.expr.evaluate(template, &task.in_context) {
                Ok(value) => {
                    resolved.insert(key.clone(), value);
                }
                Err(e) => {
                    // An ExpressionError surfaces as a task result ERROR and
                    // terminates via the normal error path, the same as a
                    // dispatch-time `InvalidAction`.
                    let err = EngineError::Expression(e);
                    return self.on_task_result(task.id, TaskResult::error(err.to_string())).await;
                }
            }
        }
        task.input = Value::Object(resolved);
        task.state = TaskState::Running;
        self.persist_task(&task).await?;

        let action_name = action_ref_name(&task_spec.action);
        let action_id = self
            .store
            .record_action_dispatch(task.id, action_name, task.input.clone())
            .await?;

        let ctx = ActionContext {
            workflow_execution_id: workflow.id,
            task_execution_id: task.id,
            task_name: task.name.clone(),
        };
        let result = self.dispatcher.dispatch(&task_spec.action, task.input.clone(), &ctx).await;
        self.store.record_action_result(action_id, &result).await?;

        self.on_task_result(task.id, result).await
    }

    #[instrument(skip(self, result), fields(task_id = %task_id))]
    pub async fn on_task_result(
        &self,
        task_id: Uuid,
        result: TaskResult,
    ) -> Result<TaskExecution, EngineError> {
        let mut task = self.store.get_task_execution(task_id).await?;
        if task.processed {
            return Ok(task);
        }

        let mut workflow = self.store.get_workflow_execution(task.workflow_execution_id).await?;
        let task_spec = workflow
            .spec
            .task(&task.name)
            .cloned()
            .ok_or_else(|| EngineError::InvalidSpec(format!("unknown task '{}'", task.name)))?;
        let policies = workflow.spec.effective_policies(&task_spec);

        task.state = result.state();
        task.state_info = (!result.success).then(|| stringify(&result.data));
        task.result = Some(result.clone());

        if result.success {
            let eval_ctx = merge_objects(
                &merge_objects(&workflow.context, &task.in_context),
                &json!({ "result": result.data }),
            );
            let mut published = serde_json::Map::new();
            let mut publish_error = None;
            for (key, template) in &task_spec.publish {
                match self.expr.evaluate(template, &eval_ctx) {
                    Ok(value) => {
                        published.insert(key.clone(), value);
                    }
                    Err(e) => {
                        publish_error = Some(e);
                        break;
                    }
                }
            }
            match publish_error {
                None => {
                    task.published = Value::Object(published);
                    workflow.context = merge_objects(&workflow.context, &task.published);
                    self.persist_workflow_context(&workflow).await?;
                }
                Some(e) => {
                    // A publish template failure turns an otherwise
                    // successful action result into a task ERROR (an
                    // ExpressionError surfaces as a task result ERROR and
                    // terminates via the normal error path) rather than
                    // aborting `on_task_result` itself.
                    let err = EngineError::Expression(e);
                    task.state = TaskState::Error;
                    task.state_info = Some(err.to_string());
                    task.result = Some(TaskResult::error(err.to_string()));
                    warn!(task = %task.name, error = %err, "publish expression failed");
                }
            }
        } else {
            warn!(task = %task.name, error = %stringify(&task.result.as_ref().unwrap().data), "task errored");
        }

        self.persist_task(&task).await?;

        for policy in &Policy::pipeline(&policies) {
            match policy
                .after_task_complete(&mut task, workflow.id, self.store.as_ref(), self.expr.as_ref())
                .await?
            {
                PolicyOutcome::Continue => {}
                PolicyOutcome::Deferred => {
                    self.persist_task(&task).await?;
                    return Ok(task);
                }
                PolicyOutcome::WorkflowPaused => {
                    self.persist_task(&task).await?;
                    self.persist_workflow_state(&workflow, WorkflowState::Paused, workflow.state_info.clone())
                        .await?;
                    return Ok(task);
                }
            }
        }

        task.processed = true;
        self.persist_task(&task).await?;

        let handler = handler::for_workflow_type(workflow.spec.workflow_type);
        let decision = handler
            .on_task_terminal(&workflow, &task, self.store.as_ref(), self.expr.as_ref())
            .await?;

        // Activations discovered before a sentinel in the same edge list
        // (`on-complete: [task3, task4, fail, ...]`) must still run to
        // completion even though the workflow itself is about to
        // terminate; apply the terminal decision last so it always wins
        // over whatever state those activations' own recursive
        // `on_task_result` calls settled on.
        for name in &decision.activate {
            self.activate_task(&workflow, name).await?;
        }

        if let Some(terminal) = decision.terminate {
            self.finish_workflow(&workflow, terminal).await?;
        } else if decision.activate.is_empty() {
            self.maybe_complete_workflow(&workflow).await?;
        }

        Ok(task)
    }

    pub async fn on_action_complete(
        &self,
        action_id: Uuid,
        result: TaskResult,
    ) -> Result<TaskExecution, EngineError> {
        let task_id = self.store.find_task_id_for_action(action_id).await?;
        self.on_task_result(task_id, result).await
    }

    /// Fired by the `timeout` policy's scheduled callback.
    pub async fn fail_task_if_incomplete(&self, task_id: Uuid, timeout: u64) -> Result<(), EngineError> {
        let task = self.store.get_task_execution(task_id).await?;
        if !task.state.is_terminal() {
            self.on_task_result(task_id, TaskResult::error(EngineError::Timeout(timeout).to_string()))
                .await?;
        }
        Ok(())
    }

    pub async fn pause_workflow(&self, id: Uuid) -> Result<WorkflowExecution, EngineError> {
        let workflow = self.store.get_workflow_execution(id).await?;
        if workflow.state == WorkflowState::Running {
            self.persist_workflow_state(&workflow, WorkflowState::Paused, workflow.state_info.clone())
                .await?;
        }
        self.store.get_workflow_execution(id).await
    }

    pub async fn resume_workflow(&self, id: Uuid) -> Result<WorkflowExecution, EngineError> {
        let workflow = self.store.get_workflow_execution(id).await?;
        if workflow.state != WorkflowState::Paused {
            return Ok(workflow);
        }
        self.persist_workflow_state(&workflow, WorkflowState::Running, None).await?;

        let idle_tasks: Vec<Uuid> = self
            .store
            .list_task_executions(id)
            .await?
            .into_iter()
            .filter(|t| t.state == TaskState::Idle)
            .map(|t| t.id)
            .collect();
        for task_id in idle_tasks {
            self.run_task(task_id).await?;
        }

        self.store.get_workflow_execution(id).await
    }

    pub async fn stop_workflow(&self, id: Uuid) -> Result<WorkflowExecution, EngineError> {
        let workflow = self.store.get_workflow_execution(id).await?;
        if !workflow.state.is_terminal() {
            self.persist_workflow_state(&workflow, WorkflowState::Error, Some("stopped".to_string()))
                .await?;
        }
        self.store.get_workflow_execution(id).await
    }

    pub async fn get_task(&self, id: Uuid) -> Result<TaskExecution, EngineError> {
        self.store.get_task_execution(id).await
    }

    pub async fn get_execution(&self, id: Uuid) -> Result<WorkflowExecution, EngineError> {
        self.store.get_workflow_execution(id).await
    }

    pub async fn list_tasks_for_execution(&self, id: Uuid) -> Result<Vec<TaskExecution>, EngineError> {
        self.store.list_task_executions(id).await
    }

    async fn activate_task(&self, workflow: &WorkflowExecution, task_name: &str) -> Result<(), EngineError> {
        // A concurrently-activated sibling may have already pushed the
        // workflow to a terminal state; once that's true no further task
        // gets created.
        if self.store.get_workflow_execution(workflow.id).await?.state.is_terminal() {
            return Ok(());
        }
        if workflow.spec.task(task_name).is_none() {
            return Err(EngineError::InvalidSpec(format!("unknown task '{task_name}'")));
        }
        let task = self
            .store
            .create_task_execution(workflow.id, task_name, task_name, workflow.context.clone(), TaskState::Idle)
            .await?;
        self.run_task(task.id).await?;
        Ok(())
    }

    async fn finish_workflow(&self, workflow: &WorkflowExecution, terminal: Terminal) -> Result<(), EngineError> {
        // Re-read the persisted state rather than trusting the possibly
        // stale `workflow` snapshot: a workflow that has already reached
        // SUCCESS or ERROR must never be overwritten by a later-settling
        // sibling.
        if self.store.get_workflow_execution(workflow.id).await?.state.is_terminal() {
            return Ok(());
        }

        let (state, state_info) = match terminal {
            Terminal::Succeed => (WorkflowState::Success, None),
            Terminal::Fail(msg) => (WorkflowState::Error, Some(msg)),
        };
        let output = if state == WorkflowState::Success {
            self.compute_output(&workflow.spec, &workflow.context)?
        } else {
            workflow.output.clone()
        };
        info!(execution_id = %workflow.id, %state, "workflow finished");
        self.store
            .update_workflow_execution(workflow.id, state, state_info, workflow.context.clone(), output)
            .await?;
        Ok(())
    }

    async fn maybe_complete_workflow(&self, workflow: &WorkflowExecution) -> Result<(), EngineError> {
        if self.store.get_workflow_execution(workflow.id).await?.state.is_terminal() {
            return Ok(());
        }
        let tasks = self.store.list_task_executions(workflow.id).await?;
        if !tasks.is_empty() && tasks.iter().all(|t| t.state.is_terminal()) {
            self.finish_workflow(workflow, Terminal::Succeed).await?;
        }
        Ok(())
    }

    fn compute_output(&self, spec: &WorkflowSpec, context: &Value) -> Result<Value, EngineError> {
        match &spec.output_expr {
            Some(template) => Ok(self.expr.evaluate(template, context)?),
            None => Ok(context.clone()),
        }
    }

    async fn persist_task(&self, task: &TaskExecution) -> Result<(), EngineError> {
        self.store
            .update_task_execution(
                task.id,
                task.input.clone(),
                task.result.clone(),
                task.published.clone(),
                task.state,
                task.state_info.clone(),
                task.runtime_context.clone(),
                task.processed,
            )
            .await
    }

    async fn persist_workflow_context(&self, workflow: &WorkflowExecution) -> Result<(), EngineError> {
        self.store
            .update_workflow_execution(
                workflow.id,
                workflow.state,
                workflow.state_info.clone(),
                workflow.context.clone(),
                workflow.output.clone(),
            )
            .await
    }

    async fn persist_workflow_state(
        &self,
        workflow: &WorkflowExecution,
        state: WorkflowState,
        state_info: Option<String>,
    ) -> Result<(), EngineError> {
        self.store
            .update_workflow_execution(workflow.id, state, state_info, workflow.context.clone(), workflow.output.clone())
            .await
    }
}

fn action_ref_name(action: &ActionRef) -> &str {
    match action {
        ActionRef::Action(name) | ActionRef::SubWorkflow(name) => name,
    }
}

fn stringify(value: &Value) -> String {
    value.as_str().map(str::to_string).unwrap_or_else(|| value.to_string())
}

/// Fails with `InvalidInput` on missing or extra keys relative to the
/// workflow's declared `input_params`.
fn validate_input(spec: &WorkflowSpec, input: &Value) -> Result<(), EngineError> {
    let declared: HashSet<&str> = spec.input_params.iter().map(String::as_str).collect();
    let provided: HashSet<&str> = input
        .as_object()
        .map(|obj| obj.keys().map(String::as_str).collect())
        .unwrap_or_default();

    if declared != provided {
        let mut missing: Vec<&str> = declared.difference(&provided).copied().collect();
        let mut extra: Vec<&str> = provided.difference(&declared).copied().collect();
        missing.sort();
        extra.sort();
        return Err(EngineError::InvalidInput(format!(
            "missing params {missing:?}, unexpected params {extra:?}"
        )));
    }
    Ok(())
}
