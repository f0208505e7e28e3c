//! The parsed, validated workflow definition.
//!
//! `WorkflowSpec` is produced by the (out-of-scope) YAML loader and handed
//! to [`crate::engine::Engine::start_workflow`] as an already-validated
//! value; we also derive `serde::Deserialize` for it so tests can build one
//! directly from `serde_json::json!` or, via `serde_yaml`, from an inline
//! YAML literal matching the grammar in this module's doc comments.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowType {
    Direct,
    Reverse,
}

/// What a task invokes: a named action, or a sub-workflow by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionRef {
    Action(String),
    SubWorkflow(String),
}

/// One entry of an `on_success`/`on_error`/`on_complete` list.
///
/// Carrying the condition alongside `Next` (rather than as a separate map)
/// preserves textual order, which the sentinel-precedence rule depends on:
/// entries after an activated `Fail`/`Succeed` are never evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EdgeSpec {
    Next {
        #[serde(rename = "task")]
        task: String,
        #[serde(rename = "when", skip_serializing_if = "Option::is_none")]
        condition: Option<String>,
    },
    Sentinel(Sentinel),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentinel {
    Succeed,
    Fail,
    Noop,
}

impl EdgeSpec {
    pub fn next(task: impl Into<String>) -> Self {
        EdgeSpec::Next {
            task: task.into(),
            condition: None,
        }
    }

    pub fn next_if(task: impl Into<String>, condition: impl Into<String>) -> Self {
        EdgeSpec::Next {
            task: task.into(),
            condition: Some(condition.into()),
        }
    }
}

/// Join cardinality for a direct-workflow task with multiple predecessors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinSpec {
    None,
    All,
    One,
    Count(u32),
}

impl Default for JoinSpec {
    fn default() -> Self {
        JoinSpec::None
    }
}

/// `retry:` policy block. `break_on`'s meaning for success is resolved in
/// DESIGN.md: the field is only consulted when the task result is `ERROR`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySpec {
    pub count: u32,
    pub delay: u64,
    #[serde(rename = "break-on", skip_serializing_if = "Option::is_none")]
    pub break_on: Option<String>,
}

/// The six-policy pipeline, matching the `policies:` YAML block
/// field-for-field (`wait-before`, `wait-after`, `retry`, `timeout`,
/// `pause-before`, `concurrency`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPolicies {
    #[serde(rename = "wait-before", default, skip_serializing_if = "Option::is_none")]
    pub wait_before: Option<u64>,
    #[serde(rename = "wait-after", default, skip_serializing_if = "Option::is_none")]
    pub wait_after: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetrySpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(rename = "pause-before", default, skip_serializing_if = "Option::is_none")]
    pub pause_before: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<u32>,
}

impl TaskPolicies {
    /// Fields left unset inherit from the workflow's `task_defaults`.
    pub fn merged_with_defaults(&self, defaults: Option<&TaskPolicies>) -> TaskPolicies {
        let Some(defaults) = defaults else {
            return self.clone();
        };
        TaskPolicies {
            wait_before: self.wait_before.or(defaults.wait_before),
            wait_after: self.wait_after.or(defaults.wait_after),
            retry: self.retry.clone().or_else(|| defaults.retry.clone()),
            timeout: self.timeout.or(defaults.timeout),
            pause_before: self.pause_before.clone().or_else(|| defaults.pause_before.clone()),
            concurrency: self.concurrency.or(defaults.concurrency),
        }
    }
}

/// One task in a workflow definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    pub name: String,
    pub action: ActionRef,
    #[serde(default)]
    pub input_expressions: HashMap<String, String>,
    #[serde(default)]
    pub publish: HashMap<String, String>,
    #[serde(default)]
    pub on_success: Vec<EdgeSpec>,
    #[serde(default)]
    pub on_error: Vec<EdgeSpec>,
    #[serde(default)]
    pub on_complete: Vec<EdgeSpec>,
    #[serde(default)]
    pub requires: HashSet<String>,
    #[serde(default)]
    pub join: JoinSpec,
    #[serde(default)]
    pub policies: TaskPolicies,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskDefaults {
    #[serde(default)]
    pub policies: TaskPolicies,
}

/// An immutable, validated workflow definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub workflow_type: WorkflowType,
    #[serde(default)]
    pub input_params: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_expr: Option<String>,
    pub tasks: IndexMap<String, TaskSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_defaults: Option<TaskDefaults>,
}

impl WorkflowSpec {
    pub fn task(&self, name: &str) -> Option<&TaskSpec> {
        self.tasks.get(name)
    }

    pub fn effective_policies(&self, task: &TaskSpec) -> TaskPolicies {
        task.policies
            .merged_with_defaults(self.task_defaults.as_ref().map(|d| &d.policies))
    }

    /// Tasks with no inbound edge from any other task's `on_success`/
    /// `on_error`/`on_complete` lists — the direct-handler initial set.
    /// Order matches declaration order in `tasks` so discovery is
    /// deterministic.
    pub fn initial_tasks_direct(&self) -> Vec<&str> {
        let mut has_inbound: HashSet<&str> = HashSet::new();
        for task in self.tasks.values() {
            for edge in task
                .on_success
                .iter()
                .chain(&task.on_error)
                .chain(&task.on_complete)
            {
                if let EdgeSpec::Next { task: next, .. } = edge {
                    has_inbound.insert(next.as_str());
                }
            }
        }
        self.tasks
            .keys()
            .map(String::as_str)
            .filter(|name| !has_inbound.contains(name))
            .collect()
    }

    /// Every `(predecessor, successor)` arc implied by `on_success`/
    /// `on_error`/`on_complete`, used by the direct handler to discover a
    /// task's predecessor set for join evaluation. Cycles are legal here —
    /// join gating only needs set-membership checks, not acyclicity.
    pub fn predecessor_arcs(&self) -> Vec<(&str, &str)> {
        let mut arcs = Vec::new();
        for (name, task) in &self.tasks {
            for edge in task
                .on_success
                .iter()
                .chain(&task.on_error)
                .chain(&task.on_complete)
            {
                if let EdgeSpec::Next { task: next, .. } = edge {
                    arcs.push((name.as_str(), next.as_str()));
                }
            }
        }
        arcs
    }

    pub fn predecessors_of<'a>(&'a self, task_name: &str) -> Vec<&'a str> {
        self.predecessor_arcs()
            .into_iter()
            .filter(|(_, succ)| *succ == task_name)
            .map(|(pred, _)| pred)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_spec() -> WorkflowSpec {
        let yaml = r#"
name: demo
type: direct
tasks:
  task1:
    name: task1
    action: { action: echo }
    on_complete:
      - { task: task3 }
  task2:
    name: task2
    action: { action: echo }
    on_complete:
      - { task: task3 }
  task3:
    name: task3
    action: { action: echo }
    join: all
"#;
        serde_yaml::from_str(yaml).expect("valid spec yaml")
    }

    #[test]
    fn initial_tasks_excludes_nodes_with_inbound_edges() {
        let spec = sample_spec();
        let mut initial = spec.initial_tasks_direct();
        initial.sort();
        assert_eq!(initial, vec!["task1", "task2"]);
    }

    #[test]
    fn predecessors_of_join_task_include_both_branches() {
        let spec = sample_spec();
        let mut preds = spec.predecessors_of("task3");
        preds.sort();
        assert_eq!(preds, vec!["task1", "task2"]);
    }

    #[test]
    fn policies_inherit_from_task_defaults() {
        let yaml = r#"
name: demo
type: direct
task_defaults:
  policies:
    retry: { count: 3, delay: 1 }
tasks:
  task1:
    name: task1
    action: { action: echo }
"#;
        let spec: WorkflowSpec = serde_yaml::from_str(yaml).unwrap();
        let task = spec.task("task1").unwrap();
        let effective = spec.effective_policies(task);
        assert_eq!(effective.retry.unwrap().count, 3);
    }
}
