//! End-to-end coverage of the orchestrator against an in-memory store: the
//! direct/reverse handlers, the join gate, and the retry policy, driven the
//! way a real caller would — `start_workflow` then whatever `run_task`/
//! `on_task_result` calls the engine itself makes along the way.

use std::sync::Arc;

use serde_json::json;

use actions::InProcessActionRunner;
use engine::store::FakeStore;
use engine::{Dispatcher, Engine, Store, TaskState, WorkflowSpec, WorkflowState};
use expr::TemplateExpr;

fn test_engine() -> (Arc<FakeStore>, Engine) {
    let store = Arc::new(FakeStore::new());
    let runner = Arc::new(InProcessActionRunner::with_builtins());
    let dispatcher = Dispatcher::new(runner);
    let expr: Arc<dyn expr::Expr> = Arc::new(TemplateExpr);
    let dyn_store: Arc<dyn Store> = store.clone();
    let engine = Engine::new(dyn_store, dispatcher, expr);
    (store, engine)
}

fn spec_from_yaml(yaml: &str) -> WorkflowSpec {
    serde_yaml::from_str(yaml).expect("valid workflow yaml")
}

#[tokio::test]
async fn direct_on_complete_sentinels_stop_successor_evaluation() {
    let yaml = r#"
name: sentinels
type: direct
tasks:
  task1:
    name: task1
    action: { action: echo }
    on_complete:
      - { task: task3 }
      - { task: task4 }
      - fail
      - { task: never_gets_here }
  task3:
    name: task3
    action: { action: echo }
  task4:
    name: task4
    action: { action: echo }
  never_gets_here:
    name: never_gets_here
    action: { action: echo }
"#;
    let (store, engine) = test_engine();
    store.register_workflow(spec_from_yaml(yaml));

    let wf = engine.start_workflow("sentinels", json!({}), json!({})).await.unwrap();

    let tasks = engine.list_tasks_for_execution(wf.id).await.unwrap();
    let mut names: Vec<&str> = tasks.iter().map(|t| t.name.as_str()).collect();
    names.sort();
    assert_eq!(names, vec!["task1", "task3", "task4"]);
    assert!(tasks.iter().all(|t| t.state == TaskState::Success));

    let wf = engine.get_execution(wf.id).await.unwrap();
    assert_eq!(wf.state, WorkflowState::Error);
}

#[tokio::test]
async fn full_join_all_success() {
    let yaml = r#"
name: join_ok
type: direct
tasks:
  task1:
    name: task1
    action: { action: echo }
    input_expressions:
      value: "<% 1 %>"
    publish:
      result1: "<% $.result.value %>"
    on_complete:
      - { task: task3 }
  task2:
    name: task2
    action: { action: echo }
    input_expressions:
      value: "<% 2 %>"
    publish:
      result2: "<% $.result.value %>"
    on_complete:
      - { task: task3 }
  task3:
    name: task3
    action: { action: echo }
    join: all
    input_expressions:
      value: "<% $.result1 %>,<% $.result2 %>"
    publish:
      result3: "<% $.result.value %>"
output_expr: "<% $.result3 %>"
"#;
    let (store, engine) = test_engine();
    store.register_workflow(spec_from_yaml(yaml));

    let wf = engine.start_workflow("join_ok", json!({}), json!({})).await.unwrap();
    let wf = engine.get_execution(wf.id).await.unwrap();

    assert_eq!(wf.state, WorkflowState::Success);
    assert_eq!(wf.output, json!("1,2"));
    assert_eq!(wf.context.get("result1"), Some(&json!(1)));
    assert_eq!(wf.context.get("result2"), Some(&json!(2)));

    let tasks = engine.list_tasks_for_execution(wf.id).await.unwrap();
    assert_eq!(tasks.len(), 3);
    assert!(tasks.iter().all(|t| t.state == TaskState::Success));
}

#[tokio::test]
async fn full_join_with_errors() {
    let yaml = r#"
name: join_err
type: direct
tasks:
  task1:
    name: task1
    action: { action: echo }
    input_expressions:
      value: "<% 1 %>"
    publish:
      result1: "<% $.result.value %>"
    on_complete:
      - { task: task3 }
  task2:
    name: task2
    action: { action: fail }
    on_error:
      - { task: task3 }
  task3:
    name: task3
    action: { action: echo }
    join: all
    input_expressions:
      value: "<% $.result1 %>-<% $.result1 %>"
    publish:
      result3: "<% $.result.value %>"
"#;
    let (store, engine) = test_engine();
    store.register_workflow(spec_from_yaml(yaml));

    let wf = engine.start_workflow("join_err", json!({}), json!({})).await.unwrap();
    let tasks = engine.list_tasks_for_execution(wf.id).await.unwrap();

    let task1 = tasks.iter().find(|t| t.name == "task1").unwrap();
    let task2 = tasks.iter().find(|t| t.name == "task2").unwrap();
    let task3 = tasks.iter().find(|t| t.name == "task3").unwrap();
    assert_eq!(task1.state, TaskState::Success);
    assert_eq!(task2.state, TaskState::Error);
    assert_eq!(task3.state, TaskState::Success);

    let wf = engine.get_execution(wf.id).await.unwrap();
    assert_eq!(wf.state, WorkflowState::Success);
    assert_eq!(wf.context.get("result3"), Some(&json!("1-1")));
}

#[tokio::test]
async fn partial_join_fires_once_at_cardinality() {
    let yaml = r#"
name: partial_join
type: direct
tasks:
  task1:
    name: task1
    action: { action: echo }
    input_expressions:
      value: "<% 1 %>"
    publish:
      result1: "<% $.result.value %>"
    on_complete:
      - { task: task4 }
  task2:
    name: task2
    action: { action: echo }
    input_expressions:
      value: "<% 2 %>"
    publish:
      result2: "<% $.result.value %>"
    on_complete:
      - { task: task4 }
  task3:
    name: task3
    action: { action: fail }
    on_success:
      - { task: task4 }
    on_error:
      - noop
  task4:
    name: task4
    action: { action: echo }
    join: 2
    input_expressions:
      value: "<% $.result1 %>,<% $.result2 %>"
    publish:
      result4: "<% $.result.value %>"
"#;
    let (store, engine) = test_engine();
    store.register_workflow(spec_from_yaml(yaml));

    let wf = engine.start_workflow("partial_join", json!({}), json!({})).await.unwrap();
    let tasks = engine.list_tasks_for_execution(wf.id).await.unwrap();
    assert_eq!(tasks.len(), 4);

    let task4s: Vec<_> = tasks.iter().filter(|t| t.name == "task4").collect();
    assert_eq!(task4s.len(), 1, "join task must be created at most once");
    assert_eq!(task4s[0].state, TaskState::Success);
    assert_eq!(task4s[0].published.get("result4"), Some(&json!("1,2")));

    let task3 = tasks.iter().find(|t| t.name == "task3").unwrap();
    assert_eq!(task3.state, TaskState::Error);

    let wf = engine.get_execution(wf.id).await.unwrap();
    assert_eq!(wf.state, WorkflowState::Success);
}

#[tokio::test]
async fn discriminator_join_one_fires_on_first_completion() {
    let yaml = r#"
name: discriminator
type: direct
tasks:
  task1:
    name: task1
    action: { action: noop }
    publish:
      result1: "<% 1 %>"
    on_complete:
      - { task: task4 }
  task2:
    name: task2
    action: { action: noop }
    publish:
      result2: "<% 2 %>"
    on_complete:
      - { task: task4 }
  task3:
    name: task3
    action: { action: noop }
    publish:
      result3: "<% 3 %>"
    on_complete:
      - { task: task4 }
  task4:
    name: task4
    action: { action: echo }
    join: one
    input_expressions:
      value: "<% $.result1 %>,<% $.result2 %>,<% $.result3 %>"
    publish:
      result4: "<% $.result.value %>"
"#;
    let (store, engine) = test_engine();
    store.register_workflow(spec_from_yaml(yaml));

    let wf = engine.start_workflow("discriminator", json!({}), json!({})).await.unwrap();
    let tasks = engine.list_tasks_for_execution(wf.id).await.unwrap();
    assert_eq!(tasks.len(), 4);

    let task4s: Vec<_> = tasks.iter().filter(|t| t.name == "task4").collect();
    assert_eq!(task4s.len(), 1);

    let result4 = task4s[0].published.get("result4").and_then(|v| v.as_str()).unwrap();
    assert_eq!(result4.matches("None").count(), 2);

    let wf = engine.get_execution(wf.id).await.unwrap();
    assert_eq!(wf.state, WorkflowState::Success);
}

fn reverse_workflow_spec() -> WorkflowSpec {
    let yaml = r#"
name: reverse_demo
type: reverse
input_params:
  - param1
  - param2
tasks:
  task1:
    name: task1
    action: { action: echo }
    input_expressions:
      value: "<% $.param1 %>"
    publish:
      result1: "<% $.result.value %>"
  task2:
    name: task2
    action: { action: echo }
    requires:
      - task1
    input_expressions:
      value: "<% $.result1 %> & <% $.param2 %>"
    publish:
      result2: "<% $.result.value %>"
"#;
    spec_from_yaml(yaml)
}

#[tokio::test]
async fn reverse_workflow_pulls_in_transitive_requires() {
    let (store, engine) = test_engine();
    store.register_workflow(reverse_workflow_spec());

    let wf = engine
        .start_workflow(
            "reverse_demo",
            json!({ "param1": "a", "param2": "b" }),
            json!({ "task_name": "task2" }),
        )
        .await
        .unwrap();

    let tasks = engine.list_tasks_for_execution(wf.id).await.unwrap();
    let mut names: Vec<&str> = tasks.iter().map(|t| t.name.as_str()).collect();
    names.sort();
    assert_eq!(names, vec!["task1", "task2"]);
    assert!(tasks.iter().all(|t| t.state == TaskState::Success));

    let wf = engine.get_execution(wf.id).await.unwrap();
    assert_eq!(wf.state, WorkflowState::Success);
    assert_eq!(wf.context.get("result2"), Some(&json!("a & b")));
}

#[tokio::test]
async fn reverse_workflow_goal_with_no_requires_creates_one_task() {
    let (store, engine) = test_engine();
    store.register_workflow(reverse_workflow_spec());

    let wf = engine
        .start_workflow(
            "reverse_demo",
            json!({ "param1": "a", "param2": "b" }),
            json!({ "task_name": "task1" }),
        )
        .await
        .unwrap();

    let tasks = engine.list_tasks_for_execution(wf.id).await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].name, "task1");

    let wf = engine.get_execution(wf.id).await.unwrap();
    assert_eq!(wf.state, WorkflowState::Success);
}

#[tokio::test]
async fn retry_exhausts_and_dispatch_count_matches_min_k_plus_one_count() {
    let yaml = r#"
name: retrying
type: direct
tasks:
  task1:
    name: task1
    action: { action: fail }
    policies:
      retry: { count: 3, delay: 1 }
"#;
    let (store, engine) = test_engine();
    store.register_workflow(spec_from_yaml(yaml));

    let wf = engine.start_workflow("retrying", json!({}), json!({})).await.unwrap();
    let task = engine
        .list_tasks_for_execution(wf.id)
        .await
        .unwrap()
        .into_iter()
        .find(|t| t.name == "task1")
        .unwrap();

    // First attempt already dispatched by `start_workflow`; drain the two
    // scheduled retries the way the scheduler poll loop would.
    for _ in 0..2 {
        let due = store.drain_due_calls(chrono::Utc::now() + chrono::Duration::seconds(2));
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].method_name, "run_task");
        engine.run_task(task.id).await.unwrap();
    }

    let task = engine.get_task(task.id).await.unwrap();
    assert_eq!(task.state, TaskState::Error);
    assert!(task.runtime_context.get("retry_task_policy").is_none());
    assert_eq!(store.count_action_dispatches(task.id).await.unwrap(), 3);

    let wf = engine.get_execution(wf.id).await.unwrap();
    assert_eq!(wf.state, WorkflowState::Error);
}

#[tokio::test]
async fn retry_count_one_means_a_single_attempt() {
    let yaml = r#"
name: no_retry
type: direct
tasks:
  task1:
    name: task1
    action: { action: fail }
    policies:
      retry: { count: 1, delay: 1 }
"#;
    let (store, engine) = test_engine();
    store.register_workflow(spec_from_yaml(yaml));

    let wf = engine.start_workflow("no_retry", json!({}), json!({})).await.unwrap();
    let task = engine
        .list_tasks_for_execution(wf.id)
        .await
        .unwrap()
        .into_iter()
        .find(|t| t.name == "task1")
        .unwrap();

    assert_eq!(store.scheduled_calls().len(), 0, "count: 1 must not schedule a retry");
    assert_eq!(store.count_action_dispatches(task.id).await.unwrap(), 1);

    let wf = engine.get_execution(wf.id).await.unwrap();
    assert_eq!(wf.state, WorkflowState::Error);
}

#[tokio::test]
async fn join_count_above_predecessor_total_never_activates() {
    let yaml = r#"
name: unreachable_join
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
    join: 5
"#;
    let (store, engine) = test_engine();
    store.register_workflow(spec_from_yaml(yaml));

    let wf = engine.start_workflow("unreachable_join", json!({}), json!({})).await.unwrap();
    let tasks = engine.list_tasks_for_execution(wf.id).await.unwrap();
    assert!(tasks.iter().all(|t| t.name != "task3"));
    assert_eq!(tasks.len(), 2);
}

#[tokio::test]
async fn on_task_result_is_idempotent_under_redelivery() {
    let yaml = r#"
name: idempotent
type: direct
tasks:
  task1:
    name: task1
    action: { action: echo }
"#;
    let (store, engine) = test_engine();
    store.register_workflow(spec_from_yaml(yaml));

    let wf = engine.start_workflow("idempotent", json!({}), json!({})).await.unwrap();
    let task = engine
        .list_tasks_for_execution(wf.id)
        .await
        .unwrap()
        .into_iter()
        .find(|t| t.name == "task1")
        .unwrap();
    assert_eq!(task.state, TaskState::Success);

    let redelivered = engine
        .on_task_result(task.id, engine::TaskResult::success(json!({})))
        .await
        .unwrap();
    assert_eq!(redelivered.state, TaskState::Success);
    assert_eq!(redelivered.updated_at, task.updated_at);

    let wf = engine.get_execution(wf.id).await.unwrap();
    assert_eq!(wf.state, WorkflowState::Success);
}

#[tokio::test]
async fn first_declared_task_hard_failure_wins_over_a_later_sibling_success() {
    let yaml = r#"
name: race
type: direct
tasks:
  task_a:
    name: task_a
    action: { action: fail }
  task_b:
    name: task_b
    action: { action: echo }
"#;
    let (store, engine) = test_engine();
    store.register_workflow(spec_from_yaml(yaml));

    let wf = engine.start_workflow("race", json!({}), json!({})).await.unwrap();
    assert_eq!(wf.state, WorkflowState::Error);

    // `task_a`'s unconditional failure must terminate the workflow before
    // `task_b` (declared second, with no inbound edges of its own) is ever
    // created - declaration order must not flip ERROR into SUCCESS.
    let tasks = engine.list_tasks_for_execution(wf.id).await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].name, "task_a");
    assert_eq!(tasks[0].state, TaskState::Error);
}

#[tokio::test]
async fn bad_input_expression_terminates_task_instead_of_propagating_err() {
    let yaml = r#"
name: bad_input
type: direct
tasks:
  task1:
    name: task1
    action: { action: echo }
    input_expressions:
      value: "<% unterminated"
"#;
    let (store, engine) = test_engine();
    store.register_workflow(spec_from_yaml(yaml));

    let wf = engine.start_workflow("bad_input", json!({}), json!({})).await.unwrap();

    let task = engine
        .list_tasks_for_execution(wf.id)
        .await
        .unwrap()
        .into_iter()
        .find(|t| t.name == "task1")
        .unwrap();
    assert_eq!(task.state, TaskState::Error);
    assert!(store.count_action_dispatches(task.id).await.unwrap() == 0);

    let wf = engine.get_execution(wf.id).await.unwrap();
    assert_eq!(wf.state, WorkflowState::Error);
}

#[tokio::test]
async fn bad_publish_expression_turns_a_successful_action_into_a_task_error() {
    let yaml = r#"
name: bad_publish
type: direct
tasks:
  task1:
    name: task1
    action: { action: echo }
    publish:
      result1: "<% unterminated"
"#;
    let (store, engine) = test_engine();
    store.register_workflow(spec_from_yaml(yaml));

    let wf = engine.start_workflow("bad_publish", json!({}), json!({})).await.unwrap();

    let task = engine
        .list_tasks_for_execution(wf.id)
        .await
        .unwrap()
        .into_iter()
        .find(|t| t.name == "task1")
        .unwrap();
    assert_eq!(task.state, TaskState::Error);
    assert_eq!(store.count_action_dispatches(task.id).await.unwrap(), 1);

    let wf = engine.get_execution(wf.id).await.unwrap();
    assert_eq!(wf.state, WorkflowState::Error);
}

#[tokio::test]
async fn start_workflow_twice_yields_independent_executions() {
    let yaml = r#"
name: independent
type: direct
tasks:
  task1:
    name: task1
    action: { action: echo }
"#;
    let (store, engine) = test_engine();
    store.register_workflow(spec_from_yaml(yaml));

    let wf_a = engine.start_workflow("independent", json!({}), json!({})).await.unwrap();
    let wf_b = engine.start_workflow("independent", json!({}), json!({})).await.unwrap();
    assert_ne!(wf_a.id, wf_b.id);

    let tasks_a = engine.list_tasks_for_execution(wf_a.id).await.unwrap();
    let tasks_b = engine.list_tasks_for_execution(wf_b.id).await.unwrap();
    assert_eq!(tasks_a.len(), 1);
    assert_eq!(tasks_b.len(), 1);
    assert_ne!(tasks_a[0].id, tasks_b[0].id);
}
