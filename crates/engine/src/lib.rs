//! `engine` crate — workflow/task state machines, the policy pipeline,
//! the direct/reverse workflow handlers, and the orchestrator that ties
//! them to a [`store::Store`] and an [`actions::ActionRunner`] dispatcher.

pub mod client;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod execution;
pub mod handler;
pub mod policy;
pub mod spec;
pub mod state;
pub mod store;

pub use dispatch::Dispatcher;
pub use engine::Engine;
pub use error::EngineError;
pub use execution::{TaskExecution, TaskResult, WorkflowExecution};
pub use spec::{ActionRef, EdgeSpec, JoinSpec, RetrySpec, TaskDefaults, TaskPolicies, TaskSpec, WorkflowSpec, WorkflowType};
pub use state::{TaskState, WorkflowState};
pub use store::Store;
