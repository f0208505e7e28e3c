//! Durable scheduler for deferred engine callbacks.
//!
//! Policies like `wait_before`, `wait_after`, `retry`, and `timeout` don't
//! block a task thread — they persist a [`db::models::ScheduledCallRow`]
//! naming a future instant and a method to invoke, then return. A
//! [`Scheduler`] poll loop claims due rows (`SELECT ... FOR UPDATE SKIP
//! LOCKED`, see [`db::repository::scheduled_calls`]) and dispatches them
//! through a [`Registry`] of [`CallTarget`]s, so a scheduled callback
//! survives a process restart between when it's scheduled and when it
//! fires.

pub mod error;
pub mod poller;
pub mod registry;

pub use error::SchedulerError;
pub use poller::{schedule_at, schedule_in, Scheduler};
pub use registry::{CallTarget, Registry, DEFAULT_TARGET};
