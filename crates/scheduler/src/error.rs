//! Typed error type for the scheduler crate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("database error: {0}")]
    Db(#[from] db::DbError),

    #[error("no call target registered for '{0}'")]
    UnknownTarget(String),

    #[error("call target failed: {0}")]
    TargetFailed(String),
}
