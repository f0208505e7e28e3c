//! Action-level error type.

use thiserror::Error;

/// Errors returned by an [`crate::ActionRunner`].
///
/// The dispatcher and engine use the variant to decide what happens next:
/// - `NotFound` / `InvalidArguments` — the action could not even be
///   started; this is the engine's `InvalidAction` error kind, raised
///   synchronously at dispatch time.
/// - `Runtime` — the action started and failed during execution; this is
///   the engine's `ActionRuntimeError` kind, recorded on the task and
///   subject to the retry policy.
#[derive(Debug, Error, Clone)]
pub enum ActionError {
    /// No runner is registered for the requested action name.
    #[error("failed to find action '{0}'")]
    NotFound(String),

    /// The action exists but the supplied input doesn't match what it
    /// expects (missing/extra/mistyped arguments).
    #[error("failed to initialize action: {0}")]
    InvalidArguments(String),

    /// The action ran and reported failure.
    #[error("action runtime error: {0}")]
    Runtime(String),
}
