//! Expression evaluator error type.

use thiserror::Error;

/// Errors raised while evaluating a templated expression against a context.
#[derive(Debug, Error, Clone)]
pub enum ExprError {
    /// The template contains an unterminated `<% ... %>` block.
    #[error("unterminated expression block in template: '{0}'")]
    Unterminated(String),

    /// A path expression (`$.a.b.c`) could not be parsed.
    #[error("invalid path expression: '{0}'")]
    InvalidPath(String),

    /// A comparison expression (`$.a = 1`) could not be parsed.
    #[error("invalid condition expression: '{0}'")]
    InvalidCondition(String),
}
