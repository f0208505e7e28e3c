//! `expr` crate — the expression evaluator boundary.
//!
//! A full YAQL-like templating language is out of scope for the engine
//! core. What the engine *does* need is a stable trait it can call
//! through, so this crate defines [`Expr`] and ships one concrete, minimal
//! implementation — [`TemplateExpr`] — good enough to resolve the
//! `<% $.path %>`-style templates workflow authors write.

mod error;
mod template;

pub use error::ExprError;
pub use template::TemplateExpr;

use serde_json::Value;

/// Evaluates a templated string against a JSON data context.
///
/// Implementations are stateless; all data flows through `context`.
pub trait Expr: Send + Sync {
    /// Evaluate `template` against `context` and return the resulting JSON
    /// value. A template that resolves to a single path reference returns
    /// that path's value verbatim (preserving its JSON type); a template
    /// that mixes literal text and placeholders returns a `String`.
    fn evaluate(&self, template: &str, context: &Value) -> Result<Value, ExprError>;

    /// Evaluate `template` and interpret the result as a boolean condition.
    ///
    /// `null`, `false`, `0`, and `""` are falsy; everything else is truthy.
    fn evaluate_bool(&self, template: &str, context: &Value) -> Result<bool, ExprError> {
        Ok(is_truthy(&self.evaluate(template, context)?))
    }
}

fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
