//! [`TemplateExpr`] — a minimal `<% $.path %>` template evaluator.

use serde_json::Value;

use crate::{Expr, ExprError};

/// Resolves `<% $.a.b.c %>`-style placeholders against a JSON context.
///
/// A template consisting of exactly one placeholder evaluates to that
/// path's raw JSON value. A template mixing literal text with one or more
/// placeholders evaluates to a `String`, with missing or null paths
/// rendered as the literal text `None` (matching the behaviour of the
/// dynamically-typed source this engine was distilled from, where an
/// unresolved context lookup is `None` and string-interpolates as such).
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateExpr;

impl TemplateExpr {
    pub fn new() -> Self {
        Self
    }
}

impl Expr for TemplateExpr {
    fn evaluate(&self, template: &str, context: &Value) -> Result<Value, ExprError> {
        let placeholders = split_placeholders(template)?;

        if let [Segment::Placeholder(body)] = placeholders.as_slice() {
            return eval_body(body, context);
        }

        let mut out = String::new();
        for seg in &placeholders {
            match seg {
                Segment::Literal(s) => out.push_str(s),
                Segment::Placeholder(body) => {
                    let v = eval_body(body, context)?;
                    out.push_str(&stringify(&v));
                }
            }
        }
        Ok(Value::String(out))
    }
}

enum Segment<'a> {
    Literal(&'a str),
    Placeholder(&'a str),
}

/// Split a template into literal and `<% ... %>` placeholder segments.
fn split_placeholders(template: &str) -> Result<Vec<Segment<'_>>, ExprError> {
    let mut segments = Vec::new();
    let mut rest = template;

    while let Some(start) = rest.find("<%") {
        if start > 0 {
            segments.push(Segment::Literal(&rest[..start]));
        }

        let after_open = &rest[start + 2..];
        let end = after_open
            .find("%>")
            .ok_or_else(|| ExprError::Unterminated(template.to_string()))?;

        segments.push(Segment::Placeholder(after_open[..end].trim()));
        rest = &after_open[end + 2..];
    }

    if !rest.is_empty() {
        segments.push(Segment::Literal(rest));
    }

    if segments.is_empty() {
        segments.push(Segment::Literal(""));
    }

    Ok(segments)
}

/// Evaluate the inside of a single `<% ... %>` block: a path reference, an
/// equality condition, or (as a fallback) a JSON/string literal.
fn eval_body(body: &str, context: &Value) -> Result<Value, ExprError> {
    if let Some((lhs, rhs)) = split_once_operator(body, "!=") {
        let lhs_val = resolve(lhs.trim(), context)?;
        let rhs_val = literal_or_path(rhs.trim(), context)?;
        return Ok(Value::Bool(lhs_val != rhs_val));
    }

    if let Some((lhs, rhs)) = split_once_operator(body, "=") {
        let lhs_val = resolve(lhs.trim(), context)?;
        let rhs_val = literal_or_path(rhs.trim(), context)?;
        return Ok(Value::Bool(lhs_val == rhs_val));
    }

    if body.starts_with('$') {
        return resolve(body, context);
    }

    literal_or_path(body, context)
}

fn split_once_operator<'a>(body: &'a str, op: &str) -> Option<(&'a str, &'a str)> {
    body.find(op).map(|idx| (&body[..idx], &body[idx + op.len()..]))
}

fn literal_or_path(token: &str, context: &Value) -> Result<Value, ExprError> {
    if token.starts_with('$') {
        return resolve(token, context);
    }
    if let Ok(v) = serde_json::from_str::<Value>(token) {
        return Ok(v);
    }
    Ok(Value::String(token.trim_matches('"').to_string()))
}

/// Resolve a `$` or `$.a.b.c` path against `context`.
fn resolve(path: &str, context: &Value) -> Result<Value, ExprError> {
    let path = path.trim();
    if path == "$" {
        return Ok(context.clone());
    }

    let rest = path
        .strip_prefix("$.")
        .ok_or_else(|| ExprError::InvalidPath(path.to_string()))?;

    let mut current = context;
    for key in rest.split('.') {
        match current.get(key) {
            Some(v) => current = v,
            None => return Ok(Value::Null),
        }
    }
    Ok(current.clone())
}

/// Render a JSON value for string interpolation. `null` becomes `None`.
fn stringify(v: &Value) -> String {
    match v {
        Value::Null => "None".to_string(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pure_path_preserves_type() {
        let ctx = json!({ "result1": 1 });
        let v = TemplateExpr::new().evaluate("<% $.result1 %>", &ctx).unwrap();
        assert_eq!(v, json!(1));
    }

    #[test]
    fn mixed_template_concatenates_and_stringifies() {
        let ctx = json!({ "result1": 1, "result2": 2 });
        let v = TemplateExpr::new()
            .evaluate("<% $.result1 %>,<% $.result2 %>", &ctx)
            .unwrap();
        assert_eq!(v, json!("1,2"));
    }

    #[test]
    fn missing_path_renders_as_none() {
        let ctx = json!({ "result1": 1 });
        let v = TemplateExpr::new()
            .evaluate("<% $.result1 %>,<% $.result2 %>", &ctx)
            .unwrap();
        assert_eq!(v, json!("1,None"));
    }

    #[test]
    fn equality_condition() {
        let ctx = json!({ "result2": 2 });
        let v = TemplateExpr::new().evaluate("<% $.result2 = 2 %>", &ctx).unwrap();
        assert_eq!(v, json!(true));

        let v2 = TemplateExpr::new()
            .evaluate("<% $.result2 = 11111 %>", &ctx)
            .unwrap();
        assert_eq!(v2, json!(false));
    }

    #[test]
    fn ampersand_concat() {
        let ctx = json!({ "result1": "a", "param2": "b" });
        let v = TemplateExpr::new()
            .evaluate("<% $.result1 %> & <% $.param2 %>", &ctx)
            .unwrap();
        assert_eq!(v, json!("a & b"));
    }
}
