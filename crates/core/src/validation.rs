//! Argument validation against JSON-Schema-shaped tool schemas.
//!
//! Supports the subset tools actually declare: `type` (single or list),
//! `properties`, `required`, `enum`, `minimum`/`maximum`,
//! `minLength`/`maxLength`, `items`, and `additionalProperties: false`.
//! Nested objects and arrays report dotted paths (`edits.0.old_text`).

use std::fmt;

use serde_json::{Map, Value};

/// One violated field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Dotted path of the offending field
    pub path: String,
    /// Human-readable reason
    pub reason: String,
    /// Whether the field was absent
    pub missing: bool,
}

impl Violation {
    fn new(path: &str, reason: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            reason: reason.into(),
            missing: false,
        }
    }

    fn missing(path: &str) -> Self {
        Self {
            path: path.to_string(),
            reason: "Field required".into(),
            missing: true,
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Parameter '{}': {}", self.path, self.reason)
    }
}

/// Validate an argument object against a tool schema.
///
/// Returns every violation found, in schema order; an empty list means
/// the arguments are acceptable.
pub fn validate(schema: &Value, arguments: &Map<String, Value>) -> Vec<Violation> {
    let mut violations = Vec::new();
    check_object(schema, arguments, "", &mut violations);
    violations
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

fn check_object(schema: &Value, object: &Map<String, Value>, prefix: &str, out: &mut Vec<Violation>) {
    let properties = schema.get("properties").and_then(Value::as_object);

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for field in required.iter().filter_map(Value::as_str) {
            let absent = match object.get(field) {
                None => true,
                Some(Value::Null) => !allows_null(properties, field),
                Some(_) => false,
            };
            if absent {
                out.push(Violation::missing(&join(prefix, field)));
            }
        }
    }

    if let Some(properties) = properties {
        for (key, field_schema) in properties {
            if let Some(value) = object.get(key) {
                check_value(field_schema, value, &join(prefix, key), out);
            }
        }
    }

    if schema.get("additionalProperties") == Some(&Value::Bool(false)) {
        for key in object.keys() {
            let known = properties.is_some_and(|p| p.contains_key(key));
            if !known {
                out.push(Violation::new(&join(prefix, key), "Extra inputs are not permitted"));
            }
        }
    }
}

fn allows_null(properties: Option<&Map<String, Value>>, field: &str) -> bool {
    properties
        .and_then(|p| p.get(field))
        .map(|s| type_names(s).contains(&"null"))
        .unwrap_or(false)
}

fn type_names(schema: &Value) -> Vec<&str> {
    match schema.get("type") {
        Some(Value::String(t)) => vec![t.as_str()],
        Some(Value::Array(ts)) => ts.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}

fn matches_type(name: &str, value: &Value) -> bool {
    match name {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn type_reason(name: &str) -> String {
    match name {
        "string" => "Input should be a valid string".into(),
        "integer" => "Input should be a valid integer".into(),
        "number" => "Input should be a valid number".into(),
        "boolean" => "Input should be a valid boolean".into(),
        "array" => "Input should be a valid list".into(),
        "object" => "Input should be a valid dictionary".into(),
        other => format!("Input should be of type {other}"),
    }
}

fn check_value(schema: &Value, value: &Value, path: &str, out: &mut Vec<Violation>) {
    let types = type_names(schema);
    if !types.is_empty() && !types.iter().any(|t| matches_type(t, value)) {
        let expected = types.iter().find(|t| **t != "null").unwrap_or(&types[0]);
        out.push(Violation::new(path, type_reason(expected)));
        return;
    }

    if let Some(allowed) = schema.get("enum").and_then(Value::as_array)
        && !allowed.contains(value)
    {
        let options: Vec<String> = allowed.iter().map(Value::to_string).collect();
        out.push(Violation::new(
            path,
            format!("Input should be one of {}", options.join(", ")),
        ));
        return;
    }

    if let Some(n) = value.as_f64() {
        if let Some(min) = schema.get("minimum").and_then(Value::as_f64)
            && n < min
        {
            out.push(Violation::new(
                path,
                format!("Input should be greater than or equal to {min}"),
            ));
        }
        if let Some(max) = schema.get("maximum").and_then(Value::as_f64)
            && n > max
        {
            out.push(Violation::new(
                path,
                format!("Input should be less than or equal to {max}"),
            ));
        }
    }

    if let Some(s) = value.as_str() {
        let len = s.chars().count() as u64;
        if let Some(min) = schema.get("minLength").and_then(Value::as_u64)
            && len < min
        {
            out.push(Violation::new(
                path,
                format!("String should have at least {min} characters"),
            ));
        }
        if let Some(max) = schema.get("maxLength").and_then(Value::as_u64)
            && len > max
        {
            out.push(Violation::new(
                path,
                format!("String should have at most {max} characters"),
            ));
        }
    }

    match value {
        Value::Object(object) => check_object(schema, object, path, out),
        Value::Array(items) => {
            if let Some(item_schema) = schema.get("items") {
                for (i, item) in items.iter().enumerate() {
                    check_value(item_schema, item, &join(path, &i.to_string()), out);
                }
            }
        }
        _ => {}
    }
}
