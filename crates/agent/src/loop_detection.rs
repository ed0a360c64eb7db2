//! Detection of repeated tool-call turns.
//!
//! Each turn's tool calls reduce to an ordered list of
//! `(name, canonical arguments)` pairs. Two consecutive turns with identical
//! lists mean the model is repeating itself after seeing the same results.

use ferrule_core::tool::ToolCall;
use serde_json::Value;

/// `(tool name, canonical JSON of its arguments)`.
pub type CallSignature = (String, String);

pub fn signature(calls: &[ToolCall]) -> Vec<CallSignature> {
    calls
        .iter()
        .map(|c| {
            let mut args = String::new();
            write_canonical(&Value::Object(c.arguments.clone()), &mut args);
            (c.name.clone(), args)
        })
        .collect()
}

/// Serialize `value` with object keys sorted at every depth. Plain
/// `to_string` keeps insertion order once any crate in the build enables
/// serde_json's `preserve_order` feature.
fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Remembers the previous turn's signature.
#[derive(Debug, Default)]
pub struct LoopDetector {
    previous: Option<Vec<CallSignature>>,
}

impl LoopDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record this turn's calls. Returns true when they repeat the previous
    /// turn's calls exactly, in order.
    pub fn observe(&mut self, calls: &[ToolCall]) -> bool {
        let current = signature(calls);
        let repeated = self.previous.as_ref() == Some(&current);
        self.previous = Some(current);
        repeated
    }
}

/// The notice shown when a repeated turn is suppressed.
pub fn loop_notice(calls: &[ToolCall]) -> String {
    let names: Vec<&str> = calls.iter().map(|c| c.name.as_str()).collect();
    format!(
        "Loop detected: the same tool calls ({}) were requested twice in a row with identical \
         arguments. Stopping to avoid repeating them.",
        names.join(", ")
    )
}
