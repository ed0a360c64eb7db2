//! Tool-call reassembly from indexed fragments.
//!
//! One `ToolCallAssembler` lives for exactly one decode attempt. Buffers are
//! keyed by the provider's positional index and drained in index order.

use std::collections::BTreeMap;

use ferrule_core::event::StreamEvent;
use ferrule_core::provider::ToolCallFragment;
use ferrule_core::tool::{Arguments, ToolCall};
use serde_json::Value;
use tracing::warn;

#[derive(Debug, Default)]
struct PendingCall {
    call_id: String,
    name: String,
    arguments: String,
    started: bool,
}

/// Accumulates fragments until the stream ends.
#[derive(Debug, Default)]
pub struct ToolCallAssembler {
    pending: BTreeMap<u32, PendingCall>,
}

impl ToolCallAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Absorb one fragment, returning the events it produces.
    pub fn push(&mut self, fragment: ToolCallFragment) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        let call = self.pending.entry(fragment.index).or_default();

        if let Some(id) = fragment.id.filter(|id| !id.is_empty()) {
            call.call_id = id;
        }

        if let Some(name) = fragment.name.filter(|n| !n.is_empty())
            && !call.started
        {
            call.name = name;
            call.started = true;
            events.push(StreamEvent::ToolCallStart {
                call_id: call.call_id.clone(),
                name: call.name.clone(),
            });
        }

        if let Some(chunk) = fragment.arguments.filter(|a| !a.is_empty()) {
            call.arguments.push_str(&chunk);
            events.push(StreamEvent::ToolCallDelta {
                call_id: call.call_id.clone(),
                name: call.name.clone(),
                arguments_delta: chunk,
            });
        }

        events
    }

    /// Every observed call, parsed, in index order.
    pub fn finish(self) -> Vec<ToolCall> {
        self.pending
            .into_values()
            .map(|call| {
                let arguments = parse_arguments(&call.name, &call.arguments);
                ToolCall::new(call.call_id, call.name, arguments)
            })
            .collect()
    }
}

/// Parse a complete argument buffer.
///
/// Anything that is not a JSON object degrades to empty arguments; schema
/// validation downstream then reports the missing fields to the model.
pub fn parse_arguments(tool_name: &str, raw: &str) -> Arguments {
    if raw.trim().is_empty() {
        return Arguments::new();
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            warn!(tool = %tool_name, raw = %raw, kind = %json_kind(&other), "Tool arguments are not an object");
            Arguments::new()
        }
        Err(e) => {
            warn!(tool = %tool_name, raw = %raw, error = %e, "Malformed tool arguments");
            Arguments::new()
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
