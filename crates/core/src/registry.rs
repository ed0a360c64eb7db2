//! Tool registry: lookup, validation and isolated execution.
//!
//! The agent loop uses this to:
//! 1. Get tool definitions to send to the LLM
//! 2. Invoke tools when the LLM requests them
//!
//! `invoke` never fails: unknown names, schema violations, tool errors and
//! panics all come back as a failed `ToolResult` the model can react to.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::provider::ToolDefinition;
use crate::tool::{Arguments, Tool, ToolInvocation, ToolResult};

/// A registry of available tools.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    /// Registration order, so schemas are advertised deterministically
    order: Vec<String>,
    /// If set, only these tools are advertised and invocable
    allowed: Option<HashSet<String>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            order: Vec::new(),
            allowed: None,
        }
    }

    /// Restrict exposure to the named tools. Unlisted tools behave as unknown.
    pub fn with_allowed<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_allowed(Some(names.into_iter().map(Into::into).collect()));
        self
    }

    pub fn set_allowed(&mut self, allowed: Option<HashSet<String>>) {
        self.allowed = allowed;
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_some() {
            warn!(tool = %name, "Overwriting existing tool");
        } else {
            self.order.push(name.clone());
        }
        debug!(tool = %name, "Registered tool");
    }

    /// Remove a tool. Returns whether it was registered.
    pub fn unregister(&mut self, name: &str) -> bool {
        if self.tools.remove(name).is_some() {
            self.order.retain(|n| n != name);
            true
        } else {
            false
        }
    }

    fn is_exposed(&self, name: &str) -> bool {
        self.allowed.as_ref().is_none_or(|set| set.contains(name))
    }

    /// Get an exposed tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        if !self.is_exposed(name) {
            return None;
        }
        self.tools.get(name).cloned()
    }

    /// All exposed tools, in registration order.
    pub fn tools(&self) -> Vec<Arc<dyn Tool>> {
        self.order
            .iter()
            .filter(|name| self.is_exposed(name))
            .filter_map(|name| self.tools.get(name).cloned())
            .collect()
    }

    /// Definitions of all exposed tools (for sending to the LLM).
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools().iter().map(|t| t.to_definition()).collect()
    }

    /// Names of all exposed tools, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.order
            .iter()
            .filter(|name| self.is_exposed(name))
            .map(String::as_str)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.names().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Validate and execute a tool call.
    pub async fn invoke(&self, name: &str, arguments: Arguments, cwd: &Path) -> ToolResult {
        let Some(tool) = self.get(name) else {
            return ToolResult::error(format!("Unknown tool: {name}"))
                .with_metadata("tool_name", name);
        };

        let violations = tool.validate(&arguments);
        if !violations.is_empty() {
            let messages: Vec<String> = violations.iter().map(ToString::to_string).collect();
            let missing: Vec<Value> = violations
                .iter()
                .filter(|v| v.missing)
                .map(|v| Value::String(v.path.clone()))
                .collect();
            debug!(tool = %name, violations = messages.len(), "Rejected tool arguments");
            return ToolResult::error(format!("Invalid parameters: {}", messages.join(";")))
                .with_metadata("tool_name", name)
                .with_metadata("validation_errors", messages)
                .with_metadata("missing_fields", missing);
        }

        let invocation = ToolInvocation::new(arguments, cwd);
        match AssertUnwindSafe(tool.execute(invocation)).catch_unwind().await {
            Ok(Ok(result)) => result.normalized(),
            Ok(Err(e)) => {
                warn!(tool = %name, error = %e, "Tool execution failed");
                ToolResult::error(e.to_string()).with_metadata("tool_name", name)
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(tool = %name, error = %message, "Tool panicked");
                ToolResult::error(message).with_metadata("tool_name", name)
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "tool panicked".to_string()
    }
}
