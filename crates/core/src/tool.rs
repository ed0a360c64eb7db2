//! Tool trait: the abstraction over agent capabilities.
//!
//! Tools are what give the agent the ability to act in the world:
//! read and write files, search a tree, run shell commands, fetch URLs.
//! Every tool is a named, schema-described unit of work; the registry
//! validates arguments against the schema and isolates failures.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ToolError;
use crate::message::MessageToolCall;
use crate::provider::ToolDefinition;
use crate::validation::{self, Violation};

/// Structured tool arguments: a JSON object.
pub type Arguments = Map<String, Value>;

/// What kind of side effect a tool has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    Read,
    Write,
    Shell,
    Network,
    Memory,
    /// Tools contributed by a protocol extension (e.g. MCP servers).
    Mcp,
}

impl ToolKind {
    /// Whether running this kind of tool can change the world.
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            ToolKind::Write | ToolKind::Shell | ToolKind::Network | ToolKind::Memory
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolKind::Read => "read",
            ToolKind::Write => "write",
            ToolKind::Shell => "shell",
            ToolKind::Network => "network",
            ToolKind::Memory => "memory",
            ToolKind::Mcp => "mcp",
        }
    }
}

/// A request to execute a tool, as reassembled from the stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID (matches the LLM's tool_call.id)
    pub call_id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Parsed arguments
    pub arguments: Arguments,
}

impl ToolCall {
    pub fn new(call_id: impl Into<String>, name: impl Into<String>, arguments: Arguments) -> Self {
        Self {
            call_id: call_id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// The record stored on the assistant message that requested this call.
    pub fn to_message_call(&self) -> MessageToolCall {
        MessageToolCall {
            id: self.call_id.clone(),
            name: self.name.clone(),
            arguments: Value::Object(self.arguments.clone()).to_string(),
        }
    }
}

/// The result of a tool execution.
///
/// `error` is set if and only if `success` is false.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether the tool executed successfully
    pub success: bool,

    /// The output content
    pub output: String,

    /// What went wrong, on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Structured details about the execution
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,

    /// Whether `output` was cut short
    #[serde(default)]
    pub truncated: bool,
}

impl ToolResult {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            error: None,
            metadata: Map::new(),
            truncated: false,
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(error.into()),
            metadata: Map::new(),
            truncated: false,
        }
    }

    /// Attach partial output to a failed result.
    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn truncated(mut self) -> Self {
        self.truncated = true;
        self
    }

    /// Render the result as the single text blob the model sees.
    pub fn to_model_output(&self) -> String {
        if self.success {
            return self.output.clone();
        }
        format!(
            "Error: {}\n\nOutput:\n{}",
            self.error.as_deref().unwrap_or_default(),
            self.output
        )
    }

    /// Restore the error/success invariant on results built by hand.
    pub(crate) fn normalized(mut self) -> Self {
        if self.success {
            self.error = None;
        } else if self.error.is_none() {
            self.error = Some("Tool reported failure".into());
        }
        self
    }
}

/// Everything a tool receives for one execution.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    /// Validated arguments
    pub arguments: Arguments,

    /// The agent's working directory
    pub cwd: PathBuf,
}

impl ToolInvocation {
    pub fn new(arguments: Arguments, cwd: impl Into<PathBuf>) -> Self {
        Self {
            arguments,
            cwd: cwd.into(),
        }
    }

    /// A required string argument.
    pub fn str_arg(&self, key: &str) -> Result<&str, ToolError> {
        self.arguments
            .get(key)
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments(format!("Missing '{key}' argument")))
    }

    /// An optional string argument.
    pub fn opt_str(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(Value::as_str)
    }

    pub fn bool_arg(&self, key: &str, default: bool) -> bool {
        self.arguments
            .get(key)
            .and_then(Value::as_bool)
            .unwrap_or(default)
    }

    pub fn u64_arg(&self, key: &str, default: u64) -> u64 {
        self.arguments
            .get(key)
            .and_then(Value::as_u64)
            .unwrap_or(default)
    }

    /// Resolve a possibly relative path against the working directory.
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        resolve_path(&self.cwd, path)
    }
}

/// Resolve `path` against `base` unless it is already absolute.
pub fn resolve_path(base: &Path, path: &str) -> PathBuf {
    let candidate = Path::new(path);
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        base.join(candidate)
    }
}

/// The core Tool trait.
///
/// Each built-in tool (read_file, write_file, glob, shell, ...) implements
/// this trait. Tools are registered in the `ToolRegistry` and made available
/// to the agent loop.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "read_file").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// What kind of side effect this tool has.
    fn kind(&self) -> ToolKind {
        ToolKind::Read
    }

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> Value;

    /// Execute the tool.
    ///
    /// Expected failures (missing file, bad regex) should come back as
    /// `Ok(ToolResult::error(..))`; an `Err` is treated as a fault.
    async fn execute(&self, invocation: ToolInvocation) -> Result<ToolResult, ToolError>;

    /// Check arguments against the declared schema.
    fn validate(&self, arguments: &Arguments) -> Vec<Violation> {
        validation::validate(&self.parameters_schema(), arguments)
    }

    /// Convert this tool into a ToolDefinition for sending to the LLM.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}
