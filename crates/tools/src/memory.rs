//! Memory tool: persistent key-value notes about the user.
//!
//! Entries live in `user_memory.json` under the data directory and survive
//! across sessions.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use ferrule_core::error::ToolError;
use ferrule_core::tool::{Tool, ToolInvocation, ToolKind, ToolResult};
use serde::{Deserialize, Serialize};
use tracing::warn;

const MEMORY_FILE: &str = "user_memory.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct MemoryFile {
    #[serde(default)]
    entries: BTreeMap<String, String>,
}

pub struct MemoryTool {
    data_dir: PathBuf,
}

impl MemoryTool {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    fn path(&self) -> PathBuf {
        self.data_dir.join(MEMORY_FILE)
    }

    async fn load(&self) -> MemoryFile {
        let path = self.path();
        let Ok(content) = tokio::fs::read_to_string(&path).await else {
            return MemoryFile::default();
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "Unreadable memory file, starting fresh");
            MemoryFile::default()
        })
    }

    async fn save(&self, memory: &MemoryFile) -> Result<(), ToolError> {
        tokio::fs::create_dir_all(&self.data_dir).await?;
        let body = serde_json::to_string_pretty(memory).map_err(|e| ToolError::ExecutionFailed {
            tool_name: "memory".into(),
            reason: e.to_string(),
        })?;
        tokio::fs::write(self.path(), body).await?;
        Ok(())
    }
}

#[async_trait]
impl Tool for MemoryTool {
    fn name(&self) -> &str {
        "memory"
    }

    fn description(&self) -> &str {
        "Store and retrieve persistent memory. Use this to remember user preferences and \
         important context across sessions."
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Memory
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ["set", "get", "delete", "list", "clear"],
                    "description": "Action to perform"
                },
                "key": {
                    "type": ["string", "null"],
                    "description": "Memory key (required for set, get and delete)"
                },
                "value": {
                    "type": ["string", "null"],
                    "description": "Value to store (required for set)"
                }
            },
            "required": ["action"]
        })
    }

    async fn execute(&self, invocation: ToolInvocation) -> Result<ToolResult, ToolError> {
        let action = invocation.str_arg("action")?;
        let key = invocation.opt_str("key").filter(|k| !k.is_empty());
        let value = invocation.opt_str("value").filter(|v| !v.is_empty());

        match action {
            "set" => {
                let (Some(key), Some(value)) = (key, value) else {
                    return Ok(ToolResult::error("`key` and `value` are required for `set`"));
                };
                let mut memory = self.load().await;
                memory.entries.insert(key.to_string(), value.to_string());
                self.save(&memory).await?;
                Ok(ToolResult::success(format!("Set memory: {key}")))
            }
            "get" => {
                let Some(key) = key else {
                    return Ok(ToolResult::error("`key` is required for `get`"));
                };
                let memory = self.load().await;
                Ok(match memory.entries.get(key) {
                    Some(value) => ToolResult::success(format!("Memory found: {key}: {value}")),
                    None => ToolResult::success(format!("Memory not found: {key}")),
                })
            }
            "delete" => {
                let Some(key) = key else {
                    return Ok(ToolResult::error("`key` is required for `delete`"));
                };
                let mut memory = self.load().await;
                if memory.entries.remove(key).is_none() {
                    return Ok(ToolResult::success(format!("Memory not found: {key}")));
                }
                self.save(&memory).await?;
                Ok(ToolResult::success(format!("Deleted memory: {key}")))
            }
            "list" => {
                let memory = self.load().await;
                if memory.entries.is_empty() {
                    return Ok(ToolResult::success("No memories stored"));
                }
                let mut lines = vec!["Stored memories:".to_string()];
                lines.extend(memory.entries.iter().map(|(k, v)| format!("  {k}: {v}")));
                Ok(ToolResult::success(lines.join("\n"))
                    .with_metadata("count", memory.entries.len()))
            }
            "clear" => {
                let mut memory = self.load().await;
                let count = memory.entries.len();
                memory.entries.clear();
                self.save(&memory).await?;
                Ok(ToolResult::success(format!("Cleared {count} memory entries")))
            }
            other => Ok(ToolResult::error(format!("Unknown action: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn run(tool: &MemoryTool, args: serde_json::Value) -> ToolResult {
        tool.execute(ToolInvocation::new(
            args.as_object().cloned().unwrap(),
            std::env::temp_dir(),
        ))
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn set_get_delete_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let tool = MemoryTool::new(dir.path().join("data"));

        let set = run(&tool, json!({"action": "set", "key": "editor", "value": "helix"})).await;
        assert_eq!(set.output, "Set memory: editor");

        let got = run(&tool, json!({"action": "get", "key": "editor"})).await;
        assert_eq!(got.output, "Memory found: editor: helix");

        let deleted = run(&tool, json!({"action": "delete", "key": "editor"})).await;
        assert!(deleted.success);

        let gone = run(&tool, json!({"action": "get", "key": "editor"})).await;
        assert_eq!(gone.output, "Memory not found: editor");
    }

    #[tokio::test]
    async fn persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        run(
            &MemoryTool::new(dir.path()),
            json!({"action": "set", "key": "lang", "value": "rust"}),
        )
        .await;

        let listed = run(&MemoryTool::new(dir.path()), json!({"action": "list"})).await;
        assert_eq!(listed.output, "Stored memories:\n  lang: rust");
    }

    #[tokio::test]
    async fn set_requires_value() {
        let dir = tempfile::tempdir().unwrap();
        let tool = MemoryTool::new(dir.path());
        let result = run(&tool, json!({"action": "set", "key": "k"})).await;
        assert!(!result.success);
    }

    #[tokio::test]
    async fn clear_counts_entries() {
        let dir = tempfile::tempdir().unwrap();
        let tool = MemoryTool::new(dir.path());
        run(&tool, json!({"action": "set", "key": "a", "value": "1"})).await;
        run(&tool, json!({"action": "set", "key": "b", "value": "2"})).await;
        let cleared = run(&tool, json!({"action": "clear"})).await;
        assert_eq!(cleared.output, "Cleared 2 memory entries");
        let listed = run(&tool, json!({"action": "list"})).await;
        assert_eq!(listed.output, "No memories stored");
    }
}
