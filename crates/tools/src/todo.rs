//! Todo tool: a task list scoped to the current session.

use async_trait::async_trait;
use ferrule_core::error::ToolError;
use ferrule_core::tool::{Tool, ToolInvocation, ToolKind, ToolResult};
use tokio::sync::Mutex;

#[derive(Default)]
pub struct TodoTool {
    // Insertion order is the display order.
    items: Mutex<Vec<(String, String)>>,
}

impl TodoTool {
    pub fn new() -> Self {
        Self::default()
    }
}

fn short_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

#[async_trait]
impl Tool for TodoTool {
    fn name(&self) -> &str {
        "todo"
    }

    fn description(&self) -> &str {
        "Manage a task list for the current session. Use this to track progress on multi-step tasks."
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
                    "enum": ["add", "complete", "list", "clear"],
                    "description": "Action to perform on the todo list"
                },
                "id": {
                    "type": ["string", "null"],
                    "description": "Todo ID (for complete)"
                },
                "content": {
                    "type": ["string", "null"],
                    "description": "Todo content (for add)"
                }
            },
            "required": ["action"]
        })
    }

    async fn execute(&self, invocation: ToolInvocation) -> Result<ToolResult, ToolError> {
        let action = invocation.str_arg("action")?;
        let mut items = self.items.lock().await;

        match action {
            "add" => {
                let Some(content) = invocation.opt_str("content").filter(|c| !c.is_empty()) else {
                    return Ok(ToolResult::error("`content` is required for `add`"));
                };
                let id = short_id();
                items.push((id.clone(), content.to_string()));
                Ok(ToolResult::success(format!("Added todo [{id}]: {content}"))
                    .with_metadata("id", id))
            }
            "complete" => {
                let Some(id) = invocation.opt_str("id").filter(|i| !i.is_empty()) else {
                    return Ok(ToolResult::error("`id` is required for `complete`"));
                };
                match items.iter().position(|(item_id, _)| item_id == id) {
                    Some(pos) => {
                        let (_, content) = items.remove(pos);
                        Ok(ToolResult::success(format!("Completed todo [{id}]: {content}")))
                    }
                    None => Ok(ToolResult::error(format!("Todo not found: {id}"))),
                }
            }
            "list" => {
                if items.is_empty() {
                    return Ok(ToolResult::success("No todos left"));
                }
                let mut lines = vec!["Todos:".to_string()];
                lines.extend(items.iter().map(|(id, content)| format!("  [{id}] {content}")));
                Ok(ToolResult::success(lines.join("\n")).with_metadata("count", items.len()))
            }
            "clear" => {
                let count = items.len();
                items.clear();
                Ok(ToolResult::success(format!("Cleared {count} todos")))
            }
            other => Ok(ToolResult::error(format!("Unknown action: {other}"))),
        }
    }
}
