//! Directory listing tool.

use async_trait::async_trait;
use ferrule_core::error::ToolError;
use ferrule_core::tool::{Tool, ToolInvocation, ToolKind, ToolResult};

use crate::fs_util::display_path;

pub struct ListDirTool;

#[async_trait]
impl Tool for ListDirTool {
    fn name(&self) -> &str {
        "list_dir"
    }

    fn description(&self) -> &str {
        "List the entries of a directory. Directories are shown with a trailing '/'."
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Read
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory to list (default: current directory)"
                },
                "include_hidden": {
                    "type": "boolean",
                    "description": "Include entries starting with '.' (default: false)"
                }
            }
        })
    }

    async fn execute(&self, invocation: ToolInvocation) -> Result<ToolResult, ToolError> {
        let dir = invocation.resolve_path(invocation.opt_str("path").unwrap_or("."));
        let include_hidden = invocation.bool_arg("include_hidden", false);
        let shown = display_path(&invocation.cwd, &dir);

        let mut reader = match tokio::fs::read_dir(&dir).await {
            Ok(r) => r,
            Err(_) => {
                return Ok(ToolResult::error(format!(
                    "Directory does not exist: {}",
                    dir.display()
                )));
            }
        };

        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if !include_hidden && name.starts_with('.') {
                continue;
            }
            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            entries.push(if is_dir { format!("{name}/") } else { name });
        }
        entries.sort();

        let count = entries.len();
        let output = if entries.is_empty() {
            "Directory is empty".to_string()
        } else {
            entries.join("\n")
        };

        Ok(ToolResult::success(output)
            .with_metadata("path", if shown.is_empty() { ".".to_string() } else { shown })
            .with_metadata("entries", count))
    }
}
