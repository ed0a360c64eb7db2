//! File read tool: numbered lines with optional offset and limit.

use async_trait::async_trait;
use ferrule_core::error::ToolError;
use ferrule_core::tool::{Tool, ToolInvocation, ToolKind, ToolResult};

use crate::fs_util::{display_path, looks_binary};

/// Files larger than this are refused outright.
const MAX_FILE_BYTES: u64 = 10 * 1024 * 1024;

/// Lines returned when no limit is given.
const DEFAULT_LINE_LIMIT: usize = 2000;

pub struct FileReadTool;

#[async_trait]
impl Tool for FileReadTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read a text file. Returns the content with line numbers. \
         Use offset and limit to page through large files."
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
                    "description": "Path to the file, absolute or relative to the working directory"
                },
                "offset": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "Line number to start reading from (1-based, default: 1)"
                },
                "limit": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "Maximum number of lines to read (default: 2000)"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, invocation: ToolInvocation) -> Result<ToolResult, ToolError> {
        let raw_path = invocation.str_arg("path")?;
        let path = invocation.resolve_path(raw_path);
        let shown = display_path(&invocation.cwd, &path);

        let metadata = match tokio::fs::metadata(&path).await {
            Ok(m) => m,
            Err(_) => return Ok(ToolResult::error(format!("File not found: {shown}"))),
        };
        if metadata.is_dir() {
            return Ok(ToolResult::error(format!(
                "Path is a directory, not a file: {shown}"
            )));
        }
        if metadata.len() > MAX_FILE_BYTES {
            return Ok(ToolResult::error(format!(
                "File too large ({} bytes, max {MAX_FILE_BYTES}): {shown}",
                metadata.len()
            )));
        }

        let bytes = tokio::fs::read(&path).await?;
        if looks_binary(&bytes) {
            return Ok(ToolResult::error(format!("Cannot read binary file: {shown}")));
        }
        let content = String::from_utf8_lossy(&bytes);

        let lines: Vec<&str> = content.lines().collect();
        let total = lines.len();
        if total == 0 {
            return Ok(ToolResult::success("File is empty")
                .with_metadata("path", shown)
                .with_metadata("total_lines", 0));
        }

        let offset = invocation.u64_arg("offset", 1).max(1) as usize;
        if offset > total {
            return Ok(ToolResult::error(format!(
                "Offset {offset} is past the end of the file ({total} lines)"
            )));
        }
        let limit = invocation
            .arguments
            .get("limit")
            .and_then(serde_json::Value::as_u64)
            .map(|l| l as usize)
            .unwrap_or(DEFAULT_LINE_LIMIT);

        let start = offset - 1;
        let end = (start + limit).min(total);
        let mut output: Vec<String> = lines[start..end]
            .iter()
            .enumerate()
            .map(|(i, line)| format!("{:>6}|{line}", start + i + 1))
            .collect();

        let cut = end < total;
        if cut {
            output.push(format!(
                "... ({} more lines; continue with offset={})",
                total - end,
                end + 1
            ));
        }

        let mut result = ToolResult::success(output.join("\n"))
            .with_metadata("path", shown)
            .with_metadata("total_lines", total)
            .with_metadata("start_line", offset)
            .with_metadata("end_line", end);
        if cut {
            result = result.truncated();
        }
        Ok(result)
    }
}
