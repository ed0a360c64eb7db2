//! File write tool: create or overwrite a file.

use async_trait::async_trait;
use ferrule_core::error::ToolError;
use ferrule_core::tool::{Tool, ToolInvocation, ToolKind, ToolResult};

use crate::fs_util::display_path;

pub struct FileWriteTool;

#[async_trait]
impl Tool for FileWriteTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file. Creates the file if it doesn't exist, or overwrites it if it does. \
         Parent directories are created automatically. For partial modifications use edit_file."
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Write
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to the file, absolute or relative to the working directory"
                },
                "content": {
                    "type": "string",
                    "description": "The full content to write"
                },
                "create_directories": {
                    "type": "boolean",
                    "description": "Create missing parent directories (default: true)"
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, invocation: ToolInvocation) -> Result<ToolResult, ToolError> {
        let path = invocation.resolve_path(invocation.str_arg("path")?);
        let content = invocation.str_arg("content")?;
        let create_directories = invocation.bool_arg("create_directories", true);
        let shown = display_path(&invocation.cwd, &path);

        let is_new_file = !tokio::fs::try_exists(&path).await.unwrap_or(false);

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if create_directories {
                tokio::fs::create_dir_all(parent).await?;
            } else if !tokio::fs::try_exists(parent).await.unwrap_or(false) {
                return Ok(ToolResult::error(format!(
                    "Parent directory does not exist: {}",
                    parent.display()
                )));
            }
        }

        if let Err(e) = tokio::fs::write(&path, content).await {
            return Ok(ToolResult::error(format!("Failed to write file: {e}")));
        }

        let action = if is_new_file { "Created" } else { "Updated" };
        let line_count = content.lines().count();

        Ok(ToolResult::success(format!("{action} {shown} {line_count} lines"))
            .with_metadata("path", shown)
            .with_metadata("is_new_file", is_new_file)
            .with_metadata("lines", line_count)
            .with_metadata("bytes", content.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn invocation(cwd: &std::path::Path, args: serde_json::Value) -> ToolInvocation {
        ToolInvocation::new(args.as_object().cloned().unwrap(), cwd)
    }

    #[tokio::test]
    async fn creates_file_and_parents() {
        let dir = tempfile::tempdir().unwrap();
        let result = FileWriteTool
            .execute(invocation(
                dir.path(),
                json!({"path": "nested/dir/out.txt", "content": "a\nb\n"}),
            ))
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.output, "Created nested/dir/out.txt 2 lines");
        assert_eq!(result.metadata["is_new_file"], true);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("nested/dir/out.txt")).unwrap(),
            "a\nb\n"
        );
    }

    #[tokio::test]
    async fn overwrite_reports_update() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("f.txt"), "old").unwrap();
        let result = FileWriteTool
            .execute(invocation(dir.path(), json!({"path": "f.txt", "content": "new"})))
            .await
            .unwrap();
        assert!(result.output.starts_with("Updated f.txt"));
        assert_eq!(std::fs::read_to_string(dir.path().join("f.txt")).unwrap(), "new");
    }

    #[tokio::test]
    async fn missing_parent_without_create_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = FileWriteTool
            .execute(invocation(
                dir.path(),
                json!({"path": "x/y.txt", "content": "", "create_directories": false}),
            ))
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.error.unwrap().starts_with("Parent directory does not exist"));
    }
}
