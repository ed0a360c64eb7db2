//! File edit tool: exact string replacement.

use async_trait::async_trait;
use ferrule_core::error::ToolError;
use ferrule_core::tool::{Tool, ToolInvocation, ToolKind, ToolResult};

use crate::fs_util::display_path;

pub struct FileEditTool;

#[async_trait]
impl Tool for FileEditTool {
    fn name(&self) -> &str {
        "edit_file"
    }

    fn description(&self) -> &str {
        "Edit a file by replacing an exact string. old_string must match exactly once unless \
         replace_all is set. An empty old_string creates a new file with new_string as content."
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
                "old_string": {
                    "type": "string",
                    "description": "Exact text to replace"
                },
                "new_string": {
                    "type": "string",
                    "description": "Replacement text"
                },
                "replace_all": {
                    "type": "boolean",
                    "description": "Replace every occurrence (default: false)"
                }
            },
            "required": ["path", "old_string", "new_string"]
        })
    }

    async fn execute(&self, invocation: ToolInvocation) -> Result<ToolResult, ToolError> {
        let path = invocation.resolve_path(invocation.str_arg("path")?);
        let old_string = invocation.str_arg("old_string")?;
        let new_string = invocation.str_arg("new_string")?;
        let replace_all = invocation.bool_arg("replace_all", false);
        let shown = display_path(&invocation.cwd, &path);

        let exists = tokio::fs::try_exists(&path).await.unwrap_or(false);

        if old_string.is_empty() {
            if exists {
                return Ok(ToolResult::error(format!(
                    "old_string is empty but {shown} already exists; use write_file to overwrite it"
                )));
            }
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&path, new_string).await?;
            return Ok(ToolResult::success(format!("Created {shown}"))
                .with_metadata("path", shown)
                .with_metadata("replacements", 0));
        }

        if !exists {
            return Ok(ToolResult::error(format!("File not found: {shown}")));
        }

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) => return Ok(ToolResult::error(format!("Failed to read file: {e}"))),
        };

        let occurrences = content.matches(old_string).count();
        if occurrences == 0 {
            return Ok(ToolResult::error(format!("old_string not found in {shown}")));
        }
        if occurrences > 1 && !replace_all {
            return Ok(ToolResult::error(format!(
                "old_string appears {occurrences} times in {shown}; \
                 include more surrounding context or set replace_all"
            ))
            .with_metadata("occurrences", occurrences));
        }

        let updated = if replace_all {
            content.replace(old_string, new_string)
        } else {
            content.replacen(old_string, new_string, 1)
        };
        tokio::fs::write(&path, &updated).await?;

        let replaced = if replace_all { occurrences } else { 1 };
        Ok(ToolResult::success(format!(
            "Edited {shown}: {replaced} replacement{}",
            if replaced == 1 { "" } else { "s" }
        ))
        .with_metadata("path", shown)
        .with_metadata("replacements", replaced))
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
    async fn single_replacement() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn main() { old(); }").unwrap();
        let result = FileEditTool
            .execute(invocation(
                dir.path(),
                json!({"path": "a.rs", "old_string": "old()", "new_string": "new()"}),
            ))
            .await
            .unwrap();
        assert!(result.success, "{:?}", result.error);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("a.rs")).unwrap(),
            "fn main() { new(); }"
        );
    }

    #[tokio::test]
    async fn ambiguous_match_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "x x x").unwrap();
        let result = FileEditTool
            .execute(invocation(
                dir.path(),
                json!({"path": "a.txt", "old_string": "x", "new_string": "y"}),
            ))
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.error.unwrap().contains("appears 3 times"));
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "x x x");
    }

    #[tokio::test]
    async fn replace_all() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "x x x").unwrap();
        let result = FileEditTool
            .execute(invocation(
                dir.path(),
                json!({"path": "a.txt", "old_string": "x", "new_string": "y", "replace_all": true}),
            ))
            .await
            .unwrap();
        assert_eq!(result.output, "Edited a.txt: 3 replacements");
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "y y y");
    }

    #[tokio::test]
    async fn empty_old_string_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = FileEditTool
            .execute(invocation(
                dir.path(),
                json!({"path": "new.txt", "old_string": "", "new_string": "hello"}),
            ))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(std::fs::read_to_string(dir.path().join("new.txt")).unwrap(), "hello");
    }

    #[tokio::test]
    async fn not_found() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "abc").unwrap();
        let result = FileEditTool
            .execute(invocation(
                dir.path(),
                json!({"path": "a.txt", "old_string": "zzz", "new_string": "y"}),
            ))
            .await
            .unwrap();
        assert_eq!(result.error.as_deref(), Some("old_string not found in a.txt"));
    }
}
