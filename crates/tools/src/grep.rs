//! Grep tool: regex search over file contents.

use std::path::PathBuf;

use async_trait::async_trait;
use ferrule_core::error::ToolError;
use ferrule_core::tool::{Tool, ToolInvocation, ToolKind, ToolResult};
use regex::RegexBuilder;

use crate::fs_util::{WalkOptions, display_path, walk_files};

/// Files searched per call when the target is a directory.
const MAX_FILES: usize = 500;

/// Matching lines reported per call.
const MAX_MATCHES: usize = 1000;

pub struct GrepTool;

#[async_trait]
impl Tool for GrepTool {
    fn name(&self) -> &str {
        "grep"
    }

    fn description(&self) -> &str {
        "Search for a regex pattern in file contents. Returns matching lines with file paths \
         and line numbers."
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Read
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Regular expression to search for"
                },
                "path": {
                    "type": "string",
                    "description": "File or directory to search in (default: current directory)"
                },
                "case_insensitive": {
                    "type": "boolean",
                    "description": "Case-insensitive search (default: false)"
                }
            },
            "required": ["pattern"]
        })
    }

    async fn execute(&self, invocation: ToolInvocation) -> Result<ToolResult, ToolError> {
        let pattern = invocation.str_arg("pattern")?.to_string();
        let target = invocation.resolve_path(invocation.opt_str("path").unwrap_or("."));
        let case_insensitive = invocation.bool_arg("case_insensitive", false);

        if !target.exists() {
            return Ok(ToolResult::error(format!(
                "Path does not exist: {}",
                target.display()
            )));
        }

        let regex = match RegexBuilder::new(&pattern)
            .case_insensitive(case_insensitive)
            .build()
        {
            Ok(r) => r,
            Err(e) => return Ok(ToolResult::error(format!("Invalid regex pattern: {e}"))),
        };

        let files: Vec<PathBuf> = if target.is_dir() {
            let root = target.clone();
            tokio::task::spawn_blocking(move || {
                walk_files(
                    &root,
                    WalkOptions {
                        skip_hidden: true,
                        skip_binary: true,
                        max_files: Some(MAX_FILES),
                    },
                )
            })
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "grep".into(),
                reason: e.to_string(),
            })?
        } else {
            vec![target.clone()]
        };

        let mut output_lines = Vec::new();
        let mut matches = 0usize;
        let mut capped = false;

        'files: for file in &files {
            // Unreadable or non-UTF-8 files are skipped.
            let Ok(content) = tokio::fs::read_to_string(file).await else {
                continue;
            };

            let mut file_matches = Vec::new();
            for (i, line) in content.lines().enumerate() {
                if regex.is_match(line) {
                    if matches >= MAX_MATCHES {
                        capped = true;
                        if !file_matches.is_empty() {
                            output_lines.push(format!("=== {} ===", display_path(&invocation.cwd, file)));
                            output_lines.append(&mut file_matches);
                        }
                        break 'files;
                    }
                    matches += 1;
                    file_matches.push(format!("{}: {line}", i + 1));
                }
            }

            if !file_matches.is_empty() {
                output_lines.push(format!("=== {} ===", display_path(&invocation.cwd, file)));
                output_lines.append(&mut file_matches);
            }
        }

        if output_lines.is_empty() {
            return Ok(ToolResult::success(format!("No matches found for pattern '{pattern}'"))
                .with_metadata("path", target.display().to_string())
                .with_metadata("matches", 0)
                .with_metadata("files_searched", files.len()));
        }

        if capped {
            output_lines.push(format!("...(limited to {MAX_MATCHES} matches)"));
        }

        let mut result = ToolResult::success(output_lines.join("\n"))
            .with_metadata("path", target.display().to_string())
            .with_metadata("matches", matches)
            .with_metadata("files_searched", files.len());
        if capped {
            result = result.truncated();
        }
        Ok(result)
    }
}
