//! Glob tool: find files by path pattern.
//!
//! Patterns are translated to an anchored regex over `/`-separated paths
//! relative to the search root: `*` and `?` stay within one segment, `**/`
//! spans any number of directories, `[..]` and `{a,b}` work as in shells.

use async_trait::async_trait;
use ferrule_core::error::ToolError;
use ferrule_core::tool::{Tool, ToolInvocation, ToolKind, ToolResult};
use regex::Regex;

use crate::fs_util::{WalkOptions, display_path, walk_files};

const MAX_RESULTS: usize = 1000;

pub struct GlobTool;

/// Translate a glob pattern into regex source (unanchored).
pub fn glob_to_regex(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::new();
    let mut i = 0;
    let mut in_braces = 0usize;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '*' => {
                if chars.get(i + 1) == Some(&'*') {
                    if chars.get(i + 2) == Some(&'/') {
                        out.push_str("(?:.*/)?");
                        i += 3;
                    } else {
                        out.push_str(".*");
                        i += 2;
                    }
                    continue;
                }
                out.push_str("[^/]*");
            }
            '?' => out.push_str("[^/]"),
            '[' => {
                let close = chars[i + 1..].iter().position(|&ch| ch == ']');
                match close {
                    Some(offset) if offset > 0 => {
                        let body: String = chars[i + 1..i + 1 + offset].iter().collect();
                        let body = match body.strip_prefix('!') {
                            Some(rest) => format!("^{rest}"),
                            None => body,
                        };
                        out.push('[');
                        out.push_str(&body.replace('\\', "\\\\"));
                        out.push(']');
                        i += offset + 2;
                        continue;
                    }
                    _ => out.push_str("\\["),
                }
            }
            '{' => {
                in_braces += 1;
                out.push_str("(?:");
            }
            '}' if in_braces > 0 => {
                in_braces -= 1;
                out.push(')');
            }
            ',' if in_braces > 0 => out.push('|'),
            other => out.push_str(&regex::escape(&other.to_string())),
        }
        i += 1;
    }

    for _ in 0..in_braces {
        out.push(')');
    }
    out
}

/// Compile a glob into an anchored matcher.
pub fn compile_glob(pattern: &str, case_insensitive: bool) -> Result<Regex, regex::Error> {
    regex::RegexBuilder::new(&format!("^{}$", glob_to_regex(pattern)))
        .case_insensitive(case_insensitive)
        .build()
}

#[async_trait]
impl Tool for GlobTool {
    fn name(&self) -> &str {
        "glob"
    }

    fn description(&self) -> &str {
        "Find files matching a glob pattern. Supports ** for recursive matching."
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
                    "description": "Glob pattern to match, e.g. **/*.py"
                },
                "path": {
                    "type": "string",
                    "description": "Directory to search in (default: current directory)"
                }
            },
            "required": ["pattern"]
        })
    }

    async fn execute(&self, invocation: ToolInvocation) -> Result<ToolResult, ToolError> {
        let pattern = invocation.str_arg("pattern")?.to_string();
        let root = invocation.resolve_path(invocation.opt_str("path").unwrap_or("."));

        if !root.is_dir() {
            return Ok(ToolResult::error(format!(
                "Directory does not exist: {}",
                root.display()
            )));
        }

        let matcher = match compile_glob(&pattern, false) {
            Ok(m) => m,
            Err(e) => return Ok(ToolResult::error(format!("Invalid glob pattern: {e}"))),
        };

        let walk_root = root.clone();
        let files = tokio::task::spawn_blocking(move || {
            walk_files(
                &walk_root,
                WalkOptions {
                    skip_hidden: false,
                    skip_binary: false,
                    max_files: None,
                },
            )
        })
        .await
        .map_err(|e| ToolError::ExecutionFailed {
            tool_name: "glob".into(),
            reason: e.to_string(),
        })?;

        let matches: Vec<_> = files
            .into_iter()
            .filter(|path| {
                path.strip_prefix(&root)
                    .map(|rel| matcher.is_match(&rel.to_string_lossy().replace('\\', "/")))
                    .unwrap_or(false)
            })
            .collect();

        let total = matches.len();
        let mut lines: Vec<String> = matches
            .iter()
            .take(MAX_RESULTS)
            .map(|p| display_path(&invocation.cwd, p))
            .collect();

        let mut result_truncated = false;
        if total > MAX_RESULTS {
            lines.push(format!("...(limited to {MAX_RESULTS} results)"));
            result_truncated = true;
        }

        let output = if lines.is_empty() {
            format!("No files matched pattern '{pattern}'")
        } else {
            lines.join("\n")
        };

        let mut result = ToolResult::success(output)
            .with_metadata("path", root.display().to_string())
            .with_metadata("matches", total);
        if result_truncated {
            result = result.truncated();
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn invocation(cwd: &std::path::Path, args: serde_json::Value) -> ToolInvocation {
        ToolInvocation::new(args.as_object().cloned().unwrap(), cwd)
    }

    fn matches(pattern: &str, path: &str) -> bool {
        compile_glob(pattern, false).unwrap().is_match(path)
    }

    #[test]
    fn glob_translation() {
        assert!(matches("*.py", "a.py"));
        assert!(!matches("*.py", "src/a.py"));
        assert!(matches("**/*.py", "a.py"));
        assert!(matches("**/*.py", "src/deep/a.py"));
        assert!(matches("src/**", "src/x/y.rs"));
        assert!(matches("file?.txt", "file1.txt"));
        assert!(!matches("file?.txt", "file10.txt"));
        assert!(matches("*.{rs,toml}", "Cargo.toml"));
        assert!(matches("[ab].md", "b.md"));
        assert!(!matches("[!ab].md", "a.md"));
        assert!(matches("a+b.txt", "a+b.txt"));
    }

    #[tokio::test]
    async fn finds_files_recursively() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("pkg/sub")).unwrap();
        std::fs::write(dir.path().join("main.py"), "").unwrap();
        std::fs::write(dir.path().join("pkg/util.py"), "").unwrap();
        std::fs::write(dir.path().join("pkg/sub/deep.py"), "").unwrap();
        std::fs::write(dir.path().join("pkg/readme.md"), "").unwrap();

        let result = GlobTool
            .execute(invocation(dir.path(), json!({"pattern": "**/*.py"})))
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.output, "main.py\npkg/sub/deep.py\npkg/util.py");
        assert_eq!(result.metadata["matches"], 3);
    }

    #[tokio::test]
    async fn search_subdirectory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("pkg")).unwrap();
        std::fs::write(dir.path().join("top.py"), "").unwrap();
        std::fs::write(dir.path().join("pkg/util.py"), "").unwrap();

        let result = GlobTool
            .execute(invocation(dir.path(), json!({"pattern": "*.py", "path": "pkg"})))
            .await
            .unwrap();
        assert_eq!(result.output, "pkg/util.py");
    }

    #[tokio::test]
    async fn missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let result = GlobTool
            .execute(invocation(dir.path(), json!({"pattern": "*", "path": "absent"})))
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.error.unwrap().starts_with("Directory does not exist"));
    }

    #[tokio::test]
    async fn no_matches_is_success() {
        let dir = tempfile::tempdir().unwrap();
        let result = GlobTool
            .execute(invocation(dir.path(), json!({"pattern": "*.zig"})))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.metadata["matches"], 0);
    }
}
