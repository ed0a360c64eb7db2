//! Shell tool: execute system commands.
//!
//! Commands run through `sh -c` (or `cmd /C`) in the agent's working
//! directory with a filtered environment, a timeout, and an optional
//! command allowlist.

use std::collections::BTreeMap;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use ferrule_core::error::ToolError;
use ferrule_core::tool::{Tool, ToolInvocation, ToolKind, ToolResult};
use regex::Regex;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::fs_util::truncate_utf8;
use crate::glob::compile_glob;

const DEFAULT_TIMEOUT_SECS: u64 = 120;
const MAX_OUTPUT_BYTES: usize = 100 * 1024;

/// Which variables the child process sees.
#[derive(Debug, Clone, Default)]
pub struct ShellEnvPolicy {
    /// Case-insensitive glob patterns over variable names
    pub exclude_patterns: Vec<String>,
    /// Variables set after exclusion
    pub set_vars: BTreeMap<String, String>,
}

/// Execute shell commands with safety constraints.
pub struct ShellTool {
    /// If non-empty, only these commands are allowed.
    allowed_commands: Vec<String>,
    exclude: Vec<Regex>,
    set_vars: BTreeMap<String, String>,
}

impl ShellTool {
    pub fn new(allowed_commands: Vec<String>, env: ShellEnvPolicy) -> Self {
        let exclude = env
            .exclude_patterns
            .iter()
            .filter_map(|p| match compile_glob(p, true) {
                Ok(r) => Some(r),
                Err(e) => {
                    warn!(pattern = %p, error = %e, "Ignoring invalid environment exclude pattern");
                    None
                }
            })
            .collect();
        Self {
            allowed_commands,
            exclude,
            set_vars: env.set_vars,
        }
    }

    fn is_command_allowed(&self, command: &str) -> bool {
        if self.allowed_commands.is_empty() {
            return true; // No allowlist = all commands allowed
        }

        // Extract the base command (first word)
        let base_cmd = command.split_whitespace().next().unwrap_or("").trim();

        self.allowed_commands.iter().any(|a| a == base_cmd)
    }

    /// The environment handed to the child process.
    fn child_env(&self, parent: impl Iterator<Item = (String, String)>) -> BTreeMap<String, String> {
        let mut env: BTreeMap<String, String> = parent
            .filter(|(name, _)| !self.exclude.iter().any(|r| r.is_match(name)))
            .collect();
        env.extend(self.set_vars.clone());
        env
    }
}

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        "shell"
    }

    fn description(&self) -> &str {
        "Execute a shell command and return stdout/stderr. Use this for running programs, \
         tests, git operations, etc."
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Shell
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute"
                },
                "timeout": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": 600,
                    "description": "Timeout in seconds (default: 120)"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, invocation: ToolInvocation) -> Result<ToolResult, ToolError> {
        let command = invocation.str_arg("command")?;
        let timeout_secs = invocation.u64_arg("timeout", DEFAULT_TIMEOUT_SECS);

        if !self.is_command_allowed(command) {
            return Err(ToolError::PermissionDenied {
                tool_name: "shell".into(),
                reason: format!(
                    "Command '{}' not in allowlist",
                    command.split_whitespace().next().unwrap_or("")
                ),
            });
        }

        debug!(command = %command, cwd = %invocation.cwd.display(), "Executing shell command");

        let mut cmd = if cfg!(target_os = "windows") {
            let mut c = Command::new("cmd");
            c.args(["/C", command]);
            c
        } else {
            let mut c = Command::new("sh");
            c.args(["-c", command]);
            c
        };
        cmd.current_dir(&invocation.cwd)
            .env_clear()
            .envs(self.child_env(std::env::vars()))
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output =
            match tokio::time::timeout(Duration::from_secs(timeout_secs), cmd.output()).await {
                Ok(Ok(output)) => output,
                Ok(Err(e)) => {
                    return Err(ToolError::ExecutionFailed {
                        tool_name: "shell".into(),
                        reason: e.to_string(),
                    });
                }
                Err(_) => {
                    warn!(command = %command, timeout_secs, "Command timed out");
                    return Ok(ToolResult::error(format!(
                        "Command timed out after {timeout_secs}s"
                    ))
                    .with_metadata("timeout_secs", timeout_secs));
                }
            };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        let mut text = stdout.trim_end().to_string();
        if !stderr.trim().is_empty() {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str("[stderr]\n");
            text.push_str(stderr.trim_end());
        }

        let cut = text.len() > MAX_OUTPUT_BYTES;
        if cut {
            text = format!(
                "{}\n... [output truncated]",
                truncate_utf8(&text, MAX_OUTPUT_BYTES)
            );
        }

        let code = output.status.code().unwrap_or(-1);
        let mut result = if output.status.success() {
            ToolResult::success(text)
        } else {
            warn!(command = %command, exit_code = code, "Command failed");
            ToolResult::error(format!("Command exited with code {code}")).with_output(text)
        };
        result = result.with_metadata("exit_code", code);
        if cut {
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

    fn policy() -> ShellEnvPolicy {
        ShellEnvPolicy {
            exclude_patterns: vec!["*KEY*".into(), "*TOKEN*".into()],
            set_vars: BTreeMap::from([("FERRULE_SHELL".to_string(), "1".to_string())]),
        }
    }

    #[test]
    fn allowlist_check() {
        let tool = ShellTool::new(vec!["ls".into(), "cat".into(), "git".into()], policy());
        assert!(tool.is_command_allowed("ls -la"));
        assert!(tool.is_command_allowed("git status"));
        assert!(!tool.is_command_allowed("rm -rf /"));
    }

    #[test]
    fn empty_allowlist_allows_all() {
        let tool = ShellTool::new(vec![], policy());
        assert!(tool.is_command_allowed("anything goes"));
    }

    #[test]
    fn environment_is_filtered() {
        let tool = ShellTool::new(vec![], policy());
        let parent = vec![
            ("PATH".to_string(), "/bin".to_string()),
            ("OPENAI_API_KEY".to_string(), "sk".to_string()),
            ("github_token".to_string(), "gh".to_string()),
        ];
        let env = tool.child_env(parent.into_iter());
        assert!(env.contains_key("PATH"));
        assert!(!env.contains_key("OPENAI_API_KEY"));
        assert!(!env.contains_key("github_token"));
        assert_eq!(env.get("FERRULE_SHELL").map(String::as_str), Some("1"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn runs_in_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "").unwrap();
        let tool = ShellTool::new(vec![], policy());
        let result = tool
            .execute(invocation(dir.path(), json!({"command": "ls"})))
            .await
            .unwrap();
        assert!(result.success);
        assert!(result.output.contains("marker.txt"));
        assert_eq!(result.metadata["exit_code"], 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_is_failure_with_output() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ShellTool::new(vec![], policy());
        let result = tool
            .execute(invocation(
                dir.path(),
                json!({"command": "echo partial; echo oops >&2; exit 3"}),
            ))
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Command exited with code 3"));
        assert_eq!(result.output, "partial\n[stderr]\noops");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timeout_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ShellTool::new(vec![], policy());
        let result = tool
            .execute(invocation(dir.path(), json!({"command": "sleep 5", "timeout": 1})))
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.error.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn blocked_command() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ShellTool::new(vec!["ls".into()], policy());
        let result = tool
            .execute(invocation(dir.path(), json!({"command": "rm -rf /"})))
            .await;
        assert!(matches!(result, Err(ToolError::PermissionDenied { .. })));
    }
}
