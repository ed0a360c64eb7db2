//! Built-in tool implementations for ferrule.
//!
//! Tools give the agent the ability to interact with its workspace:
//! read, write and edit files, search the tree, run shell commands,
//! search and fetch web pages, and keep notes.

pub mod file_edit;
pub mod file_read;
pub mod file_write;
pub mod fs_util;
pub mod glob;
pub mod grep;
pub mod list_dir;
pub mod memory;
pub mod shell;
pub mod todo;
pub mod web_fetch;
pub mod web_search;

use std::sync::Arc;

use ferrule_config::AppConfig;
use ferrule_core::registry::ToolRegistry;

pub use file_edit::FileEditTool;
pub use file_read::FileReadTool;
pub use file_write::FileWriteTool;
pub use glob::GlobTool;
pub use grep::GrepTool;
pub use list_dir::ListDirTool;
pub use memory::MemoryTool;
pub use shell::{ShellEnvPolicy, ShellTool};
pub use todo::TodoTool;
pub use web_fetch::WebFetchTool;
pub use web_search::WebSearchTool;

/// Create the tool registry described by `config`.
///
/// Every built-in tool is registered; `allowed_tools`, when set, limits
/// which of them the model sees and may call.
pub fn default_registry(config: &AppConfig) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    let env = ShellEnvPolicy {
        exclude_patterns: config.shell_environment.exclude_patterns.clone(),
        set_vars: config.shell_environment.set_vars.clone(),
    };

    registry.register(Arc::new(FileReadTool));
    registry.register(Arc::new(FileWriteTool));
    registry.register(Arc::new(FileEditTool));
    registry.register(Arc::new(ListDirTool));
    registry.register(Arc::new(GlobTool));
    registry.register(Arc::new(GrepTool));
    registry.register(Arc::new(ShellTool::new(Vec::new(), env)));
    registry.register(Arc::new(WebSearchTool::new()));
    registry.register(Arc::new(WebFetchTool::new()));
    registry.register(Arc::new(TodoTool::new()));
    registry.register(Arc::new(MemoryTool::new(AppConfig::data_dir())));

    if let Some(allowed) = &config.allowed_tools {
        registry.set_allowed(Some(allowed.iter().cloned().collect()));
    }

    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_all_builtins_in_order() {
        let registry = default_registry(&AppConfig::default());
        assert_eq!(
            registry.names(),
            vec![
                "read_file",
                "write_file",
                "edit_file",
                "list_dir",
                "glob",
                "grep",
                "shell",
                "web_search",
                "web_fetch",
                "todo",
                "memory",
            ]
        );
        assert_eq!(registry.definitions().len(), 11);
    }

    #[test]
    fn allow_list_limits_exposure() {
        let config = AppConfig {
            allowed_tools: Some(vec!["read_file".into(), "grep".into()]),
            ..AppConfig::default()
        };
        let registry = default_registry(&config);
        assert_eq!(registry.names(), vec!["read_file", "grep"]);
        assert!(registry.get("shell").is_none());
    }
}
