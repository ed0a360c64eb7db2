//! The fixed system prompt.

use std::path::Path;

use ferrule_config::AppConfig;

const IDENTITY: &str = "You are ferrule, an AI coding agent running in the user's terminal. \
You help with software engineering tasks by reading and editing files, searching the \
workspace, and running commands through the tools provided to you. Prefer using tools to \
inspect the workspace over guessing. Keep answers concise and report what you changed.";

/// Render the system prompt for an agent working in `cwd`.
pub fn build_system_prompt(
    cwd: &Path,
    developer_instructions: Option<&str>,
    user_instructions: Option<&str>,
) -> String {
    let mut sections = vec![
        IDENTITY.to_string(),
        format!("# Environment\nWorking directory: {}", cwd.display()),
    ];

    if let Some(text) = developer_instructions.map(str::trim).filter(|t| !t.is_empty()) {
        sections.push(format!("# Developer instructions\n{text}"));
    }
    if let Some(text) = user_instructions.map(str::trim).filter(|t| !t.is_empty()) {
        sections.push(format!("# User instructions\n{text}"));
    }

    sections.join("\n\n")
}

pub fn system_prompt_for(config: &AppConfig) -> String {
    build_system_prompt(
        &config.working_dir(),
        config.developer_instructions.as_deref(),
        config.user_instructions.as_deref(),
    )
}
