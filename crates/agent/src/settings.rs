//! The slice of configuration the agent loop consumes.

use std::path::PathBuf;

use ferrule_config::AppConfig;

use crate::prompt::system_prompt_for;

#[derive(Debug, Clone)]
pub struct AgentSettings {
    /// Model identifier, forwarded verbatim.
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    /// Upper bound on model calls per run.
    pub max_turns: u32,
    /// Decoder retries per model call.
    pub max_retries: u32,
    /// Tools resolve relative paths against this.
    pub cwd: PathBuf,
    pub system_prompt: Option<String>,
}

impl AgentSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            model: config.model.name.clone(),
            temperature: config.model.temperature,
            max_tokens: config.model.max_tokens,
            max_turns: config.max_turns,
            max_retries: config.max_retries,
            cwd: config.working_dir(),
            system_prompt: Some(system_prompt_for(config)),
        }
    }

    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = cwd.into();
        self
    }

    pub fn with_system_prompt(mut self, prompt: Option<String>) -> Self {
        self.system_prompt = prompt;
        self
    }
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}
