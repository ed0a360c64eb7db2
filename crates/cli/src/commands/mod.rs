//! Subcommands and the wiring they share.

pub mod chat;
pub mod config_cmd;
pub mod run;
pub mod tools;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use ferrule_agent::{AgentEvent, AgentLoop, AgentSettings, StopReason};
use ferrule_config::AppConfig;
use ferrule_providers::OpenAiCompatProvider;
use ferrule_tools::default_registry;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::render::Renderer;

/// Values given on the command line that take precedence over the file.
#[derive(Debug, Default)]
pub struct Overrides {
    pub config: Option<PathBuf>,
    pub model: Option<String>,
    pub cwd: Option<PathBuf>,
    pub max_turns: Option<u32>,
}

pub fn config_path(explicit: Option<&std::path::Path>) -> PathBuf {
    explicit
        .map(PathBuf::from)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"))
}

pub fn load_config(overrides: &Overrides) -> anyhow::Result<AppConfig> {
    let mut config = match &overrides.config {
        Some(path) => {
            let mut config = AppConfig::load_from(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?;
            config.apply_env(|key| std::env::var(key).ok());
            config
        }
        None => AppConfig::load().context("Failed to load config")?,
    };

    if let Some(model) = &overrides.model {
        config.model.name = model.clone();
    }
    if let Some(cwd) = &overrides.cwd {
        config.cwd = Some(cwd.clone());
    }
    if let Some(max_turns) = overrides.max_turns {
        config.max_turns = max_turns;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn provider_name(base_url: &str) -> &'static str {
    if base_url.contains("openrouter.ai") {
        "openrouter"
    } else if base_url.contains("api.openai.com") {
        "openai"
    } else {
        "openai-compatible"
    }
}

/// Build an agent talking to the configured endpoint.
pub fn build_agent(config: &AppConfig) -> anyhow::Result<AgentLoop> {
    let api_key = config.api_key.clone().with_context(|| {
        format!(
            "No API key configured. Set FERRULE_API_KEY (or OPENROUTER_API_KEY / OPENAI_API_KEY) \
             or add api_key to {}",
            AppConfig::config_dir().join("config.toml").display()
        )
    })?;

    let provider = OpenAiCompatProvider::with_timeout(
        provider_name(&config.base_url),
        config.base_url.as_str(),
        api_key,
        Duration::from_secs(config.request_timeout_secs),
    );
    let tools = Arc::new(default_registry(config));

    Ok(AgentLoop::new(
        Arc::new(provider),
        tools,
        AgentSettings::from_config(config),
    ))
}

/// Cancel `cancel` when the user presses Ctrl-C. Abort the handle once the
/// guarded work is over.
pub fn cancel_on_ctrl_c(cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, cancelling run");
            cancel.cancel();
        }
    })
}

/// Run one message through the agent, rendering events as they arrive.
/// Returns why the run stopped.
pub async fn drive(agent: &mut AgentLoop, message: &str) -> anyhow::Result<Option<StopReason>> {
    let cancel = CancellationToken::new();
    agent.set_cancellation(cancel.clone());
    let ctrl_c = cancel_on_ctrl_c(cancel);

    let mut renderer = Renderer::new(std::io::stdout(), std::io::stderr());
    let mut stop = None;
    {
        let mut events = agent.run(message);
        while let Some(event) = events.next().await {
            if let AgentEvent::AgentEnd { stop_reason, .. } = &event {
                stop = Some(*stop_reason);
            }
            renderer.render(&event)?;
        }
    }

    ctrl_c.abort();
    Ok(stop)
}
