//! `ferrule run`: Send a single message and print the answer.

use ferrule_agent::StopReason;
use ferrule_config::AppConfig;

use super::{build_agent, drive};

pub async fn run(config: &AppConfig, prompt: &str) -> anyhow::Result<()> {
    let mut agent = build_agent(config)?;
    let stop = drive(&mut agent, prompt).await;
    agent.shutdown().await;

    match stop? {
        Some(StopReason::Error) => anyhow::bail!("The model request failed"),
        Some(StopReason::Cancelled) => anyhow::bail!("Cancelled"),
        _ => Ok(()),
    }
}
