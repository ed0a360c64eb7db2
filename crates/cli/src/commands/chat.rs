//! `ferrule chat`: Interactive session.
//!
//! Every message goes to the same agent, so history accumulates across
//! turns. Ctrl-C cancels the message in flight; at the prompt it exits.

use std::io::Write;

use ferrule_config::AppConfig;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::{build_agent, drive};

pub async fn run(config: &AppConfig) -> anyhow::Result<()> {
    let mut agent = build_agent(config)?;

    eprintln!();
    eprintln!("  ferrule chat");
    eprintln!("  Model:  {}", config.model.name);
    eprintln!("  Cwd:    {}", config.working_dir().display());
    eprintln!("  Tools:  {}", agent.tools().names().join(", "));
    eprintln!();
    eprintln!("  Type 'exit' or press Ctrl+C to quit.");
    eprintln!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        eprint!("> ");
        std::io::stderr().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };

        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        if matches!(message, "exit" | "quit" | "/exit" | "/quit") {
            break;
        }

        drive(&mut agent, message).await?;
        println!();
    }

    agent.shutdown().await;
    eprintln!();
    eprintln!(
        "  Session {} ended after {} model calls.",
        agent.session().id,
        agent.session().turn_count()
    );
    Ok(())
}
