//! `ferrule tools`: List the tools the model can call.

use ferrule_config::AppConfig;
use ferrule_core::registry::ToolRegistry;
use ferrule_tools::default_registry;

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    print!("{}", listing(&default_registry(config)));
    Ok(())
}

fn listing(registry: &ToolRegistry) -> String {
    let tools = registry.tools();
    let width = tools.iter().map(|t| t.name().len()).max().unwrap_or(0);

    let mut out = format!("{} tools available\n\n", tools.len());
    for tool in &tools {
        let kind = tool.kind();
        let marker = if kind.is_mutating() { "*" } else { " " };
        let summary = tool.description().lines().next().unwrap_or_default();
        out.push_str(&format!(
            "  {marker} {:<width$}  {:<8}  {summary}\n",
            tool.name(),
            kind.as_str(),
        ));
    }
    out.push_str("\n  * may modify files, run commands, or reach the network\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_every_exposed_tool() {
        let config = AppConfig {
            allowed_tools: Some(vec!["read_file".into(), "shell".into()]),
            ..AppConfig::default()
        };
        let text = listing(&default_registry(&config));
        assert!(text.starts_with("2 tools available"));
        assert!(text.contains("read_file"));
        assert!(text.contains("* shell"));
        assert!(!text.contains("grep"));
    }
}
