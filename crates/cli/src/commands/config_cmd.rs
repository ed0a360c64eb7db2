//! `ferrule config`: Configuration management commands.

use std::path::Path;

use anyhow::Context;
use ferrule_config::AppConfig;

use super::config_path;

pub fn show(config: &AppConfig) -> anyhow::Result<()> {
    let mut shown = config.clone();
    if shown.api_key.is_some() {
        shown.api_key = Some("***".into());
    }
    let toml_str = toml::to_string_pretty(&shown)?;
    println!("{toml_str}");
    Ok(())
}

pub fn path(explicit: Option<&Path>) -> anyhow::Result<()> {
    println!("{}", config_path(explicit).display());
    Ok(())
}

pub fn init(explicit: Option<&Path>, force: bool) -> anyhow::Result<()> {
    let path = config_path(explicit);
    write_default(&path, force)?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn write_default(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, AppConfig::default_toml())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
