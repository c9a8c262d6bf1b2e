//! `linkwise init`: Write the default configuration file.

use std::path::Path;

use anyhow::{Context, bail};
use linkwise_config::AppConfig;

pub fn run(config_path: &Path, force: bool) -> anyhow::Result<()> {
    if config_path.exists() && !force {
        bail!(
            "Config already exists at {} (use --force to overwrite)",
            config_path.display()
        );
    }

    if let Some(dir) = config_path.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
            println!("Created config directory: {}", dir.display());
        }
    }

    std::fs::write(config_path, AppConfig::default_toml())
        .with_context(|| format!("Failed to write {}", config_path.display()))?;
    println!("Wrote config to {}", config_path.display());
    println!("Next: edit [store] if you want PostgreSQL, then run `linkwise serve`.");
    Ok(())
}
