pub mod contacts;
pub mod doctor;
pub mod identify;
pub mod init;
pub mod serve;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use linkwise_config::AppConfig;
use linkwise_core::ContactStore;

/// Load the config at `path` with environment overrides applied.
pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    AppConfig::load_with_env(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))
}

/// Open the store named by `config`.
pub async fn open_store(config: &AppConfig) -> anyhow::Result<Arc<dyn ContactStore>> {
    linkwise_store::open(&config.store)
        .await
        .with_context(|| format!("Failed to open {} store", config.store.backend))
}
