//! `linkwise contacts`: Dump the contact table as JSON.

use std::path::Path;

use super::{load_config, open_store};

pub async fn run(config_path: &Path) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let store = open_store(&config).await?;

    let contacts = store.list_all().await?;
    let out = serde_json::json!({
        "contacts": contacts,
        "count": contacts.len(),
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
