//! `linkwise identify`: Reconcile one observation and print the cluster.

use std::path::Path;

use linkwise_core::IdentifyResponse;
use linkwise_engine::Reconciler;
use tracing::{Instrument, info_span};

use super::{load_config, open_store};

pub async fn run(
    config_path: &Path,
    email: Option<String>,
    phone: Option<String>,
) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let observation = config.validation.rules().observe(email, phone)?;

    let store = open_store(&config).await?;
    let reconciler = Reconciler::from_config(store, &config.reconcile);

    let request_id = uuid::Uuid::new_v4();
    let outcome = reconciler
        .reconcile(observation)
        .instrument(info_span!("reconcile", %request_id))
        .await?;

    let response = IdentifyResponse::from(outcome.view);
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
