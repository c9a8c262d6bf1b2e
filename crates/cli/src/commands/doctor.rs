//! `linkwise doctor`: Diagnose configuration and store health.

use std::path::Path;

use linkwise_config::AppConfig;

pub async fn run(config_path: &Path) -> anyhow::Result<()> {
    println!("Linkwise Doctor");
    println!("===============\n");

    let mut issues = 0;

    if config_path.exists() {
        println!("  [ok]   Config file found: {}", config_path.display());
    } else {
        println!("  [warn] No config file at {}, using defaults", config_path.display());
    }

    let config = match AppConfig::load_with_env(config_path) {
        Ok(config) => {
            println!("  [ok]   Config valid");
            config
        }
        Err(e) => {
            println!("  [fail] Config invalid: {e}");
            anyhow::bail!("configuration is invalid");
        }
    };

    println!("  [info] Store: {:?}", config.store);

    match linkwise_store::open(&config.store).await {
        Ok(store) => match store.health_check().await {
            Ok(()) => {
                println!("  [ok]   Store reachable ({})", store.name());
                let contacts = store.list_all().await?;
                let primaries = contacts.iter().filter(|c| c.is_primary()).count();
                println!(
                    "  [info] {} contacts in {} clusters",
                    contacts.len(),
                    primaries
                );
            }
            Err(e) => {
                println!("  [fail] Store health check failed: {e}");
                issues += 1;
            }
        },
        Err(e) => {
            println!("  [fail] Could not open store: {e}");
            issues += 1;
        }
    }

    println!();
    if issues == 0 {
        println!("  All checks passed.");
        Ok(())
    } else {
        anyhow::bail!("{issues} issue(s) found")
    }
}
