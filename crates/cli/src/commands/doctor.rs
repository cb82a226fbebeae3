//! `incarforge doctor`: diagnose configuration and backend health.

use incarforge_client::BackendClient;
use incarforge_config::AppConfig;
use incarforge_engine::{RuleSet, StaticCatalog};
use incarforge_core::CatalogSnapshot;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 incarforge Doctor");
    println!("===================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_dir().join("config.toml");
    if !config_path.exists() {
        println!("  ⚠️  No config file - defaults in use (run `incarforge onboard`)");
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            println!("\n  ⚠️  1 issue(s) found. See above for details.");
            return Ok(());
        }
    };

    // Backend
    let backend = BackendClient::from_config(&config.backend)?;
    let mut snapshot = None;
    match backend.health().await {
        Ok(status) => {
            println!("  ✅ Backend {} reports '{status}'", backend.base_url());
            match CatalogSnapshot::load(&backend).await {
                Ok(loaded) => {
                    println!("  ✅ Catalog loaded ({} tasks)", loaded.tasks().count());
                    snapshot = Some(loaded);
                }
                Err(e) => {
                    println!("  ❌ Catalog unavailable: {e}");
                    issues += 1;
                }
            }
        }
        Err(e) => {
            println!("  ❌ Backend {} unreachable: {e}", backend.base_url());
            issues += 1;
        }
    }

    // Offline catalog
    if let Some(path) = &config.backend.offline_catalog {
        match StaticCatalog::from_path(path) {
            Ok(catalog) => match CatalogSnapshot::load(&catalog).await {
                Ok(loaded) => {
                    println!("  ✅ Offline catalog {} readable", path.display());
                    snapshot.get_or_insert(loaded);
                }
                Err(e) => {
                    println!("  ❌ Offline catalog {}: {e}", path.display());
                    issues += 1;
                }
            },
            Err(e) => {
                println!("  ❌ Offline catalog {}: {e}", path.display());
                issues += 1;
            }
        }
    }

    // Rules against whichever catalog we could load
    if let Some(snapshot) = snapshot {
        let findings = RuleSet::from_config(&config.rules).lint(&snapshot);
        if findings.is_empty() {
            println!("  ✅ Rule set matches catalog");
        } else {
            for finding in &findings {
                println!("  ⚠️  {finding}");
            }
            issues += findings.len();
        }
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
