//! `incarforge status`: show the effective configuration.

use super::load_config;
use incarforge_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;

    println!("incarforge Status");
    println!("=================");
    println!("  Config dir:      {}", AppConfig::config_dir().display());
    println!("  Backend:         {}", config.backend.base_url);
    println!("  Timeout:         {}s", config.backend.timeout_secs);
    match &config.backend.offline_catalog {
        Some(path) => println!("  Offline catalog: {}", path.display()),
        None => println!("  Offline catalog: (none)"),
    }
    println!("  Default tasks:   {}", config.session.default_tasks.join(", "));
    println!("  Sections:        {}", if config.session.sections_enabled { "enabled" } else { "disabled" });
    println!("  Output file:     {}", config.output.filename);
    println!(
        "  Rules:           {} single-select, {} groups, {} conflicts, {} derivations",
        config.rules.single_select_categories.len(),
        config.rules.exclusive_groups.len(),
        config.rules.conflict_pairs.len(),
        config.rules.derivations.len()
    );

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("\n  ✅ Config file found");
    } else {
        println!("\n  ⚠️  No config file - run `incarforge onboard` first");
    }

    println!("\n# Effective configuration\n");
    println!("{}", toml::to_string_pretty(&config)?);

    Ok(())
}
