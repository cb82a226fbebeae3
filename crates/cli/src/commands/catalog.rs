//! `incarforge catalog`: list what can be selected.

use super::{connect, load_config};
use incarforge_core::SelectionMode;
use incarforge_engine::RuleSet;
use std::path::PathBuf;

pub async fn run(offline: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let collaborators = connect(&config, offline.as_deref()).await?;
    let rules = RuleSet::from_config(&config.rules);
    let snapshot = &collaborators.snapshot;

    println!("Catalog ({})\n", collaborators.describe());

    for (category, tasks) in snapshot.categories() {
        let mode = match rules.selection_mode(category) {
            SelectionMode::Single => "single",
            SelectionMode::Multi => "multi",
        };
        println!("{category} [{mode}]");
        for key in tasks {
            let Some(task) = snapshot.task(key) else { continue };
            let mut notes = Vec::new();
            for group in rules.groups_of(key) {
                notes.push(format!("group:{}", group.name));
            }
            for partner in rules.conflicts_of(key) {
                notes.push(format!("conflicts:{partner}"));
            }
            if let Some(kind) = rules.trigger_for(key) {
                notes.push(format!("derives:{kind}"));
            }
            let notes = if notes.is_empty() {
                String::new()
            } else {
                format!("  ({})", notes.join(", "))
            };
            println!("  {:<12} {:>2} params{notes}", task.key, task.default_params.len());
        }
        println!();
    }

    println!("Standard sections");
    for (section, params) in snapshot.sections() {
        let reserved = if *section == config.session.reserved_section {
            "  (always included)"
        } else {
            ""
        };
        println!("  {section:<14} {:>2} params{reserved}", params.len());
    }

    Ok(())
}
