//! `incarforge generate`: one-shot INCAR generation.
//!
//! Replays the given selections through the constraint engine in order,
//! waits for calculators to settle, renders and exports.

use super::{connect, exporter_for, load_config, parse_key_value, start_session};
use clap::Args;
use incarforge_client::DownloadExporter;
use incarforge_core::Exporter;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Task to select (repeatable, applied in order)
    #[arg(short, long = "task", value_name = "TASK")]
    pub tasks: Vec<String>,

    /// Clear every selected task of a category before selecting
    #[arg(long = "clear", value_name = "CATEGORY")]
    pub clear: Vec<String>,

    /// Exclude a standard parameter section
    #[arg(long = "disable-section", value_name = "SECTION")]
    pub disable_sections: Vec<String>,

    /// Custom override, highest precedence (repeatable)
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub set: Vec<(String, String)>,

    /// Start from an empty selection instead of the default tasks
    #[arg(long)]
    pub no_defaults: bool,

    /// Read the catalog from a JSON file and render locally
    #[arg(long, value_name = "FILE")]
    pub offline: Option<PathBuf>,

    /// Output path, `-` for stdout (default: output.filename from config)
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<String>,

    /// Save through the backend's download endpoint
    #[arg(long)]
    pub download: bool,

    /// Print a JSON summary instead of the stats line
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: GenerateArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let collaborators = connect(&config, args.offline.as_deref()).await?;
    let mut session = start_session(&config, &collaborators, !args.no_defaults);

    for category in &args.clear {
        session.clear_category(category)?;
    }

    for name in &args.tasks {
        let key = session.resolve(name).ok_or_else(|| format!("Unknown task: {name}"))?;
        let change = session.select(&key)?;
        for removed in &change.removed {
            if change.added.is_some() {
                eprintln!("  {key} replaced {removed}");
            } else {
                eprintln!("  {removed} toggled off");
            }
        }
    }

    for section in &args.disable_sections {
        session.set_section_enabled(section, false)?;
    }

    for (key, value) in &args.set {
        session.add_custom(key.as_str(), value.as_str());
    }

    session.settle_derivations().await;
    let outcome = session.generate(collaborators.renderer.as_ref()).await?;

    let target = args.output.unwrap_or_else(|| config.output.filename.clone());
    let exporter: Box<dyn Exporter> = match (&collaborators.backend, args.download && target != "-") {
        (Some(backend), true) => Box::new(DownloadExporter::new(backend.clone(), &target)),
        _ => exporter_for(&target),
    };
    let receipt = exporter.export(&outcome.text).await?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "tasks": session.selection().to_vec(),
                "param_count": outcome.param_count,
                "line_count": outcome.line_count,
                "target": receipt.target,
            }))?
        );
    } else {
        eprintln!("Parameters: {} | Lines: {}", outcome.param_count, outcome.line_count);
        if target != "-" {
            eprintln!("Saved to {}", receipt.target);
        }
    }

    Ok(())
}
