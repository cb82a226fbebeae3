pub mod catalog;
pub mod doctor;
pub mod generate;
pub mod onboard;
pub mod shell;
pub mod status;

use incarforge_client::{BackendClient, FileExporter, HttpCalculator, StdoutExporter};
use incarforge_config::AppConfig;
use incarforge_core::{Calculator, Catalog, CatalogSnapshot, Exporter, Renderer};
use incarforge_engine::{DerivationHooks, LocalRenderer, RuleSet, Session, SessionOptions, StaticCatalog};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The collaborators a session talks to.
pub struct Collaborators {
    pub catalog: Arc<dyn Catalog>,
    pub renderer: Arc<dyn Renderer>,
    pub calculators: Vec<Arc<dyn Calculator>>,
    /// Present when talking to a live backend.
    pub backend: Option<BackendClient>,
    pub snapshot: CatalogSnapshot,
}

impl Collaborators {
    pub fn describe(&self) -> String {
        match &self.backend {
            Some(backend) => format!("backend {}", backend.base_url()),
            None => "offline catalog".to_string(),
        }
    }
}

pub fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    Ok(AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?)
}

/// Connect to the backend, or read an offline catalog when `offline` (or
/// `backend.offline_catalog`) names one. Offline sessions render locally
/// and have no calculators.
pub async fn connect(
    config: &AppConfig,
    offline: Option<&Path>,
) -> Result<Collaborators, Box<dyn std::error::Error>> {
    let offline: Option<PathBuf> = offline
        .map(Path::to_path_buf)
        .or_else(|| config.backend.offline_catalog.clone());

    if let Some(path) = offline {
        let catalog = StaticCatalog::from_path(&path)?;
        let snapshot = CatalogSnapshot::load(&catalog).await?;
        let renderer = LocalRenderer::from_config(snapshot.clone(), config);
        tracing::info!(path = %path.display(), "Using offline catalog");
        return Ok(Collaborators {
            catalog: Arc::new(catalog),
            renderer: Arc::new(renderer),
            calculators: Vec::new(),
            backend: None,
            snapshot,
        });
    }

    let backend = BackendClient::from_config(&config.backend)?;
    let snapshot = CatalogSnapshot::load(&backend)
        .await
        .map_err(|e| format!("{e} (is the backend running at {}?)", backend.base_url()))?;
    Ok(Collaborators {
        catalog: Arc::new(backend.clone()),
        renderer: Arc::new(backend.clone()),
        calculators: HttpCalculator::all(&backend),
        backend: Some(backend),
        snapshot,
    })
}

pub fn start_session(config: &AppConfig, collaborators: &Collaborators, with_defaults: bool) -> Session {
    let rules = RuleSet::from_config(&config.rules);
    let hooks = DerivationHooks::new(&rules).with_calculators(collaborators.calculators.iter().cloned());
    let mut options = SessionOptions::from_config(&config.session);
    if !with_defaults {
        options = options.without_defaults();
    }
    Session::start(collaborators.snapshot.clone(), rules, hooks, &options)
}

/// `-` means stdout; anything else is a file path.
pub fn exporter_for(target: &str) -> Box<dyn Exporter> {
    if target == "-" {
        Box::new(StdoutExporter)
    } else {
        Box::new(FileExporter::new(target))
    }
}

/// Split `KEY=VALUE`. Used by clap and by the shell.
pub fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    let (key, value) = (key.trim(), value.trim());
    if key.is_empty() || value.is_empty() {
        return Err(format!("expected KEY=VALUE, got '{raw}'"));
    }
    Ok((key.to_string(), value.to_string()))
}
