//! Configuration loading, validation, and management for incarforge.
//!
//! Loads configuration from `~/.incarforge/config.toml` with environment
//! variable overrides. Validates all settings at startup.
//!
//! The defaults reproduce the stock INCAR generator: PBE/NCORE/LAPACK/WRITE
//! preselected, Functional single-select, the vdW and calculation-type
//! exclusivity groups, and the Frequency/NCORE conflict.

use incarforge_core::CalculatorKind;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.incarforge/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Backend (catalog, calculators, renderer) connection
    #[serde(default)]
    pub backend: BackendConfig,

    /// Selection constraint rules
    #[serde(default)]
    pub rules: RulesConfig,

    /// Session start-up defaults
    #[serde(default)]
    pub session: SessionConfig,

    /// Output file settings
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Use a local catalog file instead of the backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offline_catalog: Option<PathBuf>,
}

fn default_base_url() -> String {
    "http://localhost:5001".into()
}
fn default_timeout_secs() -> u64 {
    30
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            offline_catalog: None,
        }
    }
}

/// A named set of tasks of which at most one may be selected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupConfig {
    pub name: String,
    pub members: Vec<String>,
}

/// Which calculator a trigger task fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivationConfig {
    pub task: String,
    pub calculator: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesConfig {
    /// Categories where selecting a task replaces the previous one
    #[serde(default = "default_single_select")]
    pub single_select_categories: Vec<String>,

    #[serde(default = "default_exclusive_groups")]
    pub exclusive_groups: Vec<GroupConfig>,

    /// Pairs of tasks that cannot coexist; selecting one drops the other
    #[serde(default = "default_conflict_pairs")]
    pub conflict_pairs: Vec<[String; 2]>,

    /// Tasks not shown as a task parameter section
    #[serde(default = "default_decorative_tasks")]
    pub decorative_tasks: Vec<String>,

    #[serde(default = "default_derivations")]
    pub derivations: Vec<DerivationConfig>,

    /// Category holding calculation tasks; rendered after the others
    #[serde(default = "default_primary_category")]
    pub primary_category: String,
}

fn default_single_select() -> Vec<String> {
    vec!["Functional".into()]
}
fn default_exclusive_groups() -> Vec<GroupConfig> {
    vec![
        GroupConfig {
            name: "vdw".into(),
            members: strings(&["D3-0", "D3-BJ", "D4"]),
        },
        GroupConfig {
            name: "calculation".into(),
            members: strings(&["Dimer", "Opt", "Frequency", "Single", "TSopt", "MD", "NEB"]),
        },
    ]
}
fn default_conflict_pairs() -> Vec<[String; 2]> {
    vec![["Frequency".into(), "NCORE".into()]]
}
fn default_decorative_tasks() -> Vec<String> {
    strings(&[
        "PBE", "RPBE", "R2SCAN", "HSE06", "D3-0", "D3-BJ", "D4", "Vaspsol", "DFT+U", "Gas",
        "Bulk", "Slab", "Mixer", "Dipole", "LAPACK", "NCORE", "WRITE",
    ])
}
fn default_derivations() -> Vec<DerivationConfig> {
    vec![
        DerivationConfig {
            task: "DFT+U".into(),
            calculator: "dftu".into(),
        },
        DerivationConfig {
            task: "ISPIN".into(),
            calculator: "magmom".into(),
        },
        DerivationConfig {
            task: "NEB".into(),
            calculator: "neb_images".into(),
        },
    ]
}
fn default_primary_category() -> String {
    "Tasks".into()
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            single_select_categories: default_single_select(),
            exclusive_groups: default_exclusive_groups(),
            conflict_pairs: default_conflict_pairs(),
            decorative_tasks: default_decorative_tasks(),
            derivations: default_derivations(),
            primary_category: default_primary_category(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Tasks selected when a session starts
    #[serde(default = "default_tasks")]
    pub default_tasks: Vec<String>,

    /// Whether standard sections start enabled
    #[serde(default = "default_true")]
    pub sections_enabled: bool,

    /// The always-included section; never user-toggleable
    #[serde(default = "default_reserved_section")]
    pub reserved_section: String,
}

fn default_tasks() -> Vec<String> {
    strings(&["PBE", "NCORE", "LAPACK", "WRITE"])
}
fn default_true() -> bool {
    true
}
fn default_reserved_section() -> String {
    "d_system".into()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_tasks: default_tasks(),
            sections_enabled: true,
            reserved_section: default_reserved_section(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_filename")]
    pub filename: String,

    /// Value of the leading `SYSTEM = ...` line in locally rendered files
    #[serde(default = "default_system_label")]
    pub system_label: String,
}

fn default_filename() -> String {
    "INCAR".into()
}
fn default_system_label() -> String {
    "Generated By Q_robot".into()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            filename: default_filename(),
            system_label: default_system_label(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.incarforge/config.toml).
    ///
    /// Environment overrides (highest priority):
    /// - `INCARFORGE_BACKEND_URL`
    /// - `INCARFORGE_TIMEOUT_SECS`
    /// - `INCARFORGE_OUTPUT`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("INCARFORGE_BACKEND_URL") {
            self.backend.base_url = url;
        }
        if let Some(raw) = lookup("INCARFORGE_TIMEOUT_SECS") {
            self.backend.timeout_secs = raw.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "INCARFORGE_TIMEOUT_SECS must be a positive integer, got '{raw}'"
                ))
            })?;
        }
        if let Some(filename) = lookup("INCARFORGE_OUTPUT") {
            self.output.filename = filename;
        }
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".incarforge")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend.base_url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "backend.base_url must not be empty".into(),
            ));
        }

        if self.backend.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "backend.timeout_secs must be > 0".into(),
            ));
        }

        let mut group_names = HashSet::new();
        for group in &self.rules.exclusive_groups {
            if !group_names.insert(group.name.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "exclusive group '{}' is declared twice",
                    group.name
                )));
            }
            let distinct: HashSet<_> = group.members.iter().collect();
            if distinct.len() < 2 {
                return Err(ConfigError::ValidationError(format!(
                    "exclusive group '{}' needs at least two distinct members",
                    group.name
                )));
            }
        }

        for [a, b] in &self.rules.conflict_pairs {
            if a == b {
                return Err(ConfigError::ValidationError(format!(
                    "conflict pair ['{a}', '{b}'] must name two different tasks"
                )));
            }
        }

        for derivation in &self.rules.derivations {
            derivation
                .calculator
                .parse::<CalculatorKind>()
                .map_err(|e| {
                    ConfigError::ValidationError(format!(
                        "derivation for task '{}': {e}",
                        derivation.task
                    ))
                })?;
        }

        if self.output.filename.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "output.filename must not be empty".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
