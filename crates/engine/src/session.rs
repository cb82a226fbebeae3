//! Session: the single owner of all mutable selection state.
//!
//! A session is created from a frozen catalog snapshot and a rule set, lives
//! for one user interaction, and is dropped afterwards. Every mutation goes
//! through `&mut self`, so there is exactly one writer and no locking.

use incarforge_config::SessionConfig;
use incarforge_core::{
    Catalog, CatalogError, CatalogSnapshot, GenerationError, GenerationRequest, ParamMap, Renderer,
    SelectionError,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::assembler::{AssembledParameters, AssemblyInput, ParameterAssembler};
use crate::derivation::DerivationHooks;
use crate::fetch::fetch_task_params;
use crate::generation::{self, GenerationOutcome};
use crate::rules::RuleSet;
use crate::sections::{CustomParam, SectionToggleStore};
use crate::selection::{ConstraintEngine, SelectionChange, SelectionState};

/// How a fresh session is initialised.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Tasks selected at start, in order, through the constraint engine.
    pub default_tasks: Vec<String>,
    /// Initial state of every toggleable section.
    pub sections_enabled: bool,
    /// The always-included section.
    pub reserved_section: String,
}

impl SessionOptions {
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            default_tasks: config.default_tasks.clone(),
            sections_enabled: config.sections_enabled,
            reserved_section: config.reserved_section.clone(),
        }
    }

    /// Same as the defaults but with nothing preselected.
    pub fn without_defaults(mut self) -> Self {
        self.default_tasks.clear();
        self
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from_config(&SessionConfig::default())
    }
}

/// Task parameters for display, one entry per selected non-decorative task.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TaskPreview {
    pub sections: Vec<(String, ParamMap)>,
    #[serde(skip)]
    pub failures: Vec<(String, CatalogError)>,
}

pub struct Session {
    catalog: CatalogSnapshot,
    rules: RuleSet,
    selection: SelectionState,
    sections: SectionToggleStore,
    hooks: DerivationHooks,
    assembler: ParameterAssembler,
}

impl Session {
    /// Create a session and apply the default selection.
    ///
    /// Defaults go through the constraint engine like any user selection;
    /// unknown default tasks are skipped with a warning. Must be called
    /// from within a tokio runtime if a default task is a derivation
    /// trigger.
    pub fn start(
        catalog: CatalogSnapshot,
        rules: RuleSet,
        hooks: DerivationHooks,
        options: &SessionOptions,
    ) -> Self {
        rules.lint(&catalog);
        let sections = SectionToggleStore::new(&catalog, options.reserved_section.clone(), options.sections_enabled);

        let mut session = Self {
            catalog,
            rules,
            selection: SelectionState::new(),
            sections,
            hooks,
            assembler: ParameterAssembler::new(),
        };

        for task in &options.default_tasks {
            if let Err(e) = session.select(task) {
                warn!(task = %task, error = %e, "Skipping default task");
            }
        }

        info!(
            tasks = session.catalog.tasks().count(),
            sections = session.sections.flags().len(),
            selected = session.selection.len(),
            "Session started"
        );
        session
    }

    pub fn catalog(&self) -> &CatalogSnapshot {
        &self.catalog
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn sections(&self) -> &SectionToggleStore {
        &self.sections
    }

    pub fn hooks(&self) -> &DerivationHooks {
        &self.hooks
    }

    /// Map user input to a task key (case-insensitive, display names too).
    pub fn resolve(&self, name: &str) -> Option<String> {
        self.catalog.resolve(name).map(str::to_string)
    }

    // ── Selection ────────────────────────────────────────────────────────

    pub fn select(&mut self, key: &str) -> Result<SelectionChange, SelectionError> {
        let change = ConstraintEngine::new(&self.rules, &self.catalog).select(&mut self.selection, key)?;
        self.follow(&change);
        Ok(change)
    }

    pub fn deselect(&mut self, key: &str) -> Result<SelectionChange, SelectionError> {
        let change = ConstraintEngine::new(&self.rules, &self.catalog).deselect(&mut self.selection, key)?;
        self.follow(&change);
        Ok(change)
    }

    /// Deselect every task of `category`, matched case-insensitively.
    /// Unknown categories fail and leave the selection untouched.
    pub fn clear_category(&mut self, category: &str) -> Result<SelectionChange, SelectionError> {
        let category = self
            .catalog
            .resolve_category(category)
            .ok_or_else(|| SelectionError::UnknownCategory(category.trim().to_string()))?
            .to_string();
        let change = ConstraintEngine::new(&self.rules, &self.catalog).clear_category(&mut self.selection, &category);
        self.follow(&change);
        Ok(change)
    }

    /// Keep derivation hooks in step with a selection change.
    fn follow(&mut self, change: &SelectionChange) {
        for removed in &change.removed {
            self.hooks.on_deselect(removed);
        }
        if let Some(added) = &change.added {
            self.hooks.on_select(added);
        }
    }

    // ── Sections and custom overrides ────────────────────────────────────

    pub fn set_section_enabled(&mut self, section: &str, enabled: bool) -> Result<(), SelectionError> {
        self.sections.set_enabled(section, enabled)
    }

    pub fn toggle_section(&mut self, section: &str) -> Result<bool, SelectionError> {
        self.sections.toggle(section)
    }

    pub fn add_custom(&mut self, key: impl Into<String>, value: impl Into<String>) -> usize {
        self.sections.add_custom(CustomParam::new(key, value))
    }

    pub fn update_custom(
        &mut self,
        index: usize,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), SelectionError> {
        self.sections.update_custom(index, CustomParam::new(key, value))
    }

    pub fn remove_custom(&mut self, index: usize) -> Result<CustomParam, SelectionError> {
        self.sections.remove_custom(index)
    }

    pub fn remove_custom_key(&mut self, key: &str) -> usize {
        self.sections.remove_custom_key(key)
    }

    pub fn custom(&self) -> &[CustomParam] {
        self.sections.custom()
    }

    // ── Derivations ──────────────────────────────────────────────────────

    /// Apply calculator results that have already arrived.
    pub fn poll_derivations(&mut self) -> usize {
        self.hooks.poll()
    }

    /// Wait for every outstanding calculator call.
    pub async fn settle_derivations(&mut self) {
        self.hooks.settle().await;
    }

    // ── Assembly and generation ──────────────────────────────────────────

    /// Merge every layer as the stores stand right now.
    pub fn assemble(&self) -> AssembledParameters {
        self.assembler.assemble(&AssemblyInput {
            catalog: &self.catalog,
            selection: &self.selection,
            sections: &self.sections,
            derived: self.hooks.derived_for(self.selection.iter()),
        })
    }

    /// The renderer request for the current state.
    pub fn generation_request(&self) -> GenerationRequest {
        generation::build_request(
            self.selection.to_vec(),
            self.sections.flags().clone(),
            &self.hooks.derived_for(self.selection.iter()),
            &self.sections.custom_map(),
        )
    }

    /// Fold in arrived derivations, then render. Selection state is left
    /// untouched on failure so the caller can retry.
    pub async fn generate(&mut self, renderer: &dyn Renderer) -> Result<GenerationOutcome, GenerationError> {
        self.poll_derivations();
        let request = self.generation_request();
        generation::generate(renderer, &request).await
    }

    /// Fetch parameters of every selected, non-decorative task and wait for
    /// all of them. Empty parameter sets are left out.
    pub async fn preview_task_parameters(&self, catalog: &dyn Catalog) -> TaskPreview {
        let tasks: Vec<String> = self
            .selection
            .iter()
            .filter(|k| !self.rules.is_decorative(k))
            .map(str::to_string)
            .collect();

        let join = fetch_task_params(catalog, &tasks).await;
        TaskPreview {
            sections: join
                .loaded
                .into_iter()
                .filter(|(_, params)| !params.is_empty())
                .collect(),
            failures: join.failed,
        }
    }

    /// Back to a blank form: nothing selected, every section off, no
    /// custom overrides, no derived values.
    pub fn reset(&mut self) {
        ConstraintEngine::new(&self.rules, &self.catalog).clear_all(&mut self.selection);
        self.hooks.clear();
        self.sections.set_all(false);
        self.sections.clear_custom();
        debug!("Session reset");
    }
}
