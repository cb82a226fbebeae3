//! Parameter assembly: the deterministic five-layer merge.
//!
//! Layers, lowest precedence first:
//!
//! 1. **Reserved section**: always included, never toggleable
//! 2. **Standard sections**: every enabled section, catalog order
//! 3. **Task defaults**: selection order, oldest first
//! 4. **Derived values**: completed calculator results for selected triggers
//! 5. **Custom overrides**: list order, last duplicate wins
//!
//! A later layer overwrites an earlier one on key collision. A key keeps the
//! position of its first appearance; only its value moves.
//!
//! Assembly never fails. A task or section missing from the catalog
//! contributes nothing and is logged.

use incarforge_core::params::merge_into;
use incarforge_core::{CatalogSnapshot, ParamMap};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::sections::SectionToggleStore;
use crate::selection::SelectionState;

/// Read-only view of every store, taken at the moment of assembly.
pub struct AssemblyInput<'a> {
    pub catalog: &'a CatalogSnapshot,
    pub selection: &'a SelectionState,
    pub sections: &'a SectionToggleStore,
    /// Completed derived results, already filtered to selected triggers and
    /// in selection order.
    pub derived: Vec<(&'a str, &'a ParamMap)>,
}

/// Final parameters plus per-layer bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssembledParameters {
    pub params: ParamMap,
    pub layers: Vec<LayerStats>,
}

impl AssembledParameters {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn layer(&self, name: &str) -> Option<&LayerStats> {
        self.layers.iter().find(|l| l.name == name)
    }
}

/// Statistics for a single merge layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerStats {
    /// Layer name.
    pub name: String,
    /// Key/value pairs the layer fed into the merge.
    pub contributed: usize,
    /// How many of those replaced a value from an earlier layer (or an
    /// earlier source within the same layer).
    pub overridden: usize,
}

pub const LAYER_RESERVED: &str = "reserved";
pub const LAYER_SECTIONS: &str = "sections";
pub const LAYER_TASKS: &str = "tasks";
pub const LAYER_DERIVED: &str = "derived";
pub const LAYER_CUSTOM: &str = "custom";

/// The parameter assembler. Stateless.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParameterAssembler;

impl ParameterAssembler {
    pub fn new() -> Self {
        Self
    }

    pub fn assemble(&self, input: &AssemblyInput<'_>) -> AssembledParameters {
        let mut params = ParamMap::new();
        let mut layers = Vec::with_capacity(5);

        // 1. Reserved section
        let mut stats = LayerStats::named(LAYER_RESERVED);
        match input.catalog.section(input.sections.reserved()) {
            Some(section) => stats.absorb(&mut params, section),
            None => debug!(section = %input.sections.reserved(), "Reserved section not in catalog"),
        }
        layers.push(stats);

        // 2. Enabled standard sections
        let mut stats = LayerStats::named(LAYER_SECTIONS);
        for key in input.sections.enabled() {
            match input.catalog.section(key) {
                Some(section) => stats.absorb(&mut params, section),
                None => warn!(section = %key, "Enabled section missing from catalog, skipped"),
            }
        }
        layers.push(stats);

        // 3. Task defaults
        let mut stats = LayerStats::named(LAYER_TASKS);
        for key in input.selection.iter() {
            match input.catalog.task(key) {
                Some(task) => stats.absorb(&mut params, &task.default_params),
                None => warn!(task = %key, "Selected task missing from catalog, skipped"),
            }
        }
        layers.push(stats);

        // 4. Derived values
        let mut stats = LayerStats::named(LAYER_DERIVED);
        for (_, derived) in &input.derived {
            stats.absorb(&mut params, derived);
        }
        layers.push(stats);

        // 5. Custom overrides
        let mut stats = LayerStats::named(LAYER_CUSTOM);
        let custom = input.sections.custom_map();
        stats.absorb(&mut params, &custom);
        layers.push(stats);

        debug!(
            params = params.len(),
            tasks = input.selection.len(),
            derived = input.derived.len(),
            "Parameters assembled"
        );
        AssembledParameters { params, layers }
    }
}

impl LayerStats {
    fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            contributed: 0,
            overridden: 0,
        }
    }

    fn absorb(&mut self, target: &mut ParamMap, source: &ParamMap) {
        self.contributed += source.len();
        self.overridden += merge_into(target, source);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sections::CustomParam;
    use crate::selection::ConstraintEngine;
    use crate::selection::tests::{stock_catalog, stock_rules};
    use incarforge_core::{CategoryEntry, StandardSections, TaskEntry};
    use indexmap::IndexMap;

    fn select(catalog: &CatalogSnapshot, keys: &[&str]) -> SelectionState {
        let rules = stock_rules();
        let engine = ConstraintEngine::new(&rules, catalog);
        let mut state = SelectionState::new();
        for key in keys {
            engine.select(&mut state, key).unwrap();
        }
        state
    }

    fn assemble(
        catalog: &CatalogSnapshot,
        selection: &SelectionState,
        sections: &SectionToggleStore,
        derived: Vec<(&str, &ParamMap)>,
    ) -> AssembledParameters {
        ParameterAssembler::new().assemble(&AssemblyInput {
            catalog,
            selection,
            sections,
            derived,
        })
    }

    /// One section, one task and one custom entry all setting X.
    fn collision_catalog() -> CatalogSnapshot {
        let mut tasks = IndexMap::new();
        tasks.insert(
            "T".to_string(),
            TaskEntry {
                display: None,
                params: [("X".to_string(), "2".to_string())].into_iter().collect(),
            },
        );
        let mut sections = StandardSections::new();
        sections.insert("d_system".into(), ParamMap::new());
        sections.insert("s".into(), [("X".to_string(), "1".to_string())].into_iter().collect());
        CatalogSnapshot::from_parts(
            vec![CategoryEntry {
                name: "Tasks".into(),
                tasks,
            }],
            sections,
        )
    }

    #[test]
    fn custom_beats_task_beats_section() {
        let catalog = collision_catalog();
        let mut selection = SelectionState::new();
        ConstraintEngine::new(&Default::default(), &catalog)
            .select(&mut selection, "T")
            .unwrap();

        let mut sections = SectionToggleStore::new(&catalog, "d_system", true);
        let without_custom = assemble(&catalog, &selection, &sections, Vec::new());
        assert_eq!(without_custom.get("X"), Some("2"));

        sections.add_custom(CustomParam::new("X", "3"));
        let assembled = assemble(&catalog, &selection, &sections, Vec::new());
        assert_eq!(assembled.get("X"), Some("3"));
        assert_eq!(assembled.layer(LAYER_TASKS).unwrap().overridden, 1);
        assert_eq!(assembled.layer(LAYER_CUSTOM).unwrap().overridden, 1);
    }

    #[test]
    fn reserved_section_always_included() {
        let catalog = stock_catalog();
        let mut sections = SectionToggleStore::new(&catalog, "d_system", true);
        sections.set_all(false);
        let assembled = assemble(&catalog, &SelectionState::new(), &sections, Vec::new());
        assert_eq!(assembled.get("SYSTEM"), Some("Generated By Q_robot"));
        assert_eq!(assembled.len(), 1);
    }

    #[test]
    fn disabled_section_contributes_nothing() {
        let catalog = stock_catalog();
        let mut sections = SectionToggleStore::new(&catalog, "d_system", true);
        sections.set_enabled("d_ionic", false).unwrap();
        let assembled = assemble(&catalog, &SelectionState::new(), &sections, Vec::new());
        assert_eq!(assembled.get("IBRION"), None);
        assert_eq!(assembled.get("ENCUT"), Some("400"));
    }

    #[test]
    fn later_selection_wins_and_first_position_kept() {
        let catalog = stock_catalog();
        let sections = SectionToggleStore::new(&catalog, "d_system", true);
        let selection = select(&catalog, &["PBE", "Opt", "NCORE"]);

        let assembled = assemble(&catalog, &selection, &sections, Vec::new());
        // ENCUT first appears in d_electronic, Opt overrides its value
        assert_eq!(assembled.get("ENCUT"), Some("450"));
        let keys: Vec<_> = assembled.params.keys().map(String::as_str).collect();
        assert_eq!(&keys[..4], &["SYSTEM", "ENCUT", "EDIFF", "IBRION"]);
        assert_eq!(assembled.get("IBRION"), Some("2"));
    }

    #[test]
    fn derived_layer_sits_between_tasks_and_custom() {
        let catalog = stock_catalog();
        let mut sections = SectionToggleStore::new(&catalog, "d_system", false);
        let selection = select(&catalog, &["ISPIN"]);
        let magmom: ParamMap = [
            ("MAGMOM".to_string(), "2*5.0".to_string()),
            ("ISPIN".to_string(), "1".to_string()),
        ]
        .into_iter()
        .collect();

        let assembled = assemble(&catalog, &selection, &sections, vec![("ISPIN", &magmom)]);
        assert_eq!(assembled.get("ISPIN"), Some("1"));
        assert_eq!(assembled.get("MAGMOM"), Some("2*5.0"));

        sections.add_custom(CustomParam::new("MAGMOM", "4*1.0"));
        let assembled = assemble(&catalog, &selection, &sections, vec![("ISPIN", &magmom)]);
        assert_eq!(assembled.get("MAGMOM"), Some("4*1.0"));
    }

    #[test]
    fn decorative_task_with_empty_defaults_merges_nothing() {
        let catalog = stock_catalog();
        let sections = SectionToggleStore::new(&catalog, "d_system", false);
        let selection = select(&catalog, &["LAPACK"]);
        let assembled = assemble(&catalog, &selection, &sections, Vec::new());
        assert_eq!(assembled.layer(LAYER_TASKS).unwrap().contributed, 0);
        assert_eq!(assembled.len(), 1);
    }

    #[test]
    fn assembly_is_deterministic() {
        let catalog = stock_catalog();
        let sections = SectionToggleStore::new(&catalog, "d_system", true);
        let selection = select(&catalog, &["HSE06", "D4", "Frequency", "Slab"]);
        let a = assemble(&catalog, &selection, &sections, Vec::new());
        let b = assemble(&catalog, &selection, &sections, Vec::new());
        assert_eq!(a.params, b.params);
        assert_eq!(a.layers, b.layers);
    }
}
