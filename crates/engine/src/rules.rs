//! Rule set: the data that drives the constraint engine.
//!
//! Category cardinality, exclusivity groups, conflict pairs, decorative
//! tasks and derivation triggers all live here as plain data built from
//! configuration, never as hard-coded branches.

use incarforge_config::RulesConfig;
use incarforge_core::{CalculatorKind, CatalogSnapshot, SelectionMode};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A named set of task keys of which at most one may be selected.
/// Members may come from different categories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusivityGroup {
    pub name: String,
    pub members: Vec<String>,
}

impl ExclusivityGroup {
    pub fn new(name: impl Into<String>, members: &[&str]) -> Self {
        Self {
            name: name.into(),
            members: members.iter().map(|m| m.to_string()).collect(),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.members.iter().any(|m| m == key)
    }
}

/// Two tasks that cannot coexist. Unordered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictPair(pub String, pub String);

impl ConflictPair {
    pub fn new(a: impl Into<String>, b: impl Into<String>) -> Self {
        Self(a.into(), b.into())
    }

    /// The other half of the pair, if `key` is one half.
    pub fn partner(&self, key: &str) -> Option<&str> {
        if self.0 == key {
            Some(&self.1)
        } else if self.1 == key {
            Some(&self.0)
        } else {
            None
        }
    }
}

/// All selection rules for a session.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    single_select: BTreeSet<String>,
    groups: Vec<ExclusivityGroup>,
    conflicts: Vec<ConflictPair>,
    decorative: BTreeSet<String>,
    triggers: IndexMap<String, CalculatorKind>,
    primary_category: String,
}

impl RuleSet {
    /// An empty rule set: every category multi-select, no groups.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the rule set from (already validated) configuration.
    ///
    /// Derivations naming an unknown calculator are skipped with a warning.
    pub fn from_config(config: &RulesConfig) -> Self {
        let mut rules = Self {
            single_select: config.single_select_categories.iter().cloned().collect(),
            groups: config
                .exclusive_groups
                .iter()
                .map(|g| ExclusivityGroup {
                    name: g.name.clone(),
                    members: g.members.clone(),
                })
                .collect(),
            conflicts: config
                .conflict_pairs
                .iter()
                .map(|[a, b]| ConflictPair::new(a.clone(), b.clone()))
                .collect(),
            decorative: config.decorative_tasks.iter().cloned().collect(),
            triggers: IndexMap::new(),
            primary_category: config.primary_category.clone(),
        };

        for derivation in &config.derivations {
            match derivation.calculator.parse::<CalculatorKind>() {
                Ok(kind) => {
                    rules.triggers.insert(derivation.task.clone(), kind);
                }
                Err(e) => {
                    tracing::warn!(task = %derivation.task, error = %e, "Skipping derivation rule");
                }
            }
        }
        rules
    }

    pub fn with_single_select(mut self, category: impl Into<String>) -> Self {
        self.single_select.insert(category.into());
        self
    }

    pub fn with_group(mut self, group: ExclusivityGroup) -> Self {
        self.groups.push(group);
        self
    }

    pub fn with_conflict(mut self, a: impl Into<String>, b: impl Into<String>) -> Self {
        self.conflicts.push(ConflictPair::new(a, b));
        self
    }

    pub fn with_decorative(mut self, task: impl Into<String>) -> Self {
        self.decorative.insert(task.into());
        self
    }

    pub fn with_trigger(mut self, task: impl Into<String>, kind: CalculatorKind) -> Self {
        self.triggers.insert(task.into(), kind);
        self
    }

    pub fn with_primary_category(mut self, category: impl Into<String>) -> Self {
        self.primary_category = category.into();
        self
    }

    pub fn selection_mode(&self, category: &str) -> SelectionMode {
        if self.single_select.contains(category) {
            SelectionMode::Single
        } else {
            SelectionMode::Multi
        }
    }

    /// Every group that contains `key`.
    pub fn groups_of<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a ExclusivityGroup> {
        self.groups.iter().filter(move |g| g.contains(key))
    }

    /// Every task that conflicts with `key`.
    pub fn conflicts_of<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> {
        self.conflicts.iter().filter_map(move |p| p.partner(key))
    }

    pub fn groups(&self) -> &[ExclusivityGroup] {
        &self.groups
    }

    pub fn conflicts(&self) -> &[ConflictPair] {
        &self.conflicts
    }

    /// Decorative tasks are not shown as a task parameter section, but
    /// still take part in the merge like any other task.
    pub fn is_decorative(&self, key: &str) -> bool {
        self.decorative.contains(key)
    }

    pub fn trigger_for(&self, key: &str) -> Option<CalculatorKind> {
        self.triggers.get(key).copied()
    }

    pub fn triggers(&self) -> impl Iterator<Item = (&str, CalculatorKind)> {
        self.triggers.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn primary_category(&self) -> &str {
        &self.primary_category
    }

    /// Rule entries referring to tasks or categories the catalog does not
    /// contain. Not fatal; the rule simply never fires.
    pub fn lint(&self, catalog: &CatalogSnapshot) -> Vec<String> {
        let mut findings = Vec::new();

        for category in &self.single_select {
            if !catalog.has_category(category) {
                findings.push(format!("single-select category '{category}' is not in the catalog"));
            }
        }
        for group in &self.groups {
            for member in &group.members {
                if catalog.task(member).is_none() {
                    findings.push(format!("group '{}' member '{member}' is not in the catalog", group.name));
                }
            }
        }
        for pair in &self.conflicts {
            for key in [&pair.0, &pair.1] {
                if catalog.task(key).is_none() {
                    findings.push(format!("conflict pair member '{key}' is not in the catalog"));
                }
            }
        }
        for task in self.triggers.keys() {
            if catalog.task(task).is_none() {
                findings.push(format!("derivation trigger '{task}' is not in the catalog"));
            }
        }

        for finding in &findings {
            tracing::warn!(finding = %finding, "Rule set does not match catalog");
        }
        findings
    }
}
