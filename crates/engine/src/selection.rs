//! Selection store and constraint engine.
//!
//! [`SelectionState`] is an ordered, key-unique set of task keys. Order is
//! merge precedence: the most recently selected task comes last and wins
//! on parameter collisions.
//!
//! [`ConstraintEngine`] is the only writer. After every operation:
//! - no two tasks of a single-select category are selected
//! - no two members of one exclusivity group are selected
//! - no conflict pair is fully selected

use incarforge_core::{CatalogSnapshot, SelectionError, SelectionMode};
use indexmap::IndexSet;
use serde::Serialize;
use tracing::debug;

use crate::rules::RuleSet;

/// Ordered set of selected task keys, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionState {
    keys: IndexSet<String>,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.keys.iter().cloned().collect()
    }

    /// Append `key`, moving it to the most recent position if present.
    fn push_latest(&mut self, key: &str) {
        self.keys.shift_remove(key);
        self.keys.insert(key.to_string());
    }

    fn remove(&mut self, key: &str) -> bool {
        self.keys.shift_remove(key)
    }

    fn clear(&mut self) {
        self.keys.clear();
    }
}

/// What a selection operation did. Callers use it to refresh dependent
/// state (derivation hooks, previews).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SelectionChange {
    /// The task that ended up selected, if any.
    pub added: Option<String>,
    /// Tasks removed by the operation, in removal order.
    pub removed: Vec<String>,
    /// The resulting selection.
    pub selection: Vec<String>,
}

/// Applies the selection rules to a [`SelectionState`].
pub struct ConstraintEngine<'a> {
    rules: &'a RuleSet,
    catalog: &'a CatalogSnapshot,
}

impl<'a> ConstraintEngine<'a> {
    pub fn new(rules: &'a RuleSet, catalog: &'a CatalogSnapshot) -> Self {
        Self { rules, catalog }
    }

    /// Select `key`.
    ///
    /// 1. Single-select category: drop every other selected task of it.
    /// 2. Otherwise, exclusivity group member: drop the other members.
    /// 3. Otherwise a plain multi-select task toggles off if already
    ///    selected.
    /// 4. Append `key` (most recent position).
    /// 5. Drop every conflict partner of `key`.
    ///
    /// Unknown keys fail and leave `state` untouched.
    pub fn select(
        &self,
        state: &mut SelectionState,
        key: &str,
    ) -> Result<SelectionChange, SelectionError> {
        let task = self
            .catalog
            .task(key)
            .ok_or_else(|| SelectionError::UnknownTask(key.to_string()))?;

        let mut removed = Vec::new();

        if self.rules.selection_mode(&task.category) == SelectionMode::Single {
            let siblings: Vec<String> = state
                .iter()
                .filter(|k| *k != key && self.category_of(k) == Some(task.category.as_str()))
                .map(str::to_string)
                .collect();
            for sibling in siblings {
                state.remove(&sibling);
                debug!(task = %key, replaced = %sibling, category = %task.category, "Single-select category replaced");
                removed.push(sibling);
            }
        } else if self.rules.groups_of(key).next().is_some() {
            let members: Vec<String> = self
                .rules
                .groups_of(key)
                .flat_map(|g| g.members.iter())
                .filter(|m| m.as_str() != key && state.contains(m))
                .cloned()
                .collect();
            for member in members {
                if state.remove(&member) {
                    debug!(task = %key, replaced = %member, "Exclusivity group member replaced");
                    removed.push(member);
                }
            }
        } else if state.contains(key) {
            state.remove(key);
            debug!(task = %key, "Task toggled off");
            return Ok(SelectionChange {
                added: None,
                removed: vec![key.to_string()],
                selection: state.to_vec(),
            });
        }

        state.push_latest(key);

        let partners: Vec<String> = self
            .rules
            .conflicts_of(key)
            .filter(|p| state.contains(p))
            .map(str::to_string)
            .collect();
        for partner in partners {
            state.remove(&partner);
            debug!(task = %key, dropped = %partner, "Conflicting task deselected");
            removed.push(partner);
        }

        debug!(task = %key, selected = state.len(), "Task selected");
        Ok(SelectionChange {
            added: Some(key.to_string()),
            removed,
            selection: state.to_vec(),
        })
    }

    /// Deselect `key` regardless of its selection mode. Deselecting a task
    /// that is not selected is a no-op.
    pub fn deselect(
        &self,
        state: &mut SelectionState,
        key: &str,
    ) -> Result<SelectionChange, SelectionError> {
        if self.catalog.task(key).is_none() {
            return Err(SelectionError::UnknownTask(key.to_string()));
        }
        let removed = if state.remove(key) {
            debug!(task = %key, "Task deselected");
            vec![key.to_string()]
        } else {
            Vec::new()
        };
        Ok(SelectionChange {
            added: None,
            removed,
            selection: state.to_vec(),
        })
    }

    /// Remove every selected task of `category`. Nothing else is touched.
    pub fn clear_category(&self, state: &mut SelectionState, category: &str) -> SelectionChange {
        let doomed: Vec<String> = state
            .iter()
            .filter(|k| self.category_of(k) == Some(category))
            .map(str::to_string)
            .collect();
        for key in &doomed {
            state.remove(key);
        }
        debug!(category = %category, cleared = doomed.len(), "Category cleared");
        SelectionChange {
            added: None,
            removed: doomed,
            selection: state.to_vec(),
        }
    }

    /// Remove everything.
    pub fn clear_all(&self, state: &mut SelectionState) -> SelectionChange {
        let removed = state.to_vec();
        state.clear();
        SelectionChange {
            added: None,
            removed,
            selection: Vec::new(),
        }
    }

    fn category_of(&self, key: &str) -> Option<&str> {
        self.catalog.task(key).map(|t| t.category.as_str())
    }
}
