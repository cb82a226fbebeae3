//! Catalog trait: the read-only source of categories, tasks and standard
//! parameter sections.
//!
//! The catalog is fetched once at session start and frozen into a
//! [`CatalogSnapshot`]. Per-task parameter lookups can still go through the
//! live [`Catalog`] (the task-parameter preview does this).

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::CatalogError;
use crate::params::{ParamMap, deserialize_lenient, value_to_string};

/// Selection cardinality of a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    /// At most one task of the category may be selected.
    Single,
    /// Any number of tasks may be selected.
    Multi,
}

/// One task as delivered by the catalog.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskEntry {
    /// Optional human-readable label; the task key is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,

    /// Default parameters (may be empty for decorative tasks).
    #[serde(default, alias = "defaultParams", deserialize_with = "deserialize_lenient")]
    pub params: ParamMap,
}

/// One category as delivered by the catalog, tasks in declaration order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryEntry {
    pub name: String,
    #[serde(default)]
    pub tasks: IndexMap<String, TaskEntry>,
}

/// Standard parameter sections in catalog-declared order.
pub type StandardSections = IndexMap<String, ParamMap>;

/// Deserialize [`StandardSections`] with lenient scalar values.
pub fn deserialize_sections<'de, D>(deserializer: D) -> Result<StandardSections, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: IndexMap<String, IndexMap<String, serde_json::Value>> =
        IndexMap::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(section, params)| {
            let params = params
                .into_iter()
                .map(|(k, v)| (k, value_to_string(&v)))
                .collect();
            (section, params)
        })
        .collect())
}

/// A resolved, immutable task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub key: String,
    pub category: String,
    pub display: String,
    pub default_params: ParamMap,
}

/// The read-only catalog data source.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// A short name for logs (e.g. "http", "static").
    fn name(&self) -> &str;

    /// Ordered categories with their member tasks and default parameters.
    async fn categories(&self) -> Result<Vec<CategoryEntry>, CatalogError>;

    /// Standard parameter sections keyed by section name.
    async fn standard_sections(&self) -> Result<StandardSections, CatalogError>;

    /// One task's parameters. May be empty.
    async fn task_params(&self, task: &str) -> Result<ParamMap, CatalogError>;
}

/// Frozen catalog data for one session.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    categories: Vec<(String, Vec<String>)>,
    tasks: IndexMap<String, Task>,
    sections: StandardSections,
}

impl CatalogSnapshot {
    /// Build a snapshot from raw catalog payloads.
    ///
    /// A task key declared in more than one category keeps its first
    /// declaration; task identity is unique within the catalog.
    pub fn from_parts(categories: Vec<CategoryEntry>, sections: StandardSections) -> Self {
        let mut tasks: IndexMap<String, Task> = IndexMap::new();
        let mut ordered = Vec::with_capacity(categories.len());

        for category in categories {
            let mut members = Vec::with_capacity(category.tasks.len());
            for (key, entry) in category.tasks {
                if let Some(existing) = tasks.get(&key) {
                    tracing::warn!(
                        task = %key,
                        first = %existing.category,
                        duplicate = %category.name,
                        "Task declared in more than one category, keeping the first"
                    );
                    continue;
                }
                members.push(key.clone());
                tasks.insert(
                    key.clone(),
                    Task {
                        display: entry.display.unwrap_or_else(|| key.clone()),
                        key,
                        category: category.name.clone(),
                        default_params: entry.params,
                    },
                );
            }
            ordered.push((category.name, members));
        }

        Self {
            categories: ordered,
            tasks,
            sections,
        }
    }

    /// Fetch categories and standard sections and freeze them.
    pub async fn load(catalog: &dyn Catalog) -> Result<Self, CatalogError> {
        let categories = catalog
            .categories()
            .await
            .map_err(|e| CatalogError::FetchFailed(format!("categories from {}: {e}", catalog.name())))?;
        let sections = catalog
            .standard_sections()
            .await
            .map_err(|e| CatalogError::FetchFailed(format!("standard sections from {}: {e}", catalog.name())))?;

        tracing::info!(
            catalog = catalog.name(),
            categories = categories.len(),
            sections = sections.len(),
            "Catalog loaded"
        );
        Ok(Self::from_parts(categories, sections))
    }

    /// Look up a task by its exact key.
    pub fn task(&self, key: &str) -> Option<&Task> {
        self.tasks.get(key)
    }

    /// Resolve user input to a canonical task key, exact match first and
    /// then case-insensitively against keys and display names.
    pub fn resolve(&self, name: &str) -> Option<&str> {
        let name = name.trim();
        if let Some((key, _)) = self.tasks.get_key_value(name) {
            return Some(key.as_str());
        }
        self.tasks
            .values()
            .find(|t| t.key.eq_ignore_ascii_case(name) || t.display.eq_ignore_ascii_case(name))
            .map(|t| t.key.as_str())
    }

    /// Category names with their task keys, in catalog order.
    pub fn categories(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.categories
            .iter()
            .map(|(name, members)| (name.as_str(), members.as_slice()))
    }

    /// Whether a category with this name exists.
    pub fn has_category(&self, name: &str) -> bool {
        self.categories.iter().any(|(n, _)| n == name)
    }

    /// Resolve user input to a canonical category name, exact match first
    /// and then case-insensitively.
    pub fn resolve_category(&self, name: &str) -> Option<&str> {
        let name = name.trim();
        self.categories
            .iter()
            .find(|(n, _)| n == name)
            .or_else(|| self.categories.iter().find(|(n, _)| n.eq_ignore_ascii_case(name)))
            .map(|(n, _)| n.as_str())
    }

    /// All tasks in catalog order.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    /// Standard sections in catalog order.
    pub fn sections(&self) -> &StandardSections {
        &self.sections
    }

    pub fn section(&self, key: &str) -> Option<&ParamMap> {
        self.sections.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> ParamMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn sample() -> CatalogSnapshot {
        let mut functional = IndexMap::new();
        functional.insert("PBE".to_string(), TaskEntry::default());
        functional.insert(
            "RPBE".to_string(),
            TaskEntry {
                display: None,
                params: params(&[("GGA", "RP")]),
            },
        );
        let mut tasks = IndexMap::new();
        tasks.insert(
            "Opt".to_string(),
            TaskEntry {
                display: Some("Optimization".into()),
                params: params(&[("IBRION", "2"), ("NSW", "300")]),
            },
        );
        tasks.insert("PBE".to_string(), TaskEntry::default());

        let mut sections = StandardSections::new();
        sections.insert("d_system".into(), params(&[("SYSTEM", "x")]));
        sections.insert("d_electronic".into(), params(&[("ENCUT", "450")]));

        CatalogSnapshot::from_parts(
            vec![
                CategoryEntry {
                    name: "Functional".into(),
                    tasks: functional,
                },
                CategoryEntry {
                    name: "Tasks".into(),
                    tasks,
                },
            ],
            sections,
        )
    }

    #[test]
    fn snapshot_indexes_tasks_by_key() {
        let snapshot = sample();
        let rpbe = snapshot.task("RPBE").unwrap();
        assert_eq!(rpbe.category, "Functional");
        assert_eq!(rpbe.display, "RPBE");
        assert_eq!(rpbe.default_params["GGA"], "RP");
    }

    #[test]
    fn duplicate_task_keeps_first_category() {
        let snapshot = sample();
        assert_eq!(snapshot.task("PBE").unwrap().category, "Functional");
        let (_, members) = snapshot.categories().nth(1).unwrap();
        assert_eq!(members, ["Opt".to_string()]);
    }

    #[test]
    fn resolve_is_case_insensitive_and_accepts_display() {
        let snapshot = sample();
        assert_eq!(snapshot.resolve("opt"), Some("Opt"));
        assert_eq!(snapshot.resolve("optimization"), Some("Opt"));
        assert_eq!(snapshot.resolve(" RPBE "), Some("RPBE"));
        assert_eq!(snapshot.resolve("HSE06"), None);
    }

    #[test]
    fn resolve_category_ignores_case() {
        let snapshot = sample();
        assert_eq!(snapshot.resolve_category("Functional"), Some("Functional"));
        assert_eq!(snapshot.resolve_category(" functional"), Some("Functional"));
        assert_eq!(snapshot.resolve_category("Funtional"), None);
    }

    #[test]
    fn sections_keep_catalog_order() {
        let snapshot = sample();
        let keys: Vec<_> = snapshot.sections().keys().cloned().collect();
        assert_eq!(keys, vec!["d_system", "d_electronic"]);
    }

    #[test]
    fn category_entry_parses_original_config_shape() {
        let json = r#"{
            "name": "Tasks",
            "tasks": {
                "Frequency": {"params": {"IBRION": 5, "POTIM": 0.015, "NFREE": 2}},
                "Single": {"params": {}}
            }
        }"#;
        let entry: CategoryEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.tasks.len(), 2);
        assert_eq!(entry.tasks["Frequency"].params["POTIM"], "0.015");
        assert!(entry.tasks["Single"].params.is_empty());
    }
}
