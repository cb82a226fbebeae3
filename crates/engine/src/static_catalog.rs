//! A catalog read from a JSON document instead of the backend.
//!
//! ```json
//! {
//!   "categories": [
//!     { "name": "Tasks", "tasks": { "Opt": { "params": { "IBRION": 2 } } } }
//!   ],
//!   "standard": { "d_electronic": { "ENCUT": 450 } }
//! }
//! ```

use async_trait::async_trait;
use incarforge_core::catalog::deserialize_sections;
use incarforge_core::{Catalog, CatalogError, CategoryEntry, ParamMap, StandardSections};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
struct CatalogDocument {
    #[serde(default)]
    categories: Vec<CategoryEntry>,
    #[serde(default, deserialize_with = "deserialize_sections")]
    standard: StandardSections,
}

#[derive(Debug, Clone)]
pub struct StaticCatalog {
    document: CatalogDocument,
}

impl StaticCatalog {
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let document: CatalogDocument =
            serde_json::from_str(json).map_err(|e| CatalogError::InvalidPayload(e.to_string()))?;
        tracing::debug!(
            categories = document.categories.len(),
            sections = document.standard.len(),
            "Static catalog parsed"
        );
        Ok(Self { document })
    }

    pub fn from_path(path: &Path) -> Result<Self, CatalogError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| CatalogError::FetchFailed(format!("{}: {e}", path.display())))?;
        Self::from_json(&json)
    }
}

#[async_trait]
impl Catalog for StaticCatalog {
    fn name(&self) -> &str {
        "static"
    }

    async fn categories(&self) -> Result<Vec<CategoryEntry>, CatalogError> {
        Ok(self.document.categories.clone())
    }

    async fn standard_sections(&self) -> Result<StandardSections, CatalogError> {
        Ok(self.document.standard.clone())
    }

    async fn task_params(&self, task: &str) -> Result<ParamMap, CatalogError> {
        let task = task.trim();
        self.document
            .categories
            .iter()
            .flat_map(|c| c.tasks.iter())
            .find(|(key, entry)| {
                key.eq_ignore_ascii_case(task)
                    || entry
                        .display
                        .as_deref()
                        .is_some_and(|d| d.eq_ignore_ascii_case(task))
            })
            .map(|(_, entry)| entry.params.clone())
            .ok_or_else(|| CatalogError::UnknownTask(task.to_string()))
    }
}
