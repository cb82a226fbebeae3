//! Offline renderer: produces the organised INCAR layout from a catalog
//! snapshot without a backend.
//!
//! Layout:
//!
//! ```text
//! SYSTEM = <label>
//!
//! # Task: <task>
//! KEY = value
//!
//! # Standard Parameters - <Section Title>
//! KEY = value
//!
//! # Custom Parameters
//! KEY = value
//! ```
//!
//! Model/correction tasks come before primary-category tasks so calculation
//! tasks read last. Keys inside a block are sorted. A key set by a custom
//! override is dropped from task and section blocks; a key set by any task
//! is dropped from section blocks.

use async_trait::async_trait;
use incarforge_config::AppConfig;
use incarforge_core::{
    CatalogSnapshot, GenerationError, GenerationRequest, ParamMap, RenderResponse, Renderer,
};
use std::collections::BTreeSet;
use tracing::debug;

pub struct LocalRenderer {
    catalog: CatalogSnapshot,
    system_label: String,
    reserved_section: String,
    primary_category: String,
}

impl LocalRenderer {
    pub fn new(catalog: CatalogSnapshot) -> Self {
        Self::from_config(catalog, &AppConfig::default())
    }

    pub fn from_config(catalog: CatalogSnapshot, config: &AppConfig) -> Self {
        Self {
            catalog,
            system_label: config.output.system_label.clone(),
            reserved_section: config.session.reserved_section.clone(),
            primary_category: config.rules.primary_category.clone(),
        }
    }

    pub fn with_system_label(mut self, label: impl Into<String>) -> Self {
        self.system_label = label.into();
        self
    }

    /// Render `request` to text and a parameter count.
    pub fn render_text(&self, request: &GenerationRequest) -> (String, usize) {
        // (display name, params), model tasks first
        let mut model = Vec::new();
        let mut primary = Vec::new();
        for name in &request.tasks {
            let Some(task) = self.catalog.resolve(name).and_then(|key| self.catalog.task(key)) else {
                debug!(task = %name, "Unknown task in request, skipped");
                continue;
            };
            let entry = (task.display.as_str(), &task.default_params);
            if task.category == self.primary_category {
                primary.push(entry);
            } else {
                model.push(entry);
            }
        }
        let task_blocks: Vec<(&str, &ParamMap)> = model.into_iter().chain(primary).collect();

        let sections: Vec<(&str, &ParamMap)> = {
            let mut enabled: Vec<_> = request
                .include_sections
                .iter()
                .filter(|(key, on)| **on && **key != self.reserved_section)
                .filter_map(|(key, _)| self.catalog.section(key).map(|p| (key.as_str(), p)))
                .collect();
            enabled.sort_by(|a, b| a.0.cmp(b.0));
            enabled
        };

        let custom: ParamMap = request
            .custom_params
            .iter()
            .filter_map(|(k, v)| {
                let key = k.trim();
                (!key.is_empty()).then(|| (key.to_string(), v.trim().to_string()))
            })
            .collect();

        let custom_keys: BTreeSet<&str> = custom.keys().map(String::as_str).collect();
        let task_keys: BTreeSet<&str> = task_blocks
            .iter()
            .flat_map(|(_, params)| params.keys().map(String::as_str))
            .collect();

        let mut lines = vec![format!("SYSTEM = {}", self.system_label), String::new()];

        for (display, params) in &task_blocks {
            let kept = sorted_lines(params, |k| !custom_keys.contains(k));
            if !kept.is_empty() {
                lines.push(format!("# Task: {display}"));
                lines.extend(kept);
                lines.push(String::new());
            }
        }

        for (section, params) in &sections {
            let kept = sorted_lines(params, |k| !task_keys.contains(k) && !custom_keys.contains(k));
            if !kept.is_empty() {
                lines.push(format!("# Standard Parameters - {}", section_title(section)));
                lines.extend(kept);
                lines.push(String::new());
            }
        }

        if !custom.is_empty() {
            lines.push("# Custom Parameters".to_string());
            lines.extend(sorted_lines(&custom, |_| true));
        }

        let text = lines.join("\n").trim_end().to_string();
        let param_count = task_blocks.iter().map(|(_, p)| p.len()).sum::<usize>()
            + sections.iter().map(|(_, p)| p.len()).sum::<usize>()
            + custom.len();
        (text, param_count)
    }
}

#[async_trait]
impl Renderer for LocalRenderer {
    fn name(&self) -> &str {
        "local"
    }

    async fn render(&self, request: &GenerationRequest) -> Result<RenderResponse, GenerationError> {
        let (text, param_count) = self.render_text(request);
        Ok(RenderResponse::success(text, param_count))
    }
}

fn sorted_lines(params: &ParamMap, keep: impl Fn(&str) -> bool) -> Vec<String> {
    let mut keys: Vec<&String> = params.keys().filter(|k| keep(k)).collect();
    keys.sort();
    keys.into_iter()
        .map(|k| format!("{k} = {}", params[k.as_str()]))
        .collect()
}

/// `d_ionic_relax` -> `Ionic Relax`.
pub fn section_title(section: &str) -> String {
    let words = section.replace("d_", "").replace('_', " ");
    let mut title = String::with_capacity(words.len());
    let mut prev_alpha = false;
    for c in words.chars() {
        if prev_alpha {
            title.extend(c.to_lowercase());
        } else {
            title.extend(c.to_uppercase());
        }
        prev_alpha = c.is_alphabetic();
    }
    title
}
