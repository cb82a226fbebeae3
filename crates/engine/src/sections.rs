//! Standard section toggles and free-form custom overrides.

use incarforge_core::{CatalogSnapshot, ParamMap, SelectionError};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A user-entered override. Duplicate keys are allowed here; the last one
/// wins at assembly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomParam {
    pub key: String,
    pub value: String,
}

impl CustomParam {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Trimmed `(key, value)`, or `None` when either side is blank.
    pub fn normalized(&self) -> Option<(String, String)> {
        let key = self.key.trim();
        let value = self.value.trim();
        if key.is_empty() || value.is_empty() {
            None
        } else {
            Some((key.to_string(), value.to_string()))
        }
    }
}

/// Enabled flags for every toggleable standard section plus the custom
/// override list.
#[derive(Debug, Clone, Default)]
pub struct SectionToggleStore {
    reserved: String,
    flags: IndexMap<String, bool>,
    custom: Vec<CustomParam>,
}

impl SectionToggleStore {
    /// One flag per catalog section except `reserved`, in catalog order.
    pub fn new(catalog: &CatalogSnapshot, reserved: impl Into<String>, enabled: bool) -> Self {
        let reserved = reserved.into();
        let flags = catalog
            .sections()
            .keys()
            .filter(|k| **k != reserved)
            .map(|k| (k.clone(), enabled))
            .collect();
        Self {
            reserved,
            flags,
            custom: Vec::new(),
        }
    }

    pub fn reserved(&self) -> &str {
        &self.reserved
    }

    pub fn set_enabled(&mut self, section: &str, enabled: bool) -> Result<(), SelectionError> {
        if section == self.reserved {
            return Err(SelectionError::ReservedSection(section.to_string()));
        }
        match self.flags.get_mut(section) {
            Some(flag) => {
                *flag = enabled;
                tracing::debug!(section = %section, enabled, "Section toggled");
                Ok(())
            }
            None => Err(SelectionError::UnknownSection(section.to_string())),
        }
    }

    /// Flip a section and return its new state.
    pub fn toggle(&mut self, section: &str) -> Result<bool, SelectionError> {
        let next = !self.is_enabled(section);
        self.set_enabled(section, next)?;
        Ok(next)
    }

    pub fn is_enabled(&self, section: &str) -> bool {
        self.flags.get(section).copied().unwrap_or(false)
    }

    /// Enabled section keys in catalog order.
    pub fn enabled(&self) -> impl Iterator<Item = &str> {
        self.flags
            .iter()
            .filter(|(_, on)| **on)
            .map(|(k, _)| k.as_str())
    }

    /// The include flag for every toggleable section.
    pub fn flags(&self) -> &IndexMap<String, bool> {
        &self.flags
    }

    pub fn set_all(&mut self, enabled: bool) {
        for flag in self.flags.values_mut() {
            *flag = enabled;
        }
    }

    pub fn add_custom(&mut self, param: CustomParam) -> usize {
        self.custom.push(param);
        self.custom.len() - 1
    }

    pub fn update_custom(&mut self, index: usize, param: CustomParam) -> Result<(), SelectionError> {
        let slot = self
            .custom
            .get_mut(index)
            .ok_or(SelectionError::NoSuchCustomParam(index))?;
        *slot = param;
        Ok(())
    }

    pub fn remove_custom(&mut self, index: usize) -> Result<CustomParam, SelectionError> {
        if index >= self.custom.len() {
            return Err(SelectionError::NoSuchCustomParam(index));
        }
        Ok(self.custom.remove(index))
    }

    /// Remove every entry with `key` (trimmed comparison). Returns how many
    /// were removed.
    pub fn remove_custom_key(&mut self, key: &str) -> usize {
        let before = self.custom.len();
        self.custom.retain(|p| p.key.trim() != key.trim());
        before - self.custom.len()
    }

    pub fn custom(&self) -> &[CustomParam] {
        &self.custom
    }

    pub fn clear_custom(&mut self) {
        self.custom.clear();
    }

    /// Custom overrides as a map: blanks skipped, last duplicate wins,
    /// first-occurrence position kept.
    pub fn custom_map(&self) -> ParamMap {
        let mut map = ParamMap::new();
        for (key, value) in self.custom.iter().filter_map(CustomParam::normalized) {
            map.insert(key, value);
        }
        map
    }
}
