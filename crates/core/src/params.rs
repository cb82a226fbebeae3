//! Ordered parameter maps.
//!
//! A [`ParamMap`] preserves first-insertion order and keeps keys unique:
//! inserting an existing key overwrites its value in place. Merge
//! precedence in the assembler is built on exactly this property.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer};

/// Insertion-ordered, key-unique `key = value` mapping.
pub type ParamMap = IndexMap<String, String>;

/// Merge `source` into `target`, later values winning.
///
/// Returns how many keys already present in `target` were overwritten.
pub fn merge_into(target: &mut ParamMap, source: &ParamMap) -> usize {
    let mut overridden = 0;
    for (key, value) in source {
        if target.insert(key.clone(), value.clone()).is_some() {
            overridden += 1;
        }
    }
    overridden
}

/// Render a JSON scalar the way it should appear on the right-hand side of
/// an INCAR line.
pub fn value_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(true) => ".TRUE.".into(),
        serde_json::Value::Bool(false) => ".FALSE.".into(),
        serde_json::Value::Null => String::new(),
        serde_json::Value::Array(items) => items
            .iter()
            .map(value_to_string)
            .collect::<Vec<_>>()
            .join(" "),
        other => other.to_string(),
    }
}

/// Deserialize a parameter object whose values may be strings, numbers or
/// booleans. Catalog payloads are not consistent about this.
pub fn deserialize_lenient<'de, D>(deserializer: D) -> Result<ParamMap, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: IndexMap<String, serde_json::Value> = IndexMap::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(key, value)| (key, value_to_string(&value)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_keeps_first_position_and_counts_overrides() {
        let mut target = ParamMap::new();
        target.insert("ENCUT".into(), "400".into());
        target.insert("ISMEAR".into(), "0".into());

        let mut source = ParamMap::new();
        source.insert("NSW".into(), "200".into());
        source.insert("ENCUT".into(), "520".into());

        let overridden = merge_into(&mut target, &source);
        assert_eq!(overridden, 1);
        let keys: Vec<_> = target.keys().cloned().collect();
        assert_eq!(keys, vec!["ENCUT", "ISMEAR", "NSW"]);
        assert_eq!(target["ENCUT"], "520");
    }

    #[test]
    fn lenient_values_are_stringified() {
        #[derive(Deserialize)]
        struct Wrapper {
            #[serde(deserialize_with = "deserialize_lenient")]
            params: ParamMap,
        }

        let parsed: Wrapper = serde_json::from_str(
            r#"{"params": {"ISPIN": 2, "LWAVE": false, "SIGMA": 0.05, "GGA": "PE"}}"#,
        )
        .unwrap();
        assert_eq!(parsed.params["ISPIN"], "2");
        assert_eq!(parsed.params["LWAVE"], ".FALSE.");
        assert_eq!(parsed.params["SIGMA"], "0.05");
        assert_eq!(parsed.params["GGA"], "PE");
        let keys: Vec<_> = parsed.params.keys().cloned().collect();
        assert_eq!(keys, vec!["ISPIN", "LWAVE", "SIGMA", "GGA"]);
    }
}
