//! Renderer trait: the external collaborator that turns a generation
//! request into INCAR text.
//!
//! The wire contract is fixed: the renderer only understands selected
//! tasks, per-section include flags and custom overrides.

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::GenerationError;
use crate::params::ParamMap;

/// Request body for the renderer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Selected task keys, oldest selection first.
    pub tasks: Vec<String>,

    /// Include flag for every toggleable standard section.
    pub include_sections: IndexMap<String, bool>,

    /// Custom overrides, derived parameters already folded in.
    pub custom_params: ParamMap,
}

/// Renderer response. Success carries `incar_content` and `param_count`;
/// failure carries `error`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenderResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incar_content: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub param_count: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RenderResponse {
    pub fn success(content: impl Into<String>, param_count: usize) -> Self {
        Self {
            incar_content: Some(content.into()),
            param_count: Some(param_count),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            incar_content: None,
            param_count: None,
            error: Some(error.into()),
        }
    }
}

/// The file renderer.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// A short name for logs.
    fn name(&self) -> &str;

    /// Render the request. Transport failures are reported as
    /// [`GenerationError::Failed`].
    async fn render(&self, request: &GenerationRequest) -> Result<RenderResponse, GenerationError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_wire_field_names() {
        let mut request = GenerationRequest {
            tasks: vec!["PBE".into(), "Opt".into()],
            ..Default::default()
        };
        request.include_sections.insert("d_electronic".into(), true);
        request.custom_params.insert("ENCUT".into(), "520".into());

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["tasks"][1], "Opt");
        assert_eq!(json["include_sections"]["d_electronic"], true);
        assert_eq!(json["custom_params"]["ENCUT"], "520");
    }

    #[test]
    fn response_tolerates_extra_fields() {
        let parsed: RenderResponse = serde_json::from_str(
            r#"{"incar_content": "SYSTEM = x", "param_count": 4, "params": {"A": 1}}"#,
        )
        .unwrap();
        assert_eq!(parsed.incar_content.as_deref(), Some("SYSTEM = x"));
        assert_eq!(parsed.param_count, Some(4));
        assert!(parsed.error.is_none());
    }
}
