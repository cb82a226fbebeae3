//! Generation protocol: request building and response interpretation.

use incarforge_core::params::merge_into;
use incarforge_core::{GenerationError, GenerationRequest, ParamMap, RenderResponse, Renderer};
use indexmap::IndexMap;
use serde::Serialize;
use tracing::{info, warn};

/// A successfully rendered file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationOutcome {
    pub text: String,
    pub param_count: usize,
    /// Computed locally from `text`, never taken from the renderer.
    pub line_count: usize,
}

impl GenerationOutcome {
    pub fn from_text(text: String, param_count: usize) -> Self {
        let line_count = count_lines(&text);
        Self {
            text,
            param_count,
            line_count,
        }
    }
}

/// Number of `\n`-separated segments. Empty text counts as one line.
pub fn count_lines(text: &str) -> usize {
    text.split('\n').count()
}

/// Build the renderer request.
///
/// The renderer only understands tasks, section flags and overrides, so
/// derived values are folded into `custom_params` first and the user's
/// custom overrides are layered on top of them.
pub fn build_request(
    tasks: Vec<String>,
    include_sections: IndexMap<String, bool>,
    derived: &[(&str, &ParamMap)],
    custom: &ParamMap,
) -> GenerationRequest {
    let mut custom_params = ParamMap::new();
    for (_, params) in derived {
        merge_into(&mut custom_params, params);
    }
    merge_into(&mut custom_params, custom);

    GenerationRequest {
        tasks,
        include_sections,
        custom_params,
    }
}

/// Send `request` to `renderer` and interpret the response.
pub async fn generate(
    renderer: &dyn Renderer,
    request: &GenerationRequest,
) -> Result<GenerationOutcome, GenerationError> {
    info!(
        renderer = renderer.name(),
        tasks = request.tasks.len(),
        custom = request.custom_params.len(),
        "Generation requested"
    );

    let response = renderer.render(request).await.inspect_err(|e| {
        warn!(renderer = renderer.name(), error = %e, "Renderer call failed");
    })?;

    interpret(response)
}

/// Map a renderer response to an outcome.
pub fn interpret(response: RenderResponse) -> Result<GenerationOutcome, GenerationError> {
    if let Some(error) = response.error {
        warn!(error = %error, "Renderer reported an error");
        return Err(GenerationError::Failed { cause: error });
    }

    let text = match response.incar_content {
        Some(text) if !text.is_empty() => text,
        _ => {
            warn!("Renderer returned no content");
            return Err(GenerationError::EmptyResult);
        }
    };

    let outcome = GenerationOutcome::from_text(text, response.param_count.unwrap_or(0));
    info!(
        params = outcome.param_count,
        lines = outcome.line_count,
        "File generated"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replays a fixed response and records the last request.
    struct ScriptedRenderer {
        response: Result<RenderResponse, GenerationError>,
        seen: Mutex<Option<GenerationRequest>>,
    }

    impl ScriptedRenderer {
        fn new(response: Result<RenderResponse, GenerationError>) -> Self {
            Self {
                response,
                seen: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl Renderer for ScriptedRenderer {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn render(&self, request: &GenerationRequest) -> Result<RenderResponse, GenerationError> {
            *self.seen.lock().unwrap() = Some(request.clone());
            self.response.clone()
        }
    }

    fn map(pairs: &[(&str, &str)]) -> ParamMap {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn custom_overrides_beat_derived_values() {
        let derived = map(&[("MAGMOM", "2*5.0"), ("ISPIN", "2")]);
        let custom = map(&[("MAGMOM", "4*1.0")]);
        let request = build_request(vec!["ISPIN".into()], IndexMap::new(), &[("ISPIN", &derived)], &custom);

        assert_eq!(request.custom_params["MAGMOM"], "4*1.0");
        assert_eq!(request.custom_params["ISPIN"], "2");
    }

    #[tokio::test]
    async fn success_counts_lines_locally() {
        let renderer = ScriptedRenderer::new(Ok(RenderResponse {
            incar_content: Some("SYSTEM = x\n\nENCUT = 450".into()),
            param_count: Some(99),
            error: None,
        }));
        let outcome = generate(&renderer, &GenerationRequest::default()).await.unwrap();
        assert_eq!(outcome.line_count, 3);
        assert_eq!(outcome.param_count, 99);
    }

    #[tokio::test]
    async fn error_body_is_generation_failed() {
        let renderer = ScriptedRenderer::new(Ok(RenderResponse::failure("boom")));
        let err = generate(&renderer, &GenerationRequest::default()).await.unwrap_err();
        assert_eq!(err, GenerationError::Failed { cause: "boom".into() });
    }

    #[tokio::test]
    async fn missing_content_is_empty_result() {
        let renderer = ScriptedRenderer::new(Ok(RenderResponse::default()));
        let err = generate(&renderer, &GenerationRequest::default()).await.unwrap_err();
        assert_eq!(err, GenerationError::EmptyResult);
    }

    #[tokio::test]
    async fn transport_failure_passes_through() {
        let renderer = ScriptedRenderer::new(Err(GenerationError::Failed {
            cause: "connection refused".into(),
        }));
        let err = generate(&renderer, &GenerationRequest::default()).await.unwrap_err();
        assert!(err.to_string().contains("connection refused"));
    }

    #[tokio::test]
    async fn request_reaches_renderer_unchanged() {
        let renderer = ScriptedRenderer::new(Ok(RenderResponse::success("SYSTEM = x", 1)));
        let mut flags = IndexMap::new();
        flags.insert("d_electronic".to_string(), false);
        let request = build_request(vec!["PBE".into()], flags, &[], &ParamMap::new());

        generate(&renderer, &request).await.unwrap();
        let seen = renderer.seen.lock().unwrap().clone().unwrap();
        assert_eq!(seen, request);
    }

    #[test]
    fn missing_param_count_defaults_to_zero() {
        let outcome = interpret(RenderResponse {
            incar_content: Some("SYSTEM = x".into()),
            param_count: None,
            error: None,
        })
        .unwrap();
        assert_eq!(outcome.param_count, 0);
        assert_eq!(outcome.line_count, 1);
    }
}
