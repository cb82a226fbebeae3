//! Derivation calculators served by the backend.
//!
//! Every calculator is a bodiless `POST` answering
//! `{ success: true, <KEY>: value, ... }` or `{ success: false, error }`.
//! Both a `success: false` body and a non-200 status mean the value is
//! unavailable.

use async_trait::async_trait;
use incarforge_core::params::value_to_string;
use incarforge_core::{Calculator, CalculatorError, CalculatorKind, ParamMap};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::backend::BackendClient;

pub struct HttpCalculator {
    kind: CalculatorKind,
    backend: BackendClient,
}

impl HttpCalculator {
    pub fn new(kind: CalculatorKind, backend: BackendClient) -> Self {
        Self { kind, backend }
    }

    /// One calculator of every kind, sharing `backend`.
    pub fn all(backend: &BackendClient) -> Vec<Arc<dyn Calculator>> {
        CalculatorKind::ALL
            .iter()
            .map(|kind| Arc::new(Self::new(*kind, backend.clone())) as Arc<dyn Calculator>)
            .collect()
    }

    pub fn endpoint(kind: CalculatorKind) -> &'static str {
        match kind {
            CalculatorKind::DftU => "/api/calculate-dftu",
            CalculatorKind::Magmom => "/api/calculate-magmom",
            CalculatorKind::NebImages => "/api/calculate-neb-images",
        }
    }

    fn unavailable(&self, reason: impl Into<String>) -> CalculatorError {
        CalculatorError::Unavailable {
            calculator: self.kind.to_string(),
            reason: reason.into(),
        }
    }

    /// Pull the expected output keys out of a success body.
    fn extract(&self, body: &Map<String, Value>) -> Result<ParamMap, CalculatorError> {
        let mut params = ParamMap::new();
        for key in self.kind.output_keys() {
            let value = body
                .get(*key)
                .ok_or_else(|| self.unavailable(format!("response is missing {key}")))?;
            params.insert(key.to_string(), value_to_string(value));
        }
        Ok(params)
    }
}

#[async_trait]
impl Calculator for HttpCalculator {
    fn kind(&self) -> CalculatorKind {
        self.kind
    }

    async fn calculate(&self) -> Result<ParamMap, CalculatorError> {
        let url = self.backend.url(Self::endpoint(self.kind));
        debug!(calculator = %self.kind, url = %url, "Calling calculator");

        let response = self
            .backend
            .http()
            .post(&url)
            .send()
            .await
            .map_err(|e| CalculatorError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let body: Value = response
            .json()
            .await
            .map_err(|e| self.unavailable(format!("unreadable response (status: {status}): {e}")))?;
        let Value::Object(body) = body else {
            return Err(self.unavailable(format!("unexpected response (status: {status})")));
        };

        let success = body.get("success").and_then(Value::as_bool).unwrap_or(false);
        if status != 200 || !success {
            let reason = body
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("calculator reported failure")
                .to_string();
            warn!(calculator = %self.kind, status, reason = %reason, "Calculator failed");
            return Err(self.unavailable(reason));
        }

        self.extract(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_server::spawn;
    use axum::Json;
    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::post;
    use serde_json::json;
    use std::time::Duration;

    async fn backend() -> BackendClient {
        let router = Router::new()
            .route(
                "/api/calculate-dftu",
                post(|| async {
                    Json(json!({"success": true, "LDAUL": "2  -1", "LDAUU": "5.3  0", "LDAUJ": "0  0"}))
                }),
            )
            .route(
                "/api/calculate-magmom",
                post(|| async {
                    (
                        StatusCode::NOT_FOUND,
                        Json(json!({"success": false, "error": "POSCAR file not found"})),
                    )
                }),
            )
            .route(
                "/api/calculate-neb-images",
                post(|| async {
                    Json(json!({"success": false, "error": "No image folders found (00, 01, 02...)"}))
                }),
            );
        BackendClient::new(spawn(router).await, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn dftu_success_extracts_three_keys() {
        let calc = HttpCalculator::new(CalculatorKind::DftU, backend().await);
        let params = calc.calculate().await.unwrap();
        let keys: Vec<_> = params.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["LDAUL", "LDAUU", "LDAUJ"]);
        assert_eq!(params["LDAUU"], "5.3  0");
    }

    #[tokio::test]
    async fn http_error_is_unavailable() {
        let calc = HttpCalculator::new(CalculatorKind::Magmom, backend().await);
        let err = calc.calculate().await.unwrap_err();
        assert_eq!(
            err,
            CalculatorError::Unavailable {
                calculator: "magmom".into(),
                reason: "POSCAR file not found".into(),
            }
        );
    }

    #[tokio::test]
    async fn success_false_with_200_is_unavailable() {
        let calc = HttpCalculator::new(CalculatorKind::NebImages, backend().await);
        let err = calc.calculate().await.unwrap_err();
        assert!(err.to_string().contains("No image folders"));
    }

    #[test]
    fn all_covers_every_kind() {
        let backend = BackendClient::new("http://localhost:5001", Duration::from_secs(1)).unwrap();
        let kinds: Vec<_> = HttpCalculator::all(&backend).iter().map(|c| c.kind()).collect();
        assert_eq!(kinds, CalculatorKind::ALL.to_vec());
    }
}
