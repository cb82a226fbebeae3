//! HTTP client for the INCAR backend's JSON API.
//!
//! Endpoints:
//! - `GET  /api/task-categories` → `{ categories: [...] }`
//! - `GET  /api/standard-params` → `{ standard: {...} }`
//! - `POST /api/task-params`     `{ task }` → `{ params }` or 400 `{ error }`
//! - `POST /api/generate-incar`  request → `{ incar_content, param_count }` or `{ error }`
//! - `POST /api/download-incar`  `{ content }` → file bytes
//! - `GET  /health`              → `{ status }`

use async_trait::async_trait;
use incarforge_config::BackendConfig;
use incarforge_core::catalog::deserialize_sections;
use incarforge_core::params::deserialize_lenient;
use incarforge_core::{
    Catalog, CatalogError, CategoryEntry, Error, ExportError, GenerationError, GenerationRequest,
    ParamMap, RenderResponse, Renderer, StandardSections,
};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// A cheaply clonable handle to the backend.
#[derive(Debug, Clone)]
pub struct BackendClient {
    base_url: String,
    client: reqwest::Client,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config {
                message: format!("Failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self, Error> {
        Self::new(&config.base_url, Duration::from_secs(config.timeout_secs))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.client
    }

    /// `GET /health`; returns the reported status string.
    pub async fn health(&self) -> Result<String, CatalogError> {
        #[derive(Deserialize)]
        struct Health {
            status: String,
        }

        let response = self
            .client
            .get(self.url("/health"))
            .send()
            .await
            .map_err(|e| CatalogError::Network(e.to_string()))?;
        let health: Health = read_json(response).await?;
        Ok(health.status)
    }

    /// `POST /api/download-incar`; returns the served file bytes.
    pub async fn download(&self, content: &str) -> Result<Vec<u8>, ExportError> {
        let target = self.url("/api/download-incar");
        let failed = |reason: String| ExportError::Failed {
            target: target.clone(),
            reason,
        };

        let response = self
            .client
            .post(&target)
            .json(&serde_json::json!({ "content": content }))
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            let message = error_message(response).await;
            warn!(status, error = %message, "Download request rejected");
            return Err(failed(format!("{message} (status: {status})")));
        }

        let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

#[derive(Deserialize)]
struct CategoriesBody {
    categories: Vec<CategoryEntry>,
}

#[derive(Deserialize)]
struct StandardBody {
    #[serde(deserialize_with = "deserialize_sections")]
    standard: StandardSections,
}

#[derive(Deserialize)]
struct TaskParamsBody {
    #[serde(default, deserialize_with = "deserialize_lenient")]
    params: ParamMap,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Best-effort error text from a non-success response.
pub(crate) async fn error_message(response: reqwest::Response) -> String {
    let body = response.text().await.unwrap_or_default();
    serde_json::from_str::<ErrorBody>(&body)
        .map(|b| b.error)
        .unwrap_or(body)
}

/// Decode a 200 response or map the status to [`CatalogError::Api`].
async fn read_json<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T, CatalogError> {
    let status = response.status().as_u16();
    if status != 200 {
        let message = error_message(response).await;
        warn!(status, error = %message, "Backend returned error");
        return Err(CatalogError::Api {
            status_code: status,
            message,
        });
    }
    response
        .json()
        .await
        .map_err(|e| CatalogError::InvalidPayload(e.to_string()))
}

#[async_trait]
impl Catalog for BackendClient {
    fn name(&self) -> &str {
        "http"
    }

    async fn categories(&self) -> Result<Vec<CategoryEntry>, CatalogError> {
        debug!(url = %self.base_url, "Fetching task categories");
        let response = self
            .client
            .get(self.url("/api/task-categories"))
            .send()
            .await
            .map_err(|e| CatalogError::Network(e.to_string()))?;
        let body: CategoriesBody = read_json(response).await?;
        Ok(body.categories)
    }

    async fn standard_sections(&self) -> Result<StandardSections, CatalogError> {
        debug!(url = %self.base_url, "Fetching standard parameters");
        let response = self
            .client
            .get(self.url("/api/standard-params"))
            .send()
            .await
            .map_err(|e| CatalogError::Network(e.to_string()))?;
        let body: StandardBody = read_json(response).await?;
        Ok(body.standard)
    }

    async fn task_params(&self, task: &str) -> Result<ParamMap, CatalogError> {
        let response = self
            .client
            .post(self.url("/api/task-params"))
            .json(&serde_json::json!({ "task": task }))
            .send()
            .await
            .map_err(|e| CatalogError::Network(e.to_string()))?;

        // The backend answers 400 only for task names it does not know.
        if response.status().as_u16() == 400 {
            let message = error_message(response).await;
            debug!(task = %task, error = %message, "Backend does not know task");
            return Err(CatalogError::UnknownTask(task.to_string()));
        }

        let body: TaskParamsBody = read_json(response).await?;
        Ok(body.params)
    }
}

#[async_trait]
impl Renderer for BackendClient {
    fn name(&self) -> &str {
        "http"
    }

    async fn render(&self, request: &GenerationRequest) -> Result<RenderResponse, GenerationError> {
        let response = self
            .client
            .post(self.url("/api/generate-incar"))
            .json(request)
            .send()
            .await
            .map_err(|e| GenerationError::Failed { cause: e.to_string() })?;

        let status = response.status().as_u16();
        if status != 200 {
            let message = error_message(response).await;
            warn!(status, error = %message, "Renderer returned error");
            return Err(GenerationError::Failed {
                cause: format!("{message} (status: {status})"),
            });
        }

        response
            .json::<RenderResponse>()
            .await
            .map_err(|e| GenerationError::Failed {
                cause: format!("Failed to parse response: {e}"),
            })
    }
}
