//! Exporters for finished INCAR text.

use async_trait::async_trait;
use incarforge_core::{ExportError, ExportReceipt, Exporter};
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::backend::BackendClient;

/// Writes the text to a local file.
pub struct FileExporter {
    path: PathBuf,
}

impl FileExporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl Exporter for FileExporter {
    fn name(&self) -> &str {
        "file"
    }

    async fn export(&self, content: &str) -> Result<ExportReceipt, ExportError> {
        if content.is_empty() {
            return Err(ExportError::EmptyContent);
        }
        write_file(&self.path, content.as_bytes()).await
    }
}

/// Posts the text to the backend's download endpoint and saves what it
/// serves.
pub struct DownloadExporter {
    backend: BackendClient,
    path: PathBuf,
}

impl DownloadExporter {
    pub fn new(backend: BackendClient, path: impl Into<PathBuf>) -> Self {
        Self {
            backend,
            path: path.into(),
        }
    }
}

#[async_trait]
impl Exporter for DownloadExporter {
    fn name(&self) -> &str {
        "download"
    }

    async fn export(&self, content: &str) -> Result<ExportReceipt, ExportError> {
        if content.is_empty() {
            return Err(ExportError::EmptyContent);
        }
        let bytes = self.backend.download(content).await?;
        write_file(&self.path, &bytes).await
    }
}

/// Prints the text to stdout.
pub struct StdoutExporter;

#[async_trait]
impl Exporter for StdoutExporter {
    fn name(&self) -> &str {
        "stdout"
    }

    async fn export(&self, content: &str) -> Result<ExportReceipt, ExportError> {
        if content.is_empty() {
            return Err(ExportError::EmptyContent);
        }
        let failed = |e: std::io::Error| ExportError::Failed {
            target: "stdout".into(),
            reason: e.to_string(),
        };
        let mut stdout = tokio::io::stdout();
        stdout.write_all(content.as_bytes()).await.map_err(failed)?;
        stdout.write_all(b"\n").await.map_err(failed)?;
        stdout.flush().await.map_err(failed)?;
        Ok(ExportReceipt {
            target: "stdout".into(),
            bytes: content.len(),
        })
    }
}

async fn write_file(path: &std::path::Path, bytes: &[u8]) -> Result<ExportReceipt, ExportError> {
    let target = path.display().to_string();
    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| ExportError::Failed {
            target: target.clone(),
            reason: e.to_string(),
        })?;
    info!(target = %target, bytes = bytes.len(), "File exported");
    Ok(ExportReceipt {
        target,
        bytes: bytes.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_server::spawn;
    use axum::Json;
    use axum::Router;
    use axum::routing::post;
    use serde_json::Value;
    use std::time::Duration;

    #[tokio::test]
    async fn file_exporter_writes_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("INCAR");
        let receipt = FileExporter::new(&path).export("ENCUT = 450").await.unwrap();
        assert_eq!(receipt.bytes, 11);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "ENCUT = 450");
    }

    #[tokio::test]
    async fn empty_content_rejected_everywhere() {
        let dir = tempfile::tempdir().unwrap();
        let backend = BackendClient::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        let exporters: Vec<Box<dyn Exporter>> = vec![
            Box::new(FileExporter::new(dir.path().join("INCAR"))),
            Box::new(DownloadExporter::new(backend, dir.path().join("INCAR"))),
            Box::new(StdoutExporter),
        ];
        for exporter in exporters {
            assert!(matches!(exporter.export("").await, Err(ExportError::EmptyContent)));
        }
        assert!(!dir.path().join("INCAR").exists());
    }

    #[tokio::test]
    async fn unwritable_path_is_export_failed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("INCAR");
        let err = FileExporter::new(&path).export("NSW = 0").await.unwrap_err();
        assert!(matches!(err, ExportError::Failed { .. }));
    }

    #[tokio::test]
    async fn download_exporter_saves_served_bytes() {
        let router = Router::new().route(
            "/api/download-incar",
            post(|Json(body): Json<Value>| async move { body["content"].as_str().unwrap_or_default().to_uppercase() }),
        );
        let backend = BackendClient::new(spawn(router).await, Duration::from_secs(5)).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("INCAR");

        DownloadExporter::new(backend, &path).export("ismear = 0").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "ISMEAR = 0");
    }
}
