//! Exporter trait: delivers finished file text (download, file, stdout).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ExportError;

/// What an export produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportReceipt {
    /// Human-readable destination (a path, "stdout", ...).
    pub target: String,
    /// Bytes written.
    pub bytes: usize,
}

#[async_trait]
pub trait Exporter: Send + Sync {
    fn name(&self) -> &str;

    /// Deliver `content`. Implementations reject empty content with
    /// [`ExportError::EmptyContent`].
    async fn export(&self, content: &str) -> Result<ExportReceipt, ExportError>;
}
