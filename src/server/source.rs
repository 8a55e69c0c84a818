//! [`PerformanceSource`] implementations used by the binary.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;

use crate::coach::{ErrorDetail, PerformanceSnapshot};
use crate::error::ServerError;
use crate::traits::PerformanceSource;

/// Fixed statistics, or none at all.
#[derive(Debug, Clone, Default)]
pub struct StaticPerformanceSource {
    snapshot: PerformanceSnapshot,
    errors: Option<ErrorDetail>,
}

impl StaticPerformanceSource {
    /// Source that always returns `snapshot` and `errors`.
    #[must_use]
    pub const fn new(snapshot: PerformanceSnapshot, errors: Option<ErrorDetail>) -> Self {
        Self { snapshot, errors }
    }
}

#[async_trait]
impl PerformanceSource for StaticPerformanceSource {
    async fn performance_snapshot(&self) -> Result<PerformanceSnapshot, ServerError> {
        Ok(self.snapshot.clone())
    }

    async fn last_session_errors(&self) -> Result<Option<ErrorDetail>, ServerError> {
        Ok(self.errors.clone())
    }
}

/// Document written by the metrics engine.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SnapshotDocument {
    performance: PerformanceSnapshot,
    last_session_errors: Option<ErrorDetail>,
}

/// Reads statistics from a JSON document on every request, so updates by
/// the metrics engine are picked up without a restart.
///
/// Expected shape:
///
/// ```json
/// {"performance": {"session_count": 5, "average_wpm": 45, "average_accuracy": 92},
///  "last_session_errors": {"key_errors": {"q": 4}, "mismatches": []}}
/// ```
///
/// A missing file means no sessions yet.
#[derive(Debug, Clone)]
pub struct SnapshotFileSource {
    path: PathBuf,
}

impl SnapshotFileSource {
    /// Source reading `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The document path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<SnapshotDocument, ServerError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "Snapshot file missing, assuming no sessions");
                return Ok(SnapshotDocument::default());
            }
            Err(e) => return Err(self.error(e)),
        };
        serde_json::from_slice(&bytes).map_err(|e| self.error(e))
    }

    fn error(&self, e: impl std::fmt::Display) -> ServerError {
        ServerError::Snapshot {
            path: self.path.display().to_string(),
            message: e.to_string(),
        }
    }
}

#[async_trait]
impl PerformanceSource for SnapshotFileSource {
    async fn performance_snapshot(&self) -> Result<PerformanceSnapshot, ServerError> {
        Ok(self.load().await?.performance)
    }

    async fn last_session_errors(&self) -> Result<Option<ErrorDetail>, ServerError> {
        Ok(self.load().await?.last_session_errors)
    }
}
