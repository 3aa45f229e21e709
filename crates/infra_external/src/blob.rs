//! Filesystem evidence store
//!
//! Blob paths are relative keys such as `evidence/<case_id>/pt_notes.pdf`,
//! resolved against a configured root directory. Keys that would escape the
//! root are rejected.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, instrument};

use core_kernel::{AdapterHealth, DomainPort, HealthCheckResult, HealthCheckable, PortError};
use domain_authorization::BlobStore;

use crate::config::BlobStoreConfig;

const ADAPTER_ID: &str = "fs-blob-store";

/// Blob store backed by a directory tree
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(config: BlobStoreConfig) -> Self {
        Self {
            root: PathBuf::from(config.root),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a key to a path under the root
    fn resolve(&self, key: &str) -> Result<PathBuf, PortError> {
        let relative = Path::new(key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if key.is_empty() || escapes {
            return Err(PortError::Validation {
                message: format!("invalid blob key '{key}'"),
                field: Some("path".to_string()),
            });
        }
        Ok(self.root.join(relative))
    }
}

impl DomainPort for FsBlobStore {}

#[async_trait]
impl HealthCheckable for FsBlobStore {
    async fn health_check(&self) -> HealthCheckResult {
        let start = std::time::Instant::now();
        let result = tokio::fs::metadata(&self.root).await;
        let latency_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(meta) if meta.is_dir() => HealthCheckResult::new(ADAPTER_ID, AdapterHealth::Healthy, latency_ms),
            Ok(_) => HealthCheckResult::new(ADAPTER_ID, AdapterHealth::Unhealthy, latency_ms)
                .with_message(format!("{} is not a directory", self.root.display())),
            Err(e) => HealthCheckResult::new(ADAPTER_ID, AdapterHealth::Unhealthy, latency_ms)
                .with_message(format!("{}: {}", self.root.display(), e)),
        }
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    #[instrument(skip(self))]
    async fn exists(&self, path: &str) -> Result<bool, PortError> {
        let full = self.resolve(path)?;
        let found = tokio::fs::try_exists(&full).await.map_err(|e| PortError::Connection {
            message: format!("failed to probe {}", full.display()),
            source: Some(Box::new(e)),
        })?;
        debug!(found, "Blob probe");
        Ok(found)
    }
}
