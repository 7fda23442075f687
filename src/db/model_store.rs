use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::AppResult;

/// Durable home of the serialized model artifact
///
/// A store holds exactly one artifact at a fixed location. The bytes are
/// opaque here; encoding lives in the model cache.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ModelStore: Send + Sync {
    /// Reads the artifact, `None` when nothing is stored
    async fn read(&self) -> AppResult<Option<Vec<u8>>>;

    /// Replaces the artifact atomically
    async fn write(&self, bytes: &[u8]) -> AppResult<()>;

    /// Removes the artifact; a missing artifact is not an error
    async fn delete(&self) -> AppResult<()>;

    /// Store name for logging
    fn name(&self) -> &'static str;
}

/// Artifact kept in a single file on local disk
pub struct FileModelStore {
    path: PathBuf,
}

impl FileModelStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "model".to_string());
        self.path
            .with_file_name(format!(".{}.{}.tmp", file_name, Uuid::new_v4()))
    }
}

#[async_trait::async_trait]
impl ModelStore for FileModelStore {
    async fn read(&self) -> AppResult<Option<Vec<u8>>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, bytes: &[u8]) -> AppResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write beside the target and rename so readers never see a partial file
        let temp = self.temp_path();
        tokio::fs::write(&temp, bytes).await?;
        if let Err(e) = tokio::fs::rename(&temp, &self.path).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e.into());
        }

        tracing::debug!(path = %self.path.display(), bytes = bytes.len(), "Model artifact written");
        Ok(())
    }

    async fn delete(&self) -> AppResult<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

/// Process-local store, used by tests and the `memory` backend
#[derive(Default)]
pub struct MemoryModelStore {
    artifact: RwLock<Option<Vec<u8>>>,
}

impl MemoryModelStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ModelStore for MemoryModelStore {
    async fn read(&self) -> AppResult<Option<Vec<u8>>> {
        Ok(self.artifact.read().await.clone())
    }

    async fn write(&self, bytes: &[u8]) -> AppResult<()> {
        *self.artifact.write().await = Some(bytes.to_vec());
        Ok(())
    }

    async fn delete(&self) -> AppResult<()> {
        *self.artifact.write().await = None;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
