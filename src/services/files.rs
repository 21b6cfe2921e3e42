//! Local-disk storage for uploaded image bytes.
//!
//! The record store tracks metadata; the bytes live here under the configured
//! data directory. Deleting a record must release its file through this
//! collaborator.

use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Blob store rooted at the data directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the backing directory if missing.
    pub async fn init(&self) -> AppResult<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to create data directory: {}", e)))?;
        Ok(())
    }

    /// Resolve a storage-relative name, rejecting anything that could escape
    /// the root. Storage names are server-generated, so a violation here is a
    /// bug, not user error.
    fn resolve(&self, name: &str) -> AppResult<PathBuf> {
        let candidate = Path::new(name);
        let escapes = candidate.is_absolute()
            || candidate
                .components()
                .any(|c| !matches!(c, std::path::Component::Normal(_)));
        if name.is_empty() || escapes {
            return Err(AppError::Storage(format!(
                "Refusing storage name '{}'",
                name
            )));
        }
        Ok(self.root.join(candidate))
    }

    /// Write image bytes under the given storage name.
    pub async fn save(&self, name: &str, bytes: &[u8]) -> AppResult<()> {
        let path = self.resolve(name)?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to write {}: {}", name, e)))?;
        Ok(())
    }

    /// Read image bytes back for analysis.
    pub async fn read(&self, name: &str) -> AppResult<Vec<u8>> {
        let path = self.resolve(name)?;
        tokio::fs::read(&path)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to read {}: {}", name, e)))
    }

    /// Unlink the stored bytes. Missing files are treated as already released.
    pub async fn remove(&self, name: &str) -> AppResult<()> {
        let path = self.resolve(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Storage(format!(
                "Failed to remove {}: {}",
                name, e
            ))),
        }
    }
}
