use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use claimdesk_core::{ClaimError, ReceiptStorage, storage_error};
use tracing::warn;
use uuid::Uuid;

/// Receipt files stored flat under one directory as `<image-id>.<ext>`.
#[derive(Clone, Debug)]
pub struct DiskReceiptStorage {
    root: PathBuf,
}

impl DiskReceiptStorage {
    /// Creates the directory if it does not exist yet.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .with_context(|| format!("failed to create upload directory {}", root.display()))?;

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reads a stored receipt back. `None` for unknown or malformed names.
    pub async fn read(&self, storage_path: &str) -> Result<Option<Vec<u8>>, ClaimError> {
        let Some(path) = self.resolve(storage_path) else {
            return Ok(None);
        };

        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(storage_error(err)),
        }
    }

    fn resolve(&self, storage_path: &str) -> Option<PathBuf> {
        let plain = !storage_path.is_empty()
            && !storage_path.starts_with('.')
            && !storage_path.contains(['/', '\\']);
        plain.then(|| self.root.join(storage_path))
    }
}

#[async_trait]
impl ReceiptStorage for DiskReceiptStorage {
    async fn put(
        &self,
        image_id: Uuid,
        extension: &str,
        bytes: &[u8],
    ) -> Result<String, ClaimError> {
        let file_name = format!("{image_id}.{extension}");
        tokio::fs::write(self.root.join(&file_name), bytes)
            .await
            .map_err(storage_error)?;

        Ok(file_name)
    }

    async fn remove(&self, storage_path: &str) -> Result<(), ClaimError> {
        let Some(path) = self.resolve(storage_path) else {
            warn!(storage_path, "refusing to remove receipt outside upload directory");
            return Ok(());
        };

        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                warn!(storage_path, "receipt file already missing");
                Ok(())
            }
            Err(err) => Err(storage_error(err)),
        }
    }
}
