use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use uuid::Uuid;

use super::naming::validate_blob_name;
use super::{join_blob_url, BlobItem, BlobStore, StorageError, StorageResult};

// Uploads land here first and are renamed into their container when complete.
// Container names never start with '.', so this cannot collide with one.
const STAGING_DIR: &str = ".staging";

/// Blob storage on the local filesystem: `<root>/<container>/<blob name>`.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
    public_url: String,
}

impl LocalBlobStore {
    pub async fn open(root: impl Into<PathBuf>, public_url: &str) -> StorageResult<Self> {
        let root = root.into();
        fs::create_dir_all(root.join(STAGING_DIR)).await?;
        Ok(Self { root, public_url: public_url.to_string() })
    }

    fn container_dir(&self, container: &str) -> PathBuf {
        self.root.join(container)
    }

    async fn require_container(&self, container: &str) -> StorageResult<PathBuf> {
        let dir = self.container_dir(container);
        match fs::metadata(&dir).await {
            Ok(meta) if meta.is_dir() => Ok(dir),
            Ok(_) => Err(StorageError::not_found("container", container)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::not_found("container", container))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn create_container_if_not_exists(&self, container: &str) -> StorageResult<()> {
        fs::create_dir_all(self.container_dir(container)).await?;
        Ok(())
    }

    async fn upload(&self, container: &str, name: &str, data: &[u8], overwrite: bool) -> StorageResult<BlobItem> {
        validate_blob_name(name)?;
        let dir = self.require_container(container).await?;
        let target = dir.join(name);
        if !overwrite && fs::try_exists(&target).await? {
            return Err(StorageError::conflict("blob", format!("{}/{}", container, name)));
        }

        let staged = self.root.join(STAGING_DIR).join(format!("{}.partial", Uuid::new_v4()));
        if let Err(e) = fs::write(&staged, data).await {
            let _ = fs::remove_file(&staged).await;
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&staged, &target).await {
            let _ = fs::remove_file(&staged).await;
            return Err(e.into());
        }
        tracing::debug!("Stored blob {}/{} ({} bytes)", container, name, data.len());

        Ok(BlobItem { name: name.to_string(), url: self.blob_url(container, name), size: data.len() as u64 })
    }

    async fn list_blobs(&self, container: &str) -> StorageResult<Vec<BlobItem>> {
        let dir = self.require_container(container).await?;
        let mut entries = fs::read_dir(&dir).await?;
        let mut items = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let meta = entry.metadata().await?;
            if !meta.is_file() {
                continue;
            }
            // Skip names written outside the store that could not be uploaded or served
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            items.push(BlobItem { url: self.blob_url(container, &name), name, size: meta.len() });
        }
        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(items)
    }

    fn blob_url(&self, container: &str, name: &str) -> String {
        join_blob_url(&self.public_url, container, name)
    }

    fn local_root(&self) -> Option<&Path> {
        Some(&self.root)
    }
}
