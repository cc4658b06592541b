use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use hypeup_core::{HypeError, Result, StoreResultExt};
use tokio::fs;
use tracing::debug;

use crate::domain::repository::BlobStore;

/// 本地文件系统图片存储
#[derive(Clone)]
pub struct FilesystemBlobStore {
    root: PathBuf,
    base_url: Option<String>,
}

impl FilesystemBlobStore {
    pub fn new(root: impl AsRef<Path>, base_url: Option<String>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root).store_context("blob_init")?;
        Ok(Self { root, base_url })
    }

    fn object_path(&self, object_name: &str) -> Result<PathBuf> {
        let relative = Path::new(object_name);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if object_name.is_empty() || !safe {
            return Err(HypeError::invalid_argument(format!(
                "invalid object name '{}'",
                object_name
            )));
        }
        Ok(self.root.join(relative))
    }

    fn public_url(&self, object_name: &str) -> String {
        match &self.base_url {
            Some(base) => format!("{}/{}", base.trim_end_matches('/'), object_name),
            None => format!("/{}", object_name),
        }
    }
}

#[async_trait]
impl BlobStore for FilesystemBlobStore {
    async fn put(&self, object_name: &str, payload: &[u8], content_type: &str) -> Result<String> {
        let path = self.object_path(object_name)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.store_context("blob_put")?;
        }
        fs::write(&path, payload).await.store_context("blob_put")?;

        debug!(
            object = %object_name,
            content_type = %content_type,
            size = payload.len(),
            "Blob stored"
        );
        Ok(self.public_url(object_name))
    }

    async fn delete(&self, object_name: &str) -> Result<()> {
        let path = self.object_path(object_name)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(object = %object_name, "Blob removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(HypeError::store("blob_delete", e)),
        }
    }
}
