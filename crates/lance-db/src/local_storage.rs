use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::DbError;
use crate::storage::{ObjectStore, is_safe_object_path};

/// Buckets as directories under `root`. Objects are served by the binary at
/// `{public_url}/storage/v1/object/public/{bucket}/{path}`, the hosted layout.
#[derive(Clone)]
pub struct LocalStorage {
    root: PathBuf,
    public_url: String,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>, public_url: &str) -> Self {
        Self {
            root: root.into(),
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, bucket: &str, path: &str) -> Result<PathBuf, DbError> {
        if !is_safe_object_path(bucket) || bucket.contains('/') || !is_safe_object_path(path) {
            return Err(DbError::Rejected(format!("invalid object path {bucket}/{path}")));
        }
        Ok(self.root.join(bucket).join(path))
    }
}

#[async_trait]
impl ObjectStore for LocalStorage {
    async fn ensure_bucket(&self, bucket: &str) -> Result<(), DbError> {
        let dir = self.object_path(bucket, ".keep")?;
        if let Some(dir) = dir.parent()
            && !dir.exists()
        {
            tokio::fs::create_dir_all(dir).await?;
            info!("Created bucket directory {}", dir.display());
        }
        Ok(())
    }

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<(), DbError> {
        let target = self.object_path(bucket, path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, &bytes).await?;
        debug!("Stored {} bytes at {}", bytes.len(), target.display());
        Ok(())
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<(), DbError> {
        for path in paths {
            let target = self.object_path(bucket, path)?;
            match tokio::fs::remove_file(&target).await {
                Ok(()) => debug!("Removed {}", target.display()),
                // Missing objects are not an error, same as the hosted API.
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{}", self.public_url, bucket, path)
    }
}
