use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result, bail};
use bytes::Bytes;

use super::ObjectStore;

/// Directory-backed store: `<root>/<bucket>/<key>`.
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn bucket_path(&self, bucket: &str) -> Result<PathBuf> {
        let mut components = Path::new(bucket).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.root.join(bucket)),
            _ => bail!("invalid bucket name '{}'", bucket),
        }
    }

    /// Resolves `key` below the bucket directory. Keys that would leave it are rejected.
    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key.trim_start_matches('/'));
        if relative.as_os_str().is_empty()
            || !relative
                .components()
                .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
        {
            bail!("invalid object key '{}'", key);
        }
        Ok(self.bucket_path(bucket)?.join(relative))
    }
}

#[async_trait::async_trait]
impl ObjectStore for LocalStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Bytes> {
        let path = self.object_path(bucket, key)?;
        let data = tokio::fs::read(&path)
            .await
            .with_context(|| format!("failed to read '{}'", path.display()))?;
        Ok(Bytes::from(data))
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        Ok(tokio::fs::metadata(self.bucket_path(bucket)?)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false))
    }

    async fn create_bucket(&self, bucket: &str) -> Result<()> {
        tokio::fs::create_dir_all(self.bucket_path(bucket)?).await?;
        Ok(())
    }

    async fn put(&self, bucket: &str, key: &str, body: Bytes, _content_type: &str) -> Result<()> {
        let path = self.object_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &body)
            .await
            .with_context(|| format!("failed to write '{}'", path.display()))?;
        Ok(())
    }
}
