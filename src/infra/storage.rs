use anyhow::{anyhow, Result};
use std::path::{Component, Path, PathBuf};

use crate::config::AppConfig;

/// Local filesystem storage for uploaded media, served under `/media`.
#[derive(Clone)]
pub struct MediaStorage {
    root: PathBuf,
}

impl MediaStorage {
    pub async fn new(config: &AppConfig) -> Result<Self> {
        tokio::fs::create_dir_all(&config.media_root).await?;
        Ok(Self {
            root: config.media_root.clone(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        Ok(())
    }

    pub async fn exists(&self, key: &str) -> Result<bool> {
        let path = self.path_for(key)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let is_plain = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        if key.is_empty() || !is_plain {
            return Err(anyhow!("invalid media key: {}", key));
        }
        Ok(self.root.join(relative))
    }
}
