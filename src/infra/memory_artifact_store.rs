use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::app::ports::ArtifactStorePort;
use crate::error::PipelineError;

/// Artifact store held in memory; clones share the same contents
#[derive(Debug, Clone, Default)]
pub struct MemoryArtifactStore {
    files: Arc<Mutex<HashMap<PathBuf, Vec<u8>>>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, path: impl Into<PathBuf>, bytes: impl Into<Vec<u8>>) {
        self.files.lock().await.insert(path.into(), bytes.into());
    }

    pub async fn get(&self, path: &Path) -> Option<Vec<u8>> {
        self.files.lock().await.get(path).cloned()
    }
}

#[async_trait::async_trait]
impl ArtifactStorePort for MemoryArtifactStore {
    async fn read(&self, path: &Path) -> anyhow::Result<Vec<u8>> {
        self.get(path)
            .await
            .ok_or_else(|| PipelineError::MissingArtifact(path.to_path_buf()).into())
    }

    async fn exists(&self, path: &Path) -> bool {
        self.files.lock().await.contains_key(path)
    }

    async fn write_atomic(&self, path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
        self.insert(path, bytes.to_vec()).await;
        Ok(())
    }
}
