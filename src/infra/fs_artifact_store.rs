use anyhow::Context;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::app::ports::ArtifactStorePort;
use crate::error::PipelineError;

/// Artifact store backed by the local filesystem
#[derive(Debug, Clone, Default)]
pub struct FsArtifactStore;

impl FsArtifactStore {
    pub fn new() -> Self {
        Self
    }
}

/// Sibling path the new content is staged in before the rename
fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "artifact".to_string());
    path.with_file_name(format!(".{}.{}.tmp", name, std::process::id()))
}

#[async_trait::async_trait]
impl ArtifactStorePort for FsArtifactStore {
    async fn read(&self, path: &Path) -> anyhow::Result<Vec<u8>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(PipelineError::MissingArtifact(path.to_path_buf()).into())
            }
            Err(e) => Err(PipelineError::Io(e)).with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn write_atomic(&self, path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Failed to create directory {}", dir.display()))?;
        }

        let staging = staging_path(path);
        if let Err(e) = tokio::fs::write(&staging, bytes).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(e).with_context(|| format!("Failed to write {}", staging.display()));
        }
        if let Err(e) = tokio::fs::rename(&staging, path).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(e).with_context(|| format!("Failed to replace {}", path.display()));
        }

        debug!("Wrote {} bytes to {}", bytes.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_creates_parents_and_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out/kpis.json");
        let store = FsArtifactStore::new();

        store.write_atomic(&path, b"first").await.unwrap();
        store.write_atomic(&path, b"second").await.unwrap();

        assert_eq!(store.read(&path).await.unwrap(), b"second");
        assert!(store.exists(&path).await);

        let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_missing_artifact_is_typed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.csv");
        let store = FsArtifactStore::new();

        assert!(!store.exists(&path).await);
        let err = store.read(&path).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::MissingArtifact(p)) if p == &path
        ));
    }
}
