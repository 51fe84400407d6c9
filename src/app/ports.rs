use async_trait::async_trait;
use std::path::Path;

/// Flat-file handoff between stages.
///
/// `read` of a path that does not exist fails with
/// [`PipelineError::MissingArtifact`](crate::error::PipelineError::MissingArtifact).
#[async_trait]
pub trait ArtifactStorePort: Send + Sync {
    async fn read(&self, path: &Path) -> anyhow::Result<Vec<u8>>;

    async fn exists(&self, path: &Path) -> bool;

    /// Replace the artifact at `path` in one step; readers see either the
    /// previous content or the new content, never a partial file.
    async fn write_atomic(&self, path: &Path, bytes: &[u8]) -> anyhow::Result<()>;
}
