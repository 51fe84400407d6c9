pub mod enrich_use_case;
pub mod integrate_use_case;
pub mod kpi_use_case;
pub mod ports;

use std::path::Path;
use tracing::warn;

use crate::app::ports::ArtifactStorePort;
use crate::pipeline::artifacts::RunMetadata;

/// Current run metadata, or an empty one when the artifact is absent or unreadable
pub(crate) async fn read_metadata(store: &dyn ArtifactStorePort, path: &Path) -> RunMetadata {
    if !store.exists(path).await {
        return RunMetadata::default();
    }
    match store.read(path).await.map(|bytes| RunMetadata::from_slice(&bytes)) {
        Ok(Ok(metadata)) => metadata,
        Ok(Err(e)) => {
            warn!("Ignoring unreadable metadata at {}: {}", path.display(), e);
            RunMetadata::default()
        }
        Err(e) => {
            warn!("Ignoring metadata at {}: {:#}", path.display(), e);
            RunMetadata::default()
        }
    }
}
