pub mod fs_artifact_store;
pub mod memory_artifact_store;

pub use fs_artifact_store::FsArtifactStore;
pub use memory_artifact_store::MemoryArtifactStore;
