use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{source_name} export is missing required column '{column}'")]
    MissingColumn {
        source_name: &'static str,
        column: String,
    },

    #[error("{source_name} export is malformed: {message}")]
    MalformedSource {
        source_name: &'static str,
        message: String,
    },

    #[error("Upstream artifact not found: {}", .0.display())]
    MissingArtifact(PathBuf),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
