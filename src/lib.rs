pub mod config;
pub mod constants;
pub mod domain;
pub mod error;
pub mod pipeline;

// Layered boundaries for application and infrastructure
pub mod app;
pub mod infra;

pub mod observability;

pub use config::Config;
pub use error::{PipelineError, Result};
pub use pipeline::{Pipeline, PipelineResult, Stage, StageReport};
