use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::constants;
use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub sources: SourcesConfig,
    pub sellers: SellersConfig,
    pub kpi: KpiConfig,
    pub metrics: MetricsConfig,
}

/// Input and output locations for every stage
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub crm: PathBuf,
    pub erp: PathBuf,
    pub ecommerce: PathBuf,
    pub integrated: PathBuf,
    pub final_dataset: PathBuf,
    pub kpis: PathBuf,
    pub metadata: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            crm: PathBuf::from("data/clientes_crm.csv"),
            erp: PathBuf::from("data/pedido_erp.csv"),
            ecommerce: PathBuf::from("data/pedido_ecom.json"),
            integrated: PathBuf::from("output/integrated_data.csv"),
            final_dataset: PathBuf::from("output/final_dataset.csv"),
            kpis: PathBuf::from("output/kpis.json"),
            metadata: PathBuf::from("output/metadata.json"),
        }
    }
}

impl PathsConfig {
    /// Re-root every path under `dir`, keeping file names
    pub fn rooted_at(dir: &Path) -> Self {
        let defaults = Self::default();
        let file = |p: &Path| dir.join(p.file_name().unwrap_or(p.as_os_str()));
        Self {
            crm: file(&defaults.crm),
            erp: file(&defaults.erp),
            ecommerce: file(&defaults.ecommerce),
            integrated: file(&defaults.integrated),
            final_dataset: file(&defaults.final_dataset),
            kpis: file(&defaults.kpis),
            metadata: file(&defaults.metadata),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// Raw source tag stamped on ERP orders; also decides the physical channel
    pub erp_source_label: String,
    /// Field separator of the CRM and ERP exports
    pub delimiter: char,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            erp_source_label: constants::DEFAULT_ERP_SOURCE_LABEL.to_string(),
            delimiter: constants::DEFAULT_SOURCE_DELIMITER,
        }
    }
}

impl SourcesConfig {
    pub fn delimiter_byte(&self) -> u8 {
        // validate() guarantees ASCII
        self.delimiter as u8
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SellersConfig {
    /// alias -> canonical seller name
    pub aliases: BTreeMap<String, String>,
}

impl Default for SellersConfig {
    fn default() -> Self {
        Self {
            aliases: constants::DEFAULT_SELLER_ALIASES
                .iter()
                .map(|(alias, canonical)| (alias.to_string(), canonical.to_string()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KpiConfig {
    pub top_sellers: usize,
}

impl Default for KpiConfig {
    fn default() -> Self {
        Self {
            top_sellers: constants::DEFAULT_TOP_SELLERS,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Where to write the Prometheus text rendering at the end of a run
    pub snapshot_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a TOML file, falling back to defaults when the file is absent
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("No config file at {}, using built-in defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;

        let config = Self::from_toml(&content)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.kpi.top_sellers == 0 {
            return Err(PipelineError::Config(
                "kpi.top_sellers must be at least 1".to_string(),
            ));
        }

        if !self.sources.delimiter.is_ascii() {
            return Err(PipelineError::Config(format!(
                "sources.delimiter must be a single ASCII character, got '{}'",
                self.sources.delimiter
            )));
        }

        if self.sources.erp_source_label.trim().is_empty() {
            return Err(PipelineError::Config(
                "sources.erp_source_label must not be empty".to_string(),
            ));
        }

        let paths = [
            ("crm", &self.paths.crm),
            ("erp", &self.paths.erp),
            ("ecommerce", &self.paths.ecommerce),
            ("integrated", &self.paths.integrated),
            ("final_dataset", &self.paths.final_dataset),
            ("kpis", &self.paths.kpis),
            ("metadata", &self.paths.metadata),
        ];
        for (name, path) in paths {
            if path.as_os_str().is_empty() {
                return Err(PipelineError::Config(format!("paths.{} must not be empty", name)));
            }
        }

        Ok(())
    }
}
