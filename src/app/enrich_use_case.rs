use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::Arc;

use crate::app::ports::ArtifactStorePort;
use crate::app::read_metadata;
use crate::config::PathsConfig;
use crate::domain::{EnrichedRecord, IntegratedRecord};
use crate::pipeline::artifacts::{column_names, decode_records, encode_records};
use crate::pipeline::processing::enrich::{DefaultEnricher, EnrichSummary};

#[derive(Debug, Clone, Serialize)]
pub struct EnrichStageSummary {
    pub input_records: usize,
    pub enrich: EnrichSummary,
    pub min_order_date: Option<String>,
    pub max_order_date: Option<String>,
    pub output_file: String,
}

/// Reads the integrated artifact and writes the final enriched dataset
pub struct EnrichUseCase {
    store: Arc<dyn ArtifactStorePort>,
    paths: PathsConfig,
    enricher: DefaultEnricher,
}

impl EnrichUseCase {
    pub fn new(store: Arc<dyn ArtifactStorePort>, paths: PathsConfig, enricher: DefaultEnricher) -> Self {
        Self { store, paths, enricher }
    }

    pub async fn execute(&self) -> Result<EnrichStageSummary> {
        let bytes = self
            .store
            .read(&self.paths.integrated)
            .await
            .context("Integrated artifact unavailable; run the integrate stage first")?;
        let records: Vec<IntegratedRecord> = decode_records(&bytes)
            .with_context(|| format!("Failed to decode {}", self.paths.integrated.display()))?;
        let input_records = records.len();

        let (enriched, summary) = self.enricher.enrich(records);
        crate::observability::metrics::enrich::summary_recorded(&summary);

        let dates = || enriched.iter().filter_map(|r| r.order_date);
        let min_order_date = dates().min().map(|d| d.format("%Y-%m-%d").to_string());
        let max_order_date = dates().max().map(|d| d.format("%Y-%m-%d").to_string());

        // both artifacts are fully rendered before either is replaced
        let out = encode_records(EnrichedRecord::COLUMNS, &enriched)?;
        let mut metadata = read_metadata(self.store.as_ref(), &self.paths.metadata).await;
        metadata.final_dataset_columns = Some(column_names(EnrichedRecord::COLUMNS));
        metadata.min_order_date = min_order_date.clone();
        metadata.max_order_date = max_order_date.clone();
        let metadata_bytes = metadata.to_json()?;

        self.store
            .write_atomic(&self.paths.final_dataset, &out)
            .await
            .with_context(|| format!("Failed to write {}", self.paths.final_dataset.display()))?;
        self.store
            .write_atomic(&self.paths.metadata, &metadata_bytes)
            .await
            .with_context(|| format!("Failed to write {}", self.paths.metadata.display()))?;

        Ok(EnrichStageSummary {
            input_records,
            enrich: summary,
            min_order_date,
            max_order_date,
            output_file: self.paths.final_dataset.display().to_string(),
        })
    }
}
