use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::app::ports::ArtifactStorePort;
use crate::app::read_metadata;
use crate::config::PathsConfig;
use crate::domain::EnrichedRecord;
use crate::pipeline::artifacts::decode_records;
use crate::pipeline::processing::aggregate::{aggregate, KpiSnapshot};

#[derive(Debug, Clone, Serialize)]
pub struct KpiStageSummary {
    pub records: usize,
    pub total_revenue: f64,
    pub total_orders: usize,
    pub sellers_ranked: usize,
    pub output_file: String,
}

/// Aggregates the final dataset into the KPI snapshot artifact
pub struct KpiUseCase {
    store: Arc<dyn ArtifactStorePort>,
    paths: PathsConfig,
    top_sellers: usize,
}

impl KpiUseCase {
    pub fn new(store: Arc<dyn ArtifactStorePort>, paths: PathsConfig, top_sellers: usize) -> Self {
        Self {
            store,
            paths,
            top_sellers,
        }
    }

    /// Compute the snapshot without persisting it
    pub async fn snapshot(&self) -> Result<(KpiSnapshot, usize)> {
        let bytes = self
            .store
            .read(&self.paths.final_dataset)
            .await
            .context("Final dataset unavailable; run the enrich stage first")?;
        let records: Vec<EnrichedRecord> = decode_records(&bytes)
            .with_context(|| format!("Failed to decode {}", self.paths.final_dataset.display()))?;

        // period boundaries are informational; a missing metadata file leaves them null
        let period = read_metadata(self.store.as_ref(), &self.paths.metadata).await.period();

        Ok((aggregate(&records, self.top_sellers, period), records.len()))
    }

    pub async fn execute(&self) -> Result<KpiStageSummary> {
        let (snapshot, records) = self.snapshot().await?;
        crate::observability::metrics::kpis::snapshot_recorded(records, snapshot.global_kpis.total_revenue);

        let json = serde_json::to_vec_pretty(&snapshot).context("Failed to serialize KPI snapshot")?;
        self.store
            .write_atomic(&self.paths.kpis, &json)
            .await
            .with_context(|| format!("Failed to write {}", self.paths.kpis.display()))?;

        info!(
            "KPI snapshot written: revenue {:.2} over {} orders",
            snapshot.global_kpis.total_revenue, snapshot.global_kpis.total_orders
        );

        Ok(KpiStageSummary {
            records,
            total_revenue: snapshot.global_kpis.total_revenue,
            total_orders: snapshot.global_kpis.total_orders,
            sellers_ranked: snapshot.seller_kpis.sales_by_seller.len(),
            output_file: self.paths.kpis.display().to_string(),
        })
    }
}
