//! Metrics for the sales pipeline
//!
//! Every metric goes through the `metrics` facade under a name from
//! [`MetricName`]. A Prometheus recorder is installed once per process by
//! [`init`]; without it every call here is a no-op, which is what tests rely on.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::path::Path;
use std::sync::OnceLock;
use tracing::info;

/// All metric names used by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Source loading
    SourceRowsRead,
    SourceRecordsLoaded,
    SourceDefects,
    CrmDuplicatesDropped,

    // Reconciliation
    ReconcileRecordsIntegrated,
    ReconcileUnmatchedOrders,
    ReconcileUnparsedDates,

    // Enrichment
    EnrichRecordsProcessed,
    EnrichFirstPurchases,
    EnrichUndatedRecords,

    // KPI aggregation
    KpiRecordsAggregated,
    KpiTotalRevenue,

    // Stage lifecycle
    StageRuns,
    StageFailures,
    StageDuration,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::SourceRowsRead => "sales_source_rows_read_total",
            MetricName::SourceRecordsLoaded => "sales_source_records_loaded_total",
            MetricName::SourceDefects => "sales_source_defects_total",
            MetricName::CrmDuplicatesDropped => "sales_crm_duplicates_dropped_total",

            MetricName::ReconcileRecordsIntegrated => "sales_reconcile_records_integrated_total",
            MetricName::ReconcileUnmatchedOrders => "sales_reconcile_unmatched_orders_total",
            MetricName::ReconcileUnparsedDates => "sales_reconcile_unparsed_dates_total",

            MetricName::EnrichRecordsProcessed => "sales_enrich_records_processed_total",
            MetricName::EnrichFirstPurchases => "sales_enrich_first_purchases_total",
            MetricName::EnrichUndatedRecords => "sales_enrich_undated_records_total",

            MetricName::KpiRecordsAggregated => "sales_kpi_records_aggregated_total",
            MetricName::KpiTotalRevenue => "sales_kpi_total_revenue",

            MetricName::StageRuns => "sales_stage_runs_total",
            MetricName::StageFailures => "sales_stage_failures_total",
            MetricName::StageDuration => "sales_stage_duration_seconds",
        }
    }
}

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Calling it again is a no-op.
pub fn init() -> anyhow::Result<()> {
    if PROMETHEUS_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {}", e))?;
    let _ = PROMETHEUS_HANDLE.set(handle);

    info!("Metrics system initialized");
    Ok(())
}

/// Prometheus text rendering of everything recorded so far
pub fn render() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(|handle| handle.render())
}

/// Persist the current rendering; does nothing when no recorder is installed
pub async fn write_snapshot(path: &Path) -> anyhow::Result<bool> {
    let Some(text) = render() else {
        return Ok(false);
    };
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir).await?;
    }
    tokio::fs::write(path, text).await?;
    info!("Metrics snapshot written to {}", path.display());
    Ok(true)
}

// ============================================================================
// Source loading
// ============================================================================

pub mod sources {
    use super::MetricName;
    use crate::pipeline::processing::sources::LoadReport;

    /// Record what one loader kept and degraded
    pub fn load_recorded(report: &LoadReport) {
        let source = report.source;
        ::metrics::counter!(MetricName::SourceRowsRead.as_str(), "source" => source)
            .increment(report.rows_read as u64);
        ::metrics::counter!(MetricName::SourceRecordsLoaded.as_str(), "source" => source)
            .increment(report.records_emitted as u64);

        for (kind, count) in [
            ("invalid_document", report.invalid_documents),
            ("invalid_total", report.invalid_totals),
            ("skipped_row", report.skipped_rows),
        ] {
            if count > 0 {
                ::metrics::counter!(MetricName::SourceDefects.as_str(), "source" => source, "kind" => kind)
                    .increment(count as u64);
            }
        }

        if report.duplicates_dropped > 0 {
            ::metrics::counter!(MetricName::CrmDuplicatesDropped.as_str())
                .increment(report.duplicates_dropped as u64);
        }
    }
}

// ============================================================================
// Reconciliation
// ============================================================================

pub mod reconcile {
    use super::MetricName;
    use crate::pipeline::processing::reconcile::ReconcileSummary;

    pub fn summary_recorded(summary: &ReconcileSummary) {
        ::metrics::counter!(MetricName::ReconcileRecordsIntegrated.as_str())
            .increment(summary.integrated_records as u64);
        ::metrics::counter!(MetricName::ReconcileUnmatchedOrders.as_str())
            .increment(summary.unmatched_orders as u64);
        ::metrics::counter!(MetricName::ReconcileUnparsedDates.as_str())
            .increment(summary.unparsed_dates as u64);
    }
}

// ============================================================================
// Enrichment
// ============================================================================

pub mod enrich {
    use super::MetricName;
    use crate::pipeline::processing::enrich::EnrichSummary;

    pub fn summary_recorded(summary: &EnrichSummary) {
        ::metrics::counter!(MetricName::EnrichRecordsProcessed.as_str()).increment(summary.records as u64);
        ::metrics::counter!(MetricName::EnrichFirstPurchases.as_str())
            .increment(summary.first_purchases as u64);
        ::metrics::counter!(MetricName::EnrichUndatedRecords.as_str())
            .increment(summary.undated_records as u64);
    }
}

// ============================================================================
// KPI aggregation
// ============================================================================

pub mod kpis {
    use super::MetricName;

    pub fn snapshot_recorded(records: usize, total_revenue: f64) {
        ::metrics::counter!(MetricName::KpiRecordsAggregated.as_str()).increment(records as u64);
        ::metrics::gauge!(MetricName::KpiTotalRevenue.as_str()).set(total_revenue);
    }
}

// ============================================================================
// Stage lifecycle
// ============================================================================

pub mod stage {
    use super::MetricName;

    pub fn completed(stage: &'static str, duration_secs: f64) {
        ::metrics::counter!(MetricName::StageRuns.as_str(), "stage" => stage).increment(1);
        ::metrics::histogram!(MetricName::StageDuration.as_str(), "stage" => stage).record(duration_secs);
    }

    pub fn failed(stage: &'static str) {
        ::metrics::counter!(MetricName::StageFailures.as_str(), "stage" => stage).increment(1);
    }
}
