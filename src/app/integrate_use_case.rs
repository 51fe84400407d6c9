use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::app::ports::ArtifactStorePort;
use crate::app::read_metadata;
use crate::config::{PathsConfig, SourcesConfig};
use crate::domain::IntegratedRecord;
use crate::pipeline::artifacts::{column_names, encode_records};
use crate::pipeline::processing::reconcile::{reconcile, ReconcileSummary};
use crate::pipeline::processing::sources::{load_crm, load_ecommerce, load_erp, LoadReport};

/// Outcome of the load + reconcile stage
#[derive(Debug, Clone, Serialize)]
pub struct IntegrateSummary {
    pub sources: Vec<LoadReport>,
    pub customers: usize,
    pub reconcile: ReconcileSummary,
    pub output_file: String,
}

/// Loads the three raw sources and writes the integrated record set
pub struct IntegrateUseCase {
    store: Arc<dyn ArtifactStorePort>,
    paths: PathsConfig,
    sources: SourcesConfig,
}

impl IntegrateUseCase {
    pub fn new(store: Arc<dyn ArtifactStorePort>, paths: PathsConfig, sources: SourcesConfig) -> Self {
        Self { store, paths, sources }
    }

    pub async fn execute(&self) -> Result<IntegrateSummary> {
        let delimiter = self.sources.delimiter_byte();

        let crm_bytes = self.store.read(&self.paths.crm).await.context("Failed to read CRM export")?;
        let crm = load_crm(&crm_bytes, delimiter).context("Failed to load CRM export")?;

        let erp_bytes = self.store.read(&self.paths.erp).await.context("Failed to read ERP export")?;
        let erp = load_erp(&erp_bytes, delimiter, &self.sources.erp_source_label)
            .context("Failed to load ERP export")?;

        let ecom_bytes = self
            .store
            .read(&self.paths.ecommerce)
            .await
            .context("Failed to read e-commerce feed")?;
        let ecom = load_ecommerce(&ecom_bytes).context("Failed to load e-commerce feed")?;

        let reports = vec![crm.report, erp.report, ecom.report];
        for report in &reports {
            crate::observability::metrics::sources::load_recorded(report);
            if report.defects() > 0 {
                warn!(
                    source = report.source,
                    invalid_documents = report.invalid_documents,
                    invalid_totals = report.invalid_totals,
                    skipped_rows = report.skipped_rows,
                    "Source loaded with record-level defects"
                );
            }
        }

        let customers = crm.customers.len();
        let reconciliation = reconcile(erp.orders, ecom.orders, &crm.customers);
        crate::observability::metrics::reconcile::summary_recorded(&reconciliation.summary);

        // both artifacts are fully rendered before either is replaced
        let bytes = encode_records(IntegratedRecord::COLUMNS, &reconciliation.records)?;
        let mut metadata = read_metadata(self.store.as_ref(), &self.paths.metadata).await;
        metadata.total_orders = Some(reconciliation.summary.erp_orders + reconciliation.summary.ecommerce_orders);
        metadata.total_customers_in_crm = Some(customers);
        metadata.total_integrated_records = Some(reconciliation.records.len());
        metadata.columns = Some(column_names(IntegratedRecord::COLUMNS));
        let metadata_bytes = metadata.to_json()?;

        self.store
            .write_atomic(&self.paths.integrated, &bytes)
            .await
            .with_context(|| format!("Failed to write {}", self.paths.integrated.display()))?;
        self.store
            .write_atomic(&self.paths.metadata, &metadata_bytes)
            .await
            .with_context(|| format!("Failed to write {}", self.paths.metadata.display()))?;

        info!(
            "Integrated {} orders against {} CRM customers ({} unmatched)",
            reconciliation.records.len(),
            customers,
            reconciliation.summary.unmatched_orders
        );

        Ok(IntegrateSummary {
            sources: reports,
            customers,
            reconcile: reconciliation.summary,
            output_file: self.paths.integrated.display().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::infra::memory_artifact_store::MemoryArtifactStore;
    use crate::pipeline::artifacts::{decode_records, RunMetadata};

    const CRM: &str = "\u{feff}id;document;name;email;status;buy;seller_name;created_at\n\
        c1;123.456.789-01;Ana;ana@example.com;active;1;Natalia;2023-05-01 10:00:00\n\
        c2;12345678901;Ana Dup;dup@example.com;inactive;0;Keli;2023-06-01 10:00:00\n";

    const ERP: &str = "id;customer_document;seller_name;order_value;order_created\n\
        1;123.456.789-01;natalia;150,50;2024-01-05\n\
        2;123456789;Keli;20,00;2024-01-06 08:00:00\n";

    const ECOM: &str = r#"{"docs": [
        {"_id": "e1", "customer": {"doc": "98765432100"}, "settings": {"createdAt": "2024-02-01T12:00:00Z", "source": "Vestishop"}, "seller": {"name": "Bia"}, "summary": {"total": 99.9}}
    ]}"#;

    struct RecordingStore {
        inner: MemoryArtifactStore,
        ops: Arc<tokio::sync::Mutex<Vec<String>>>,
    }

    impl RecordingStore {
        fn new(inner: MemoryArtifactStore) -> Self {
            Self {
                inner,
                ops: Arc::new(tokio::sync::Mutex::new(Vec::new())),
            }
        }
    }

    #[async_trait::async_trait]
    impl ArtifactStorePort for RecordingStore {
        async fn read(&self, path: &std::path::Path) -> anyhow::Result<Vec<u8>> {
            self.ops.lock().await.push(format!("read {}", path.display()));
            self.inner.read(path).await
        }

        async fn exists(&self, path: &std::path::Path) -> bool {
            self.inner.exists(path).await
        }

        async fn write_atomic(&self, path: &std::path::Path, bytes: &[u8]) -> anyhow::Result<()> {
            self.ops.lock().await.push(format!("write {}", path.display()));
            self.inner.write_atomic(path, bytes).await
        }
    }

    async fn seeded(paths: &PathsConfig) -> MemoryArtifactStore {
        let store = MemoryArtifactStore::new();
        store.insert(&paths.crm, CRM).await;
        store.insert(&paths.erp, ERP).await;
        store.insert(&paths.ecommerce, ECOM).await;
        store
    }

    #[tokio::test]
    async fn test_integrate_writes_one_row_per_order() {
        let paths = PathsConfig::default();
        let store = seeded(&paths).await;
        let use_case = IntegrateUseCase::new(Arc::new(store.clone()), paths.clone(), SourcesConfig::default());

        let summary = use_case.execute().await.unwrap();
        assert_eq!(summary.customers, 1);
        assert_eq!(summary.reconcile.integrated_records, 3);
        assert_eq!(summary.reconcile.unmatched_orders, 2);
        assert_eq!(summary.sources[0].duplicates_dropped, 1);

        let bytes = store.get(&paths.integrated).await.unwrap();
        let records: Vec<IntegratedRecord> = decode_records(&bytes).unwrap();
        assert_eq!(records.len(), 3);

        let first = &records[0];
        assert_eq!(first.total_value, Some(150.5));
        assert_eq!(first.customer_document.as_deref(), Some("12345678901"));
        assert_eq!(first.name.as_deref(), Some("Ana"));

        let second = &records[1];
        assert_eq!(second.customer_document, None);
        assert_eq!(second.status, None);
        assert_eq!(second.total_value, Some(20.0));
    }

    #[tokio::test]
    async fn test_integrate_writes_metadata_and_keeps_foreign_keys() {
        let paths = PathsConfig::default();
        let store = seeded(&paths).await;
        store.insert(&paths.metadata, r#"{"owner": "sales-ops"}"#).await;
        let use_case = IntegrateUseCase::new(Arc::new(store.clone()), paths.clone(), SourcesConfig::default());

        use_case.execute().await.unwrap();

        let meta = RunMetadata::from_slice(&store.get(&paths.metadata).await.unwrap()).unwrap();
        assert_eq!(meta.total_orders, Some(3));
        assert_eq!(meta.total_customers_in_crm, Some(1));
        assert_eq!(meta.total_integrated_records, Some(3));
        assert_eq!(meta.columns.as_ref().map(Vec::len), Some(IntegratedRecord::COLUMNS.len()));
        assert_eq!(meta.extra.get("owner").and_then(|v| v.as_str()), Some("sales-ops"));
    }

    #[tokio::test]
    async fn test_missing_source_aborts_without_output() {
        let paths = PathsConfig::default();
        let store = MemoryArtifactStore::new();
        store.insert(&paths.crm, CRM).await;
        let use_case = IntegrateUseCase::new(Arc::new(store.clone()), paths.clone(), SourcesConfig::default());

        let err = use_case.execute().await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::MissingArtifact(_))
        ));
        assert!(store.get(&paths.integrated).await.is_none());
    }

    #[tokio::test]
    async fn test_malformed_feed_aborts_stage() {
        let paths = PathsConfig::default();
        let store = seeded(&paths).await;
        store.insert(&paths.ecommerce, r#"{"orders": 3}"#).await;
        let use_case = IntegrateUseCase::new(Arc::new(store.clone()), paths.clone(), SourcesConfig::default());

        assert!(use_case.execute().await.is_err());
        assert!(store.get(&paths.integrated).await.is_none());
    }

    #[tokio::test]
    async fn test_outputs_are_replaced_only_after_everything_is_rendered() {
        let paths = PathsConfig::default();
        let inner = seeded(&paths).await;
        inner.insert(&paths.metadata, r#"{"owner": "sales-ops"}"#).await;
        let store = RecordingStore::new(inner);
        let ops = store.ops.clone();
        let use_case = IntegrateUseCase::new(Arc::new(store), paths.clone(), SourcesConfig::default());

        use_case.execute().await.unwrap();

        let ops = ops.lock().await;
        let first_write = ops.iter().position(|op| op.starts_with("write")).unwrap();
        assert_eq!(
            &ops[first_write..],
            &[
                format!("write {}", paths.integrated.display()),
                format!("write {}", paths.metadata.display()),
            ]
        );
        assert!(ops[..first_write].contains(&format!("read {}", paths.metadata.display())));
    }
}
