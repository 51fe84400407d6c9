// Pipeline processing: source loading, reconciliation, enrichment, and KPI aggregation

pub mod aggregate;
pub mod document;
pub mod enrich;
pub mod reconcile;
pub mod sources;
pub mod timestamp;
