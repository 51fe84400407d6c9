//! Source loaders: one schema-mapping function per export, each producing
//! canonical records. Structural problems fail the load; record-level
//! defects become `None` fields and are tallied in a [`LoadReport`].

pub mod crm;
pub mod ecommerce;
pub mod erp;
pub mod table;

use serde::Serialize;

pub use crm::{load_crm, CrmLoad};
pub use ecommerce::{load_ecommerce, EcommerceLoad};
pub use erp::{load_erp, ErpLoad};

/// Per-source tally of what the loader kept and what it degraded
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadReport {
    pub source: &'static str,
    pub rows_read: usize,
    pub records_emitted: usize,
    /// Documents present in the source that did not normalize to a valid length
    pub invalid_documents: usize,
    /// Totals present in the source that could not be read as a non-negative number
    pub invalid_totals: usize,
    /// Blank, undecodable or non-object rows
    pub skipped_rows: usize,
    pub duplicates_dropped: usize,
}

impl LoadReport {
    pub fn new(source: &'static str) -> Self {
        Self {
            source,
            ..Default::default()
        }
    }

    pub fn defects(&self) -> usize {
        self.invalid_documents + self.invalid_totals + self.skipped_rows
    }
}

/// Order totals must be finite and non-negative
pub(crate) fn monetary(value: f64) -> Option<f64> {
    if value.is_finite() && value >= 0.0 {
        Some(value)
    } else {
        None
    }
}
