use std::collections::HashSet;
use tracing::{debug, info, warn};

use super::table::{DelimitedTable, Row};
use super::LoadReport;
use crate::constants::CRM_SOURCE;
use crate::domain::{CustomerRecord, CustomerStatus};
use crate::error::Result;
use crate::pipeline::processing::document::normalize_document;
use crate::pipeline::processing::timestamp::parse_timestamp;

pub const CRM_COLUMNS: &[&str] = &[
    "id",
    "document",
    "name",
    "email",
    "status",
    "buy",
    "seller_name",
    "created_at",
];

#[derive(Debug)]
pub struct CrmLoad {
    /// Unique by normalized document, first occurrence kept
    pub customers: Vec<CustomerRecord>,
    pub report: LoadReport,
}

/// Load the CRM export and deduplicate customers by normalized document
pub fn load_crm(bytes: &[u8], delimiter: u8) -> Result<CrmLoad> {
    let table = DelimitedTable::parse(CRM_SOURCE, bytes, delimiter)?;
    table.require_columns(CRM_COLUMNS)?;

    if table.is_empty() {
        warn!("CRM export has a header but no data rows");
    }

    let mut report = LoadReport::new(CRM_SOURCE);
    report.rows_read = table.len() + table.unreadable_rows;
    report.skipped_rows = table.unreadable_rows;

    let mut seen = HashSet::new();
    let mut customers = Vec::new();

    for row in table.rows() {
        if row.is_blank() {
            report.skipped_rows += 1;
            continue;
        }

        let Some(customer) = map_crm_row(&row) else {
            debug!(raw = ?row.text("document"), "CRM row has no usable document");
            report.invalid_documents += 1;
            continue;
        };

        if !seen.insert(customer.customer_document.clone()) {
            report.duplicates_dropped += 1;
            continue;
        }

        customers.push(customer);
    }

    report.records_emitted = customers.len();
    info!(
        "CRM loaded: {} customers ({} duplicates, {} without document)",
        customers.len(),
        report.duplicates_dropped,
        report.invalid_documents
    );

    Ok(CrmLoad { customers, report })
}

/// CRM schema mapping. Rows without a valid document cannot be joined and yield `None`.
pub fn map_crm_row(row: &Row<'_>) -> Option<CustomerRecord> {
    let customer_document = normalize_document(row.text("document"))?;

    Some(CustomerRecord {
        customer_id: row.owned("id"),
        customer_document,
        name: row.owned("name"),
        email: row.owned("email"),
        status: CustomerStatus::parse(row.text("status")),
        buy: row.owned("buy"),
        crm_seller_name: row.owned("seller_name"),
        crm_created_at: row.text("created_at").and_then(parse_timestamp),
    })
}
