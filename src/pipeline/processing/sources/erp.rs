use tracing::{debug, info, warn};

use super::table::{DelimitedTable, Row};
use super::{monetary, LoadReport};
use crate::constants::ERP_SOURCE;
use crate::domain::RawOrder;
use crate::error::Result;
use crate::pipeline::processing::document::normalize_document;

pub const ERP_COLUMNS: &[&str] = &[
    "id",
    "customer_document",
    "seller_name",
    "order_value",
    "order_created",
];

#[derive(Debug)]
pub struct ErpLoad {
    pub orders: Vec<RawOrder>,
    pub report: LoadReport,
}

/// Load the point-of-sale export; every order is tagged with `source_label`
pub fn load_erp(bytes: &[u8], delimiter: u8, source_label: &str) -> Result<ErpLoad> {
    let table = DelimitedTable::parse(ERP_SOURCE, bytes, delimiter)?;
    table.require_columns(ERP_COLUMNS)?;

    if table.is_empty() {
        warn!("ERP export has a header but no data rows");
    }

    let mut report = LoadReport::new(ERP_SOURCE);
    report.rows_read = table.len() + table.unreadable_rows;
    report.skipped_rows = table.unreadable_rows;

    let mut orders = Vec::with_capacity(table.len());
    for row in table.rows() {
        if row.is_blank() {
            report.skipped_rows += 1;
            continue;
        }

        let order = map_erp_row(&row, source_label);
        if row.text("customer_document").is_some() && order.customer_document.is_none() {
            report.invalid_documents += 1;
        }
        if let (Some(raw), None) = (row.text("order_value"), order.total_value) {
            debug!(order_id = ?order.order_id, raw, "Unparsable ERP order value");
            report.invalid_totals += 1;
        }
        orders.push(order);
    }

    report.records_emitted = orders.len();
    info!("ERP loaded: {} orders", orders.len());

    Ok(ErpLoad { orders, report })
}

/// ERP schema mapping: `id` → order_id, `order_value` → total_value, `order_created` → order_date
pub fn map_erp_row(row: &Row<'_>, source_label: &str) -> RawOrder {
    RawOrder {
        order_id: row.owned("id"),
        customer_document: normalize_document(row.text("customer_document")),
        seller_name: row.owned("seller_name"),
        total_value: row.text("order_value").and_then(parse_decimal_comma),
        order_date: row.owned("order_created"),
        source: Some(source_label.to_string()),
    }
}

/// Read a decimal-comma number ("150,50", "1.234,56"). With a comma present,
/// dots are thousands separators.
pub fn parse_decimal_comma(raw: &str) -> Option<f64> {
    let text = raw.trim();
    let normalized = if text.contains(',') {
        text.replace('.', "").replace(',', ".")
    } else {
        text.to_string()
    };
    normalized.parse::<f64>().ok().and_then(monetary)
}
