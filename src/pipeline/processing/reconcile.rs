use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::domain::{CustomerRecord, IntegratedRecord, Order, RawOrder};
use crate::pipeline::processing::timestamp::parse_timestamp;

/// Result of the union + left join
#[derive(Debug)]
pub struct Reconciliation {
    /// One record per input order, ERP orders first, in source order
    pub records: Vec<IntegratedRecord>,
    pub summary: ReconcileSummary,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconcileSummary {
    pub erp_orders: usize,
    pub ecommerce_orders: usize,
    pub integrated_records: usize,
    pub matched_orders: usize,
    pub unmatched_orders: usize,
    pub unparsed_dates: usize,
}

/// Normalize the order timestamp to the UTC wall clock
pub fn normalize_order(raw: RawOrder) -> Order {
    let order_date = raw.order_date.as_deref().and_then(parse_timestamp);
    if order_date.is_none() {
        debug!(order_id = ?raw.order_id, raw = ?raw.order_date, "Order timestamp could not be parsed");
    }

    Order {
        order_id: raw.order_id,
        customer_document: raw.customer_document,
        seller_name: raw.seller_name,
        total_value: raw.total_value,
        order_date,
        source: raw.source,
    }
}

/// Union the two order sets and left-join them against the CRM on normalized
/// document. Every order is kept; an order without a CRM match carries empty
/// CRM fields. Several orders of one customer each repeat that customer's fields.
pub fn reconcile(
    erp_orders: Vec<RawOrder>,
    ecommerce_orders: Vec<RawOrder>,
    customers: &[CustomerRecord],
) -> Reconciliation {
    let mut by_document: HashMap<&str, &CustomerRecord> = HashMap::with_capacity(customers.len());
    for customer in customers {
        by_document
            .entry(customer.customer_document.as_str())
            .or_insert(customer);
    }

    let mut summary = ReconcileSummary {
        erp_orders: erp_orders.len(),
        ecommerce_orders: ecommerce_orders.len(),
        ..Default::default()
    };

    let mut records = Vec::with_capacity(erp_orders.len() + ecommerce_orders.len());
    for raw in erp_orders.into_iter().chain(ecommerce_orders) {
        let order = normalize_order(raw);
        if order.order_date.is_none() {
            summary.unparsed_dates += 1;
        }

        let customer = order
            .customer_document
            .as_deref()
            .and_then(|doc| by_document.get(doc).copied());
        if customer.is_some() {
            summary.matched_orders += 1;
        } else {
            summary.unmatched_orders += 1;
        }

        records.push(IntegratedRecord::join(order, customer));
    }

    summary.integrated_records = records.len();
    info!(
        "Reconciled {} orders ({} matched CRM, {} unmatched)",
        summary.integrated_records, summary.matched_orders, summary.unmatched_orders
    );

    Reconciliation { records, summary }
}
