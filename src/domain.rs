//! Record shapes that flow between the pipeline stages.
//!
//! Timestamps are `NaiveDateTime` values holding UTC wall-clock time: every
//! source timestamp is converted to UTC and then stripped of its zone.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Order as emitted by a source loader, before timestamp normalization
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawOrder {
    pub order_id: Option<String>,
    pub customer_document: Option<String>,
    pub seller_name: Option<String>,
    pub total_value: Option<f64>,
    /// Source timestamp text, parsed leniently by the reconciler
    pub order_date: Option<String>,
    pub source: Option<String>,
}

/// Order with its timestamp normalized to UTC
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: Option<String>,
    pub customer_document: Option<String>,
    pub seller_name: Option<String>,
    pub total_value: Option<f64>,
    pub order_date: Option<NaiveDateTime>,
    pub source: Option<String>,
}

/// CRM status category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomerStatus {
    Active,
    Inactive,
    #[default]
    Unknown,
}

impl CustomerStatus {
    /// Map raw CRM status text; anything unrecognised is `Unknown`
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_lowercase()).as_deref() {
            Some("active") => CustomerStatus::Active,
            Some("inactive") => CustomerStatus::Inactive,
            _ => CustomerStatus::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CustomerStatus::Active => "active",
            CustomerStatus::Inactive => "inactive",
            CustomerStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for CustomerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Binary sales origin derived from the raw source tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SalesChannel {
    Physical,
    Online,
}

impl SalesChannel {
    /// Orders tagged with the ERP label are physical; every other tag, or none, is online
    pub fn classify(source: Option<&str>, physical_label: &str) -> Self {
        match source {
            Some(tag) if tag == physical_label => SalesChannel::Physical,
            _ => SalesChannel::Online,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SalesChannel::Physical => "physical",
            SalesChannel::Online => "online",
        }
    }
}

impl fmt::Display for SalesChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deduplicated CRM customer, keyed by normalized document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub customer_id: Option<String>,
    pub customer_document: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub status: CustomerStatus,
    /// Acquisition channel flag, kept verbatim
    pub buy: Option<String>,
    pub crm_seller_name: Option<String>,
    pub crm_created_at: Option<NaiveDateTime>,
}

/// One order left-joined with at most one CRM customer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegratedRecord {
    pub order_id: Option<String>,
    pub customer_document: Option<String>,
    pub seller_name: Option<String>,
    pub total_value: Option<f64>,
    pub order_date: Option<NaiveDateTime>,
    pub source: Option<String>,
    pub customer_id: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub status: Option<CustomerStatus>,
    pub buy: Option<String>,
    pub crm_seller_name: Option<String>,
    pub crm_created_at: Option<NaiveDateTime>,
}

impl IntegratedRecord {
    /// Column order of the integrated artifact; matches field order
    pub const COLUMNS: &'static [&'static str] = &[
        "order_id",
        "customer_document",
        "seller_name",
        "total_value",
        "order_date",
        "source",
        "customer_id",
        "name",
        "email",
        "status",
        "buy",
        "crm_seller_name",
        "crm_created_at",
    ];

    /// Append CRM columns to an order; order fields are moved in untouched
    pub fn join(order: Order, customer: Option<&CustomerRecord>) -> Self {
        Self {
            order_id: order.order_id,
            customer_document: order.customer_document,
            seller_name: order.seller_name,
            total_value: order.total_value,
            order_date: order.order_date,
            source: order.source,
            customer_id: customer.and_then(|c| c.customer_id.clone()),
            name: customer.and_then(|c| c.name.clone()),
            email: customer.and_then(|c| c.email.clone()),
            status: customer.map(|c| c.status),
            buy: customer.and_then(|c| c.buy.clone()),
            crm_seller_name: customer.and_then(|c| c.crm_seller_name.clone()),
            crm_created_at: customer.and_then(|c| c.crm_created_at),
        }
    }

    /// The order-side fields of this record
    pub fn order(&self) -> Order {
        Order {
            order_id: self.order_id.clone(),
            customer_document: self.customer_document.clone(),
            seller_name: self.seller_name.clone(),
            total_value: self.total_value,
            order_date: self.order_date,
            source: self.source.clone(),
        }
    }

    pub fn is_matched(&self) -> bool {
        self.status.is_some()
    }
}

/// Integrated record plus derived calendar and categorical fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    pub order_id: Option<String>,
    pub customer_document: Option<String>,
    pub seller_name: Option<String>,
    pub total_value: Option<f64>,
    pub order_date: Option<NaiveDateTime>,
    pub source: Option<String>,
    pub customer_id: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub status: Option<CustomerStatus>,
    pub buy: Option<String>,
    pub crm_seller_name: Option<String>,
    pub crm_created_at: Option<NaiveDateTime>,
    pub order_year: Option<i32>,
    pub order_month: Option<u32>,
    pub order_day: Option<u32>,
    /// Canonical English weekday name, e.g. "Monday"
    pub order_weekday: Option<String>,
    pub order_hour: Option<u32>,
    pub sales_channel: SalesChannel,
    pub customer_status: CustomerStatus,
    pub first_order_date: Option<NaiveDateTime>,
    pub is_first_purchase: bool,
    /// Seller name after case/whitespace normalization and alias lookup
    pub seller: Option<String>,
}

impl EnrichedRecord {
    /// Column order of the final dataset artifact; matches field order
    pub const COLUMNS: &'static [&'static str] = &[
        "order_id",
        "customer_document",
        "seller_name",
        "total_value",
        "order_date",
        "source",
        "customer_id",
        "name",
        "email",
        "status",
        "buy",
        "crm_seller_name",
        "crm_created_at",
        "order_year",
        "order_month",
        "order_day",
        "order_weekday",
        "order_hour",
        "sales_channel",
        "customer_status",
        "first_order_date",
        "is_first_purchase",
        "seller",
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse_is_case_insensitive() {
        assert_eq!(CustomerStatus::parse(Some(" Active ")), CustomerStatus::Active);
        assert_eq!(CustomerStatus::parse(Some("INACTIVE")), CustomerStatus::Inactive);
        assert_eq!(CustomerStatus::parse(Some("blocked")), CustomerStatus::Unknown);
        assert_eq!(CustomerStatus::parse(None), CustomerStatus::Unknown);
    }

    #[test]
    fn test_channel_classification() {
        assert_eq!(SalesChannel::classify(Some("ERP_Fisica"), "ERP_Fisica"), SalesChannel::Physical);
        assert_eq!(SalesChannel::classify(Some("Vestishop"), "ERP_Fisica"), SalesChannel::Online);
        assert_eq!(SalesChannel::classify(None, "ERP_Fisica"), SalesChannel::Online);
    }

    #[test]
    fn test_join_without_customer_leaves_crm_fields_empty() {
        let order = Order {
            order_id: Some("7".to_string()),
            customer_document: None,
            total_value: Some(10.0),
            ..Default::default()
        };
        let record = IntegratedRecord::join(order.clone(), None);
        assert!(!record.is_matched());
        assert!(record.customer_id.is_none());
        assert_eq!(record.order(), order);
    }
}
