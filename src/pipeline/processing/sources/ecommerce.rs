use serde_json::Value;
use tracing::{debug, info, warn};

use super::{monetary, LoadReport};
use crate::constants::ECOMMERCE_SOURCE;
use crate::domain::RawOrder;
use crate::error::{PipelineError, Result};
use crate::pipeline::processing::document::{document_text, normalize_document};
use crate::pipeline::processing::timestamp::from_epoch_millis;

#[derive(Debug)]
pub struct EcommerceLoad {
    pub orders: Vec<RawOrder>,
    pub report: LoadReport,
}

/// Load the e-commerce feed: either `{"docs": [...]}` or a bare array of order documents
pub fn load_ecommerce(bytes: &[u8]) -> Result<EcommerceLoad> {
    let root: Value = serde_json::from_slice(bytes).map_err(|e| PipelineError::MalformedSource {
        source_name: ECOMMERCE_SOURCE,
        message: format!("invalid JSON: {}", e),
    })?;

    let docs = match &root {
        Value::Object(map) => match map.get("docs") {
            Some(Value::Array(docs)) => docs,
            _ => {
                return Err(PipelineError::MalformedSource {
                    source_name: ECOMMERCE_SOURCE,
                    message: "top-level object has no 'docs' array".to_string(),
                })
            }
        },
        Value::Array(docs) => docs,
        _ => {
            return Err(PipelineError::MalformedSource {
                source_name: ECOMMERCE_SOURCE,
                message: "expected an object or an array at top level".to_string(),
            })
        }
    };

    let mut report = LoadReport::new(ECOMMERCE_SOURCE);
    report.rows_read = docs.len();

    let mut orders = Vec::with_capacity(docs.len());
    for (idx, doc) in docs.iter().enumerate() {
        if !doc.is_object() {
            warn!(index = idx, "Skipping e-commerce entry that is not an object");
            report.skipped_rows += 1;
            continue;
        }

        let order = map_ecommerce_doc(doc);
        if doc.pointer("/customer/doc").and_then(document_text).is_some()
            && order.customer_document.is_none()
        {
            report.invalid_documents += 1;
        }
        if doc.pointer("/summary/total").is_some_and(|v| !v.is_null()) && order.total_value.is_none() {
            debug!(order_id = ?order.order_id, "Unparsable e-commerce order total");
            report.invalid_totals += 1;
        }
        orders.push(order);
    }

    report.records_emitted = orders.len();
    info!("E-commerce loaded: {} orders", orders.len());

    Ok(EcommerceLoad { orders, report })
}

/// E-commerce schema mapping: projects nested fields into the flat order shape.
/// Missing nested fields become `None`.
pub fn map_ecommerce_doc(doc: &Value) -> RawOrder {
    RawOrder {
        order_id: doc.get("_id").and_then(id_text),
        customer_document: normalize_document(
            doc.pointer("/customer/doc").and_then(document_text).as_deref(),
        ),
        seller_name: doc
            .pointer("/seller/name")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        total_value: doc.pointer("/summary/total").and_then(total_value),
        order_date: doc.pointer("/settings/createdAt").and_then(date_text),
        source: doc
            .pointer("/settings/source")
            .and_then(Value::as_str)
            .map(str::to_string),
    }
}

/// `"abc"`, `42` or `{"$oid": "abc"}`
fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => map.get("$oid").and_then(id_text),
        _ => None,
    }
}

/// Numeric totals, or numeric strings; anything else is missing
fn total_value(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    monetary(number)
}

/// Timestamp text, epoch milliseconds, or `{"$date": ...}`
fn date_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => n.as_i64().and_then(epoch_text),
        Value::Object(map) => {
            if let Some(inner) = map.get("$date") {
                date_text(inner)
            } else if let Some(Value::String(millis)) = map.get("$numberLong") {
                millis.parse::<i64>().ok().and_then(epoch_text)
            } else {
                None
            }
        }
        _ => None,
    }
}

fn epoch_text(millis: i64) -> Option<String> {
    from_epoch_millis(millis).map(|dt| dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn feed(docs: Value) -> Vec<u8> {
        serde_json::to_vec(&json!({ "docs": docs })).unwrap()
    }

    #[test]
    fn test_nested_fields_are_projected() {
        let bytes = feed(json!([{
            "_id": "a1",
            "customer": {"doc": "123.456.789-01"},
            "settings": {"createdAt": "2024-01-05T10:00:00Z", "source": "Vestishop"},
            "seller": {"name": "Natalia R."},
            "summary": {"total": 199.9}
        }]));

        let load = load_ecommerce(&bytes).unwrap();
        let order = &load.orders[0];
        assert_eq!(order.order_id.as_deref(), Some("a1"));
        assert_eq!(order.customer_document.as_deref(), Some("12345678901"));
        assert_eq!(order.order_date.as_deref(), Some("2024-01-05T10:00:00Z"));
        assert_eq!(order.source.as_deref(), Some("Vestishop"));
        assert_eq!(order.seller_name.as_deref(), Some("Natalia R."));
        assert_eq!(order.total_value, Some(199.9));
    }

    #[test]
    fn test_missing_nested_fields_degrade_to_none() {
        let bytes = feed(json!([{ "_id": "a2", "summary": {"total": "not a number"} }, 7]));

        let load = load_ecommerce(&bytes).unwrap();
        assert_eq!(load.orders.len(), 1);
        let order = &load.orders[0];
        assert_eq!(order.customer_document, None);
        assert_eq!(order.total_value, None);
        assert_eq!(order.order_date, None);
        assert_eq!(order.source, None);
        assert_eq!(load.report.invalid_totals, 1);
        assert_eq!(load.report.skipped_rows, 1);
    }

    #[test]
    fn test_numeric_strings_and_extended_json() {
        let bytes = feed(json!([{
            "_id": {"$oid": "65a0"},
            "customer": {"doc": 12345678901u64},
            "settings": {"createdAt": {"$date": 1_704_448_800_000i64}},
            "summary": {"total": "80.25"}
        }]));

        let order = &load_ecommerce(&bytes).unwrap().orders[0];
        assert_eq!(order.order_id.as_deref(), Some("65a0"));
        assert_eq!(order.customer_document.as_deref(), Some("12345678901"));
        assert_eq!(order.order_date.as_deref(), Some("2024-01-05T10:00:00"));
        assert_eq!(order.total_value, Some(80.25));
    }

    #[test]
    fn test_bare_array_is_accepted() {
        let bytes = serde_json::to_vec(&json!([{ "_id": 5 }])).unwrap();
        let load = load_ecommerce(&bytes).unwrap();
        assert_eq!(load.orders[0].order_id.as_deref(), Some("5"));
    }

    #[test]
    fn test_malformed_top_level_is_fatal() {
        assert!(matches!(
            load_ecommerce(b"{\"orders\": []}"),
            Err(PipelineError::MalformedSource { .. })
        ));
        assert!(matches!(load_ecommerce(b"\"docs\""), Err(PipelineError::MalformedSource { .. })));
        assert!(matches!(load_ecommerce(b"{not json"), Err(PipelineError::MalformedSource { .. })));
    }
}
