//! Codecs for the artifacts handed from one stage to the next.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::Result;
use crate::pipeline::processing::aggregate::AnalysisPeriod;

/// Render records as a comma-separated table. The header is written from
/// `columns` so an empty record set still produces a readable artifact.
pub fn encode_records<T: Serialize>(columns: &[&str], records: &[T]) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());

    writer.write_record(columns)?;
    for record in records {
        writer.serialize(record)?;
    }

    writer
        .into_inner()
        .map_err(|e| crate::error::PipelineError::Io(e.into_error()))
}

/// Read back a table written by [`encode_records`]
pub fn decode_records<T: DeserializeOwned>(bytes: &[u8]) -> Result<Vec<T>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(bytes);

    let mut records = Vec::new();
    for row in reader.deserialize() {
        records.push(row?);
    }
    Ok(records)
}

/// Row counts and period boundaries shared between stages.
///
/// Each stage fills in its own keys; keys it does not know about are kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_orders: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_customers_in_crm: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_integrated_records: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_dataset_columns: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_order_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_order_date: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl RunMetadata {
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn period(&self) -> AnalysisPeriod {
        AnalysisPeriod {
            start: self.min_order_date.clone(),
            end: self.max_order_date.clone(),
        }
    }
}

pub fn column_names(columns: &[&str]) -> Vec<String> {
    columns.iter().map(|c| c.to_string()).collect()
}
