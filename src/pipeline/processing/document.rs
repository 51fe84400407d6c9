//! National document (CPF/CNPJ) normalization.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::constants::VALID_DOCUMENT_LENGTHS;

static NON_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^0-9]+").unwrap());

/// Strip every non-digit character and keep the result only when it has a
/// valid document length (11 or 14). Missing, empty or wrong-length input
/// yields `None`. Total and idempotent.
pub fn normalize_document(raw: Option<&str>) -> Option<String> {
    let digits = NON_DIGITS.replace_all(raw?, "");
    if VALID_DOCUMENT_LENGTHS.contains(&digits.len()) {
        Some(digits.into_owned())
    } else {
        None
    }
}

/// JSON documents may arrive as numbers; render integers without a fractional part
pub fn document_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                Some(u.to_string())
            } else if let Some(f) = n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0) {
                Some(format!("{:.0}", f))
            } else {
                Some(n.to_string())
            }
        }
        _ => None,
    }
}
