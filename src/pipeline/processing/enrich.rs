use chrono::{Datelike, NaiveDateTime, Timelike, Weekday};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::info;

use crate::domain::{CustomerStatus, EnrichedRecord, IntegratedRecord, SalesChannel};

/// Seller alias table (alias -> canonical name), keyed by normalized name
#[derive(Debug, Clone, Default)]
pub struct SellerAliases {
    aliases: HashMap<String, String>,
}

impl SellerAliases {
    /// Build from configuration; keys are normalized so config entries in any case still match
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let aliases = entries
            .into_iter()
            .filter_map(|(alias, canonical)| {
                normalize_seller(alias.as_ref()).map(|key| (key, canonical.into()))
            })
            .collect();
        Self { aliases }
    }

    pub fn from_config(aliases: &BTreeMap<String, String>) -> Self {
        Self::new(aliases.iter().map(|(k, v)| (k.as_str(), v.clone())))
    }

    /// Uppercase + trim, then one alias lookup. Unmapped names pass through.
    pub fn canonicalize(&self, raw: Option<&str>) -> Option<String> {
        let key = normalize_seller(raw?)?;
        Some(self.aliases.get(&key).cloned().unwrap_or(key))
    }
}

fn normalize_seller(raw: &str) -> Option<String> {
    let key = raw.trim().to_uppercase();
    if key.is_empty() {
        None
    } else {
        Some(key)
    }
}

/// Locale-independent weekday name
pub fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Earliest order instant per customer document, across the whole set
pub fn first_purchase_dates(records: &[IntegratedRecord]) -> HashMap<String, NaiveDateTime> {
    let mut firsts: HashMap<String, NaiveDateTime> = HashMap::new();
    for record in records {
        if let (Some(doc), Some(date)) = (&record.customer_document, record.order_date) {
            firsts
                .entry(doc.clone())
                .and_modify(|first| {
                    if date < *first {
                        *first = date;
                    }
                })
                .or_insert(date);
        }
    }
    firsts
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EnrichSummary {
    pub records: usize,
    pub first_purchases: usize,
    pub undated_records: usize,
    pub physical_orders: usize,
    pub online_orders: usize,
}

/// Derives calendar, channel, status, first-purchase and seller fields
pub struct DefaultEnricher {
    pub aliases: SellerAliases,
    /// Source tag that marks an order as physical
    pub physical_source_label: String,
}

impl DefaultEnricher {
    pub fn new(aliases: SellerAliases, physical_source_label: impl Into<String>) -> Self {
        Self {
            aliases,
            physical_source_label: physical_source_label.into(),
        }
    }

    /// Enrich the whole integrated set. A record is a first purchase when its
    /// instant equals its customer's minimum; simultaneous orders all qualify.
    pub fn enrich(&self, records: Vec<IntegratedRecord>) -> (Vec<EnrichedRecord>, EnrichSummary) {
        let firsts = first_purchase_dates(&records);
        let mut summary = EnrichSummary::default();

        let enriched: Vec<EnrichedRecord> = records
            .into_iter()
            .map(|record| {
                let first_order_date = record
                    .customer_document
                    .as_ref()
                    .and_then(|doc| firsts.get(doc).copied());
                let record = self.enrich_record(record, first_order_date);

                if record.is_first_purchase {
                    summary.first_purchases += 1;
                }
                if record.order_date.is_none() {
                    summary.undated_records += 1;
                }
                match record.sales_channel {
                    SalesChannel::Physical => summary.physical_orders += 1,
                    SalesChannel::Online => summary.online_orders += 1,
                }
                record
            })
            .collect();

        summary.records = enriched.len();
        info!(
            "Enriched {} records ({} first purchases, {} without timestamp)",
            summary.records, summary.first_purchases, summary.undated_records
        );

        (enriched, summary)
    }

    fn enrich_record(
        &self,
        record: IntegratedRecord,
        first_order_date: Option<NaiveDateTime>,
    ) -> EnrichedRecord {
        let date = record.order_date;
        let is_first_purchase = matches!((date, first_order_date), (Some(d), Some(f)) if d == f);
        let sales_channel =
            SalesChannel::classify(record.source.as_deref(), &self.physical_source_label);
        let seller = self.aliases.canonicalize(record.seller_name.as_deref());

        EnrichedRecord {
            order_year: date.map(|d| d.year()),
            order_month: date.map(|d| d.month()),
            order_day: date.map(|d| d.day()),
            order_weekday: date.map(|d| weekday_name(d.weekday()).to_string()),
            order_hour: date.map(|d| d.hour()),
            sales_channel,
            customer_status: record.status.unwrap_or(CustomerStatus::Unknown),
            first_order_date,
            is_first_purchase,
            seller,
            order_id: record.order_id,
            customer_document: record.customer_document,
            seller_name: record.seller_name,
            total_value: record.total_value,
            order_date: record.order_date,
            source: record.source,
            customer_id: record.customer_id,
            name: record.name,
            email: record.email,
            status: record.status,
            buy: record.buy,
            crm_seller_name: record.crm_seller_name,
            crm_created_at: record.crm_created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DEFAULT_SELLER_ALIASES;
    use crate::domain::Order;
    use chrono::NaiveDate;

    fn at(d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap().and_hms_opt(h, 0, 0).unwrap()
    }

    fn record(id: &str, doc: Option<&str>, date: Option<NaiveDateTime>, source: &str) -> IntegratedRecord {
        IntegratedRecord::join(
            Order {
                order_id: Some(id.to_string()),
                customer_document: doc.map(str::to_string),
                seller_name: Some(" Natalia R. ".to_string()),
                total_value: Some(10.0),
                order_date: date,
                source: Some(source.to_string()),
            },
            None,
        )
    }

    fn enricher() -> DefaultEnricher {
        DefaultEnricher::new(SellerAliases::new(DEFAULT_SELLER_ALIASES.iter().copied()), "ERP_Fisica")
    }

    #[test]
    fn test_seller_names_share_one_key() {
        let aliases = SellerAliases::new(DEFAULT_SELLER_ALIASES.iter().copied());
        for raw in ["NATALIA", "natalia", " Natalia R. "] {
            assert_eq!(aliases.canonicalize(Some(raw)).as_deref(), Some("NATALIA"));
        }
        assert_eq!(aliases.canonicalize(Some("  Carla ")).as_deref(), Some("CARLA"));
        assert_eq!(aliases.canonicalize(Some("   ")), None);
        assert_eq!(aliases.canonicalize(None), None);
    }

    #[test]
    fn test_alias_keys_from_config_are_normalized() {
        let aliases = SellerAliases::new([(" bia ", "BEATRIZ")]);
        assert_eq!(aliases.canonicalize(Some("Bia")).as_deref(), Some("BEATRIZ"));
    }

    #[test]
    fn test_calendar_fields() {
        // 2024-01-05 was a Friday
        let (enriched, _) = enricher().enrich(vec![record("1", None, Some(at(5, 14)), "ERP_Fisica")]);
        let r = &enriched[0];
        assert_eq!(r.order_year, Some(2024));
        assert_eq!(r.order_month, Some(1));
        assert_eq!(r.order_day, Some(5));
        assert_eq!(r.order_weekday.as_deref(), Some("Friday"));
        assert_eq!(r.order_hour, Some(14));
        assert_eq!(r.sales_channel, SalesChannel::Physical);
        assert_eq!(r.customer_status, CustomerStatus::Unknown);
        assert_eq!(r.seller.as_deref(), Some("NATALIA"));
        assert_eq!(r.seller_name.as_deref(), Some(" Natalia R. "));
    }

    #[test]
    fn test_first_purchase_is_minimum_instant_per_document() {
        let doc = Some("12345678901");
        let records = vec![
            record("late", doc, Some(at(9, 10)), "Vestishop"),
            record("early", doc, Some(at(2, 10)), "ERP_Fisica"),
            record("other", Some("98765432100"), Some(at(3, 10)), "Vestishop"),
        ];

        let (enriched, summary) = enricher().enrich(records);
        let flags: Vec<(&str, bool)> = enriched
            .iter()
            .map(|r| (r.order_id.as_deref().unwrap(), r.is_first_purchase))
            .collect();
        assert_eq!(flags, vec![("late", false), ("early", true), ("other", true)]);
        assert_eq!(enriched[0].first_order_date, Some(at(2, 10)));
        assert_eq!(summary.first_purchases, 2);
    }

    #[test]
    fn test_simultaneous_first_orders_are_all_flagged() {
        let doc = Some("12345678901");
        let records = vec![
            record("a", doc, Some(at(2, 10)), "Vestishop"),
            record("b", doc, Some(at(2, 10)), "ERP_Fisica"),
        ];
        let (enriched, _) = enricher().enrich(records);
        assert!(enriched.iter().all(|r| r.is_first_purchase));
    }

    #[test]
    fn test_orders_without_document_or_date_are_never_first() {
        let records = vec![
            record("nodoc", None, Some(at(2, 10)), "Vestishop"),
            record("nodate", Some("12345678901"), None, "Vestishop"),
        ];
        let (enriched, summary) = enricher().enrich(records);
        assert!(enriched.iter().all(|r| !r.is_first_purchase));
        assert_eq!(summary.undated_records, 1);
        assert_eq!(enriched[1].order_weekday, None);
    }
}
