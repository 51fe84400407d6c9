//! KPI aggregation: enriched record set -> immutable snapshot.

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use crate::domain::EnrichedRecord;

/// Layout of monthly bucket keys (first instant of the UTC calendar month)
pub const MONTH_BUCKET_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiSnapshot {
    pub period_start: Option<String>,
    pub period_end: Option<String>,
    pub global_kpis: GlobalKpis,
    pub channel_kpis: ChannelKpis,
    pub seller_kpis: SellerKpis,
    pub customer_kpis: CustomerKpis,
    pub time_kpis: TimeKpis,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalKpis {
    pub total_revenue: f64,
    pub total_orders: usize,
    pub average_ticket: f64,
    pub total_customers: usize,
    pub new_customers: usize,
}

/// Keyed by channel name; consumers must accept keys beyond "physical"/"online"
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelKpis {
    pub revenue_by_channel: BTreeMap<String, f64>,
    pub orders_by_channel: BTreeMap<String, usize>,
}

impl ChannelKpis {
    /// Revenue per order for one channel; zero when the channel has no orders
    pub fn average_ticket(&self, channel: &str) -> f64 {
        let revenue = self.revenue_by_channel.get(channel).copied().unwrap_or(0.0);
        let orders = self.orders_by_channel.get(channel).copied().unwrap_or(0);
        ratio(revenue, orders)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SellerKpis {
    pub sales_by_seller: SellerRanking,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerKpis {
    pub customer_status_count: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeKpis {
    pub orders_by_weekday: BTreeMap<String, usize>,
    pub monthly_revenue: BTreeMap<String, f64>,
    pub monthly_orders: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SellerRevenue {
    pub seller: String,
    pub revenue: f64,
}

/// Seller revenue sorted descending. Serialized as a JSON object whose key
/// order is the ranking order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SellerRanking(pub Vec<SellerRevenue>);

impl SellerRanking {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SellerRevenue> {
        self.0.iter()
    }

    fn sort(&mut self) {
        // descending revenue, ties by seller name
        self.0.sort_by(|a, b| {
            b.revenue
                .total_cmp(&a.revenue)
                .then_with(|| a.seller.cmp(&b.seller))
        });
    }
}

impl Serialize for SellerRanking {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for entry in &self.0 {
            map.serialize_entry(&entry.seller, &entry.revenue)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for SellerRanking {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RankingVisitor;

        impl<'de> Visitor<'de> for RankingVisitor {
            type Value = SellerRanking;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of seller name to revenue")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((seller, revenue)) = access.next_entry::<String, f64>()? {
                    entries.push(SellerRevenue { seller, revenue });
                }
                let mut ranking = SellerRanking(entries);
                ranking.sort();
                Ok(ranking)
            }
        }

        deserializer.deserialize_map(RankingVisitor)
    }
}

/// Analysis period boundaries recovered from the metadata artifact
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisPeriod {
    pub start: Option<String>,
    pub end: Option<String>,
}

fn ratio(revenue: f64, orders: usize) -> f64 {
    if orders == 0 {
        0.0
    } else {
        revenue / orders as f64
    }
}

fn revenue_of(record: &EnrichedRecord) -> f64 {
    record.total_value.unwrap_or(0.0)
}

/// Compute every KPI from the enriched record set
pub fn aggregate(records: &[EnrichedRecord], top_sellers: usize, period: AnalysisPeriod) -> KpiSnapshot {
    KpiSnapshot {
        period_start: period.start,
        period_end: period.end,
        global_kpis: global_kpis(records),
        channel_kpis: channel_kpis(records),
        seller_kpis: SellerKpis {
            sales_by_seller: seller_ranking(records, Some(top_sellers)),
        },
        customer_kpis: CustomerKpis {
            customer_status_count: customer_status_count(records),
        },
        time_kpis: TimeKpis {
            orders_by_weekday: orders_by_weekday(records),
            monthly_revenue: monthly_revenue(records),
            monthly_orders: monthly_orders(records),
        },
    }
}

pub fn global_kpis(records: &[EnrichedRecord]) -> GlobalKpis {
    let total_revenue: f64 = records.iter().map(revenue_of).sum();
    let total_orders = distinct_orders(records.iter());

    let total_customers = records
        .iter()
        .filter_map(|r| r.customer_document.as_deref())
        .collect::<HashSet<_>>()
        .len();

    let new_customers = records
        .iter()
        .filter(|r| r.is_first_purchase)
        .filter_map(|r| r.customer_document.as_deref())
        .collect::<HashSet<_>>()
        .len();

    GlobalKpis {
        total_revenue,
        total_orders,
        average_ticket: ratio(total_revenue, total_orders),
        total_customers,
        new_customers,
    }
}

/// Order identity: ids are only unique within their source
type OrderKey<'a> = (Option<&'a str>, &'a str);

fn order_key(record: &EnrichedRecord) -> Option<OrderKey<'_>> {
    record
        .order_id
        .as_deref()
        .map(|id| (record.source.as_deref(), id))
}

fn distinct_orders<'a>(records: impl Iterator<Item = &'a EnrichedRecord>) -> usize {
    records
        .filter_map(order_key)
        .collect::<HashSet<_>>()
        .len()
}

pub fn channel_kpis(records: &[EnrichedRecord]) -> ChannelKpis {
    let mut revenue: BTreeMap<String, f64> = BTreeMap::new();
    let mut orders: BTreeMap<String, HashSet<OrderKey<'_>>> = BTreeMap::new();

    for record in records {
        let channel = record.sales_channel.as_str();
        *revenue.entry(channel.to_string()).or_insert(0.0) += revenue_of(record);
        let ids = orders.entry(channel.to_string()).or_default();
        if let Some(key) = order_key(record) {
            ids.insert(key);
        }
    }

    ChannelKpis {
        revenue_by_channel: revenue,
        orders_by_channel: orders.into_iter().map(|(k, ids)| (k, ids.len())).collect(),
    }
}

/// Revenue per canonical seller, descending; `limit` of `None` keeps every seller
pub fn seller_ranking(records: &[EnrichedRecord], limit: Option<usize>) -> SellerRanking {
    let mut totals: HashMap<&str, f64> = HashMap::new();
    for record in records {
        if let Some(seller) = record.seller.as_deref() {
            *totals.entry(seller).or_insert(0.0) += revenue_of(record);
        }
    }

    let mut ranking = SellerRanking(
        totals
            .into_iter()
            .map(|(seller, revenue)| SellerRevenue {
                seller: seller.to_string(),
                revenue,
            })
            .collect(),
    );
    ranking.sort();
    if let Some(limit) = limit {
        ranking.0.truncate(limit);
    }
    ranking
}

/// One contribution per distinct customer document (first record seen).
/// A missing document is one more key, so all undocumented orders add a
/// single count between them.
pub fn customer_status_count(records: &[EnrichedRecord]) -> BTreeMap<String, usize> {
    let mut seen: HashSet<Option<&str>> = HashSet::new();
    let mut counts = BTreeMap::new();
    for record in records {
        if seen.insert(record.customer_document.as_deref()) {
            *counts.entry(record.customer_status.as_str().to_string()).or_insert(0) += 1;
        }
    }
    counts
}

pub fn orders_by_weekday(records: &[EnrichedRecord]) -> BTreeMap<String, usize> {
    let mut by_day: BTreeMap<String, HashSet<OrderKey<'_>>> = BTreeMap::new();
    for record in records {
        if let (Some(day), Some(key)) = (record.order_weekday.as_deref(), order_key(record)) {
            by_day.entry(day.to_string()).or_default().insert(key);
        }
    }
    by_day.into_iter().map(|(day, ids)| (day, ids.len())).collect()
}

/// First instant of the calendar month containing `at`
pub fn month_bucket(at: NaiveDateTime) -> NaiveDate {
    NaiveDate::from_ymd_opt(at.year(), at.month(), 1).unwrap_or(at.date())
}

fn next_month(month: NaiveDate) -> Option<NaiveDate> {
    let (year, m) = if month.month() == 12 {
        (month.year() + 1, 1)
    } else {
        (month.year(), month.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, m, 1)
}

fn bucket_key(month: NaiveDate) -> String {
    month
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.format(MONTH_BUCKET_FORMAT).to_string())
        .unwrap_or_else(|| month.to_string())
}

/// Every month between the first and last dated record, empty months included
fn month_range(records: &[EnrichedRecord]) -> Vec<NaiveDate> {
    let buckets: Vec<NaiveDate> = records
        .iter()
        .filter_map(|r| r.order_date.map(month_bucket))
        .collect();
    let (Some(first), Some(last)) = (buckets.iter().min().copied(), buckets.iter().max().copied()) else {
        return Vec::new();
    };

    let mut months = Vec::new();
    let mut current = Some(first);
    while let Some(month) = current.filter(|m| *m <= last) {
        months.push(month);
        current = next_month(month);
    }
    months
}

pub fn monthly_revenue(records: &[EnrichedRecord]) -> BTreeMap<String, f64> {
    let mut sums: HashMap<NaiveDate, f64> = HashMap::new();
    for record in records {
        if let Some(date) = record.order_date {
            *sums.entry(month_bucket(date)).or_insert(0.0) += revenue_of(record);
        }
    }

    month_range(records)
        .into_iter()
        .map(|month| (bucket_key(month), sums.get(&month).copied().unwrap_or(0.0)))
        .collect()
}

pub fn monthly_orders(records: &[EnrichedRecord]) -> BTreeMap<String, usize> {
    let mut ids: HashMap<NaiveDate, HashSet<OrderKey<'_>>> = HashMap::new();
    for record in records {
        if let (Some(date), Some(key)) = (record.order_date, order_key(record)) {
            ids.entry(month_bucket(date)).or_default().insert(key);
        }
    }

    month_range(records)
        .into_iter()
        .map(|month| (bucket_key(month), ids.get(&month).map_or(0, HashSet::len)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CustomerStatus, SalesChannel};

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(12, 0, 0).unwrap()
    }

    struct R {
        id: &'static str,
        doc: Option<&'static str>,
        total: Option<f64>,
        date: Option<NaiveDateTime>,
        channel: SalesChannel,
        source: Option<&'static str>,
        seller: Option<&'static str>,
        status: CustomerStatus,
        first: bool,
    }

    impl R {
        fn new(id: &'static str, total: f64, date: NaiveDateTime) -> Self {
            Self {
                id,
                doc: None,
                total: Some(total),
                date: Some(date),
                channel: SalesChannel::Physical,
                source: None,
                seller: None,
                status: CustomerStatus::Unknown,
                first: false,
            }
        }

        fn build(self) -> EnrichedRecord {
            EnrichedRecord {
                order_id: Some(self.id.to_string()),
                customer_document: self.doc.map(str::to_string),
                seller_name: self.seller.map(str::to_string),
                total_value: self.total,
                order_date: self.date,
                source: self.source.map(str::to_string),
                customer_id: None,
                name: None,
                email: None,
                status: None,
                buy: None,
                crm_seller_name: None,
                crm_created_at: None,
                order_year: self.date.map(|d| d.year()),
                order_month: self.date.map(|d| d.month()),
                order_day: self.date.map(|d| d.day()),
                order_weekday: self
                    .date
                    .map(|d| crate::pipeline::processing::enrich::weekday_name(d.weekday()).to_string()),
                order_hour: Some(12),
                sales_channel: self.channel,
                customer_status: self.status,
                first_order_date: None,
                is_first_purchase: self.first,
                seller: self.seller.map(str::to_string),
            }
        }
    }

    fn sample() -> Vec<EnrichedRecord> {
        vec![
            R { doc: Some("11111111111"), seller: Some("NATALIA"), status: CustomerStatus::Active, first: true, ..R::new("1", 100.5, at(2024, 1, 5)) }.build(),
            R { doc: Some("11111111111"), seller: Some("NATALIA"), status: CustomerStatus::Active, ..R::new("2", 50.25, at(2024, 3, 2)) }.build(),
            R { doc: Some("22222222222"), seller: Some("KELI"), channel: SalesChannel::Online, first: true, ..R::new("a", 200.0, at(2024, 3, 9)) }.build(),
            R { doc: None, total: None, channel: SalesChannel::Online, ..R::new("b", 0.0, at(2024, 1, 20)) }.build(),
        ]
    }

    #[test]
    fn test_global_kpis() {
        let kpis = global_kpis(&sample());
        assert_eq!(kpis.total_revenue, 350.75);
        assert_eq!(kpis.total_orders, 4);
        assert_eq!(kpis.average_ticket, 350.75 / 4.0);
        assert_eq!(kpis.total_customers, 2);
        assert_eq!(kpis.new_customers, 2);
    }

    #[test]
    fn test_empty_set_has_zero_average_ticket() {
        let kpis = global_kpis(&[]);
        assert_eq!(kpis.total_orders, 0);
        assert_eq!(kpis.average_ticket, 0.0);
        assert_eq!(kpis.total_revenue, 0.0);
    }

    #[test]
    fn test_channel_totals_add_up() {
        let records = sample();
        let global = global_kpis(&records);
        let channels = channel_kpis(&records);

        let revenue: f64 = channels.revenue_by_channel.values().sum();
        let orders: usize = channels.orders_by_channel.values().sum();
        assert_eq!(revenue, global.total_revenue);
        assert_eq!(orders, global.total_orders);
        assert_eq!(channels.revenue_by_channel["physical"], 150.75);
        assert_eq!(channels.orders_by_channel["online"], 2);
    }

    #[test]
    fn test_channel_average_ticket_handles_missing_channel() {
        let channels = channel_kpis(&sample());
        assert_eq!(channels.average_ticket("online"), 100.0);
        assert_eq!(channels.average_ticket("marketplace"), 0.0);
    }

    #[test]
    fn test_duplicate_order_ids_count_once() {
        let records = vec![
            R::new("1", 10.0, at(2024, 1, 1)).build(),
            R::new("1", 10.0, at(2024, 1, 1)).build(),
        ];
        let kpis = global_kpis(&records);
        assert_eq!(kpis.total_orders, 1);
        assert_eq!(kpis.total_revenue, 20.0);
    }

    #[test]
    fn test_same_id_in_two_sources_is_two_orders() {
        let records = vec![
            R { source: Some("ERP_Fisica"), ..R::new("1", 10.0, at(2024, 1, 5)) }.build(),
            R {
                source: Some("Vestishop"),
                channel: SalesChannel::Online,
                ..R::new("1", 20.0, at(2024, 1, 5))
            }
            .build(),
        ];

        let global = global_kpis(&records);
        let channels = channel_kpis(&records);
        assert_eq!(global.total_orders, 2);
        assert_eq!(channels.orders_by_channel.values().sum::<usize>(), global.total_orders);
        assert_eq!(orders_by_weekday(&records).get("Friday"), Some(&2));
        assert_eq!(monthly_orders(&records)["2024-01-01 00:00:00"], 2);
    }

    #[test]
    fn test_seller_ranking_is_descending_and_truncated() {
        let records: Vec<EnrichedRecord> = (0..12)
            .map(|i| {
                let seller: &'static str = Box::leak(format!("SELLER{:02}", i).into_boxed_str());
                let id: &'static str = Box::leak(format!("o{}", i).into_boxed_str());
                R { seller: Some(seller), ..R::new(id, (i * 10) as f64, at(2024, 1, 1)) }.build()
            })
            .collect();

        let top = seller_ranking(&records, Some(10));
        assert_eq!(top.len(), 10);
        assert_eq!(top.0[0].seller, "SELLER11");
        assert!(top.0.windows(2).all(|w| w[0].revenue >= w[1].revenue));

        let full = seller_ranking(&records, None);
        assert_eq!(full.len(), 12);
    }

    #[test]
    fn test_ranking_ties_break_by_name() {
        let records = vec![
            R { seller: Some("ZE"), ..R::new("1", 10.0, at(2024, 1, 1)) }.build(),
            R { seller: Some("ANA"), ..R::new("2", 10.0, at(2024, 1, 1)) }.build(),
        ];
        let ranking = seller_ranking(&records, None);
        let names: Vec<&str> = ranking.iter().map(|s| s.seller.as_str()).collect();
        assert_eq!(names, vec!["ANA", "ZE"]);
    }

    #[test]
    fn test_status_counts_once_per_customer() {
        let counts = customer_status_count(&sample());
        assert_eq!(counts.get("active"), Some(&1));
        // "22222222222" plus one contribution for the undocumented order
        assert_eq!(counts.get("unknown"), Some(&2));
        assert_eq!(counts.values().sum::<usize>(), global_kpis(&sample()).total_customers + 1);
    }

    #[test]
    fn test_undocumented_orders_count_as_one_status_entry() {
        let records = vec![
            R { doc: Some("11111111111"), status: CustomerStatus::Active, ..R::new("1", 1.0, at(2024, 1, 1)) }.build(),
            R::new("2", 1.0, at(2024, 1, 2)).build(),
            R::new("3", 1.0, at(2024, 1, 3)).build(),
        ];
        let counts = customer_status_count(&records);
        assert_eq!(counts.get("active"), Some(&1));
        assert_eq!(counts.get("unknown"), Some(&1));
        assert_eq!(counts.len(), 2);
    }

    #[test]
    fn test_weekday_distribution() {
        // 2024-01-05 Friday, 2024-03-02 Saturday, 2024-03-09 Saturday, 2024-01-20 Saturday
        let days = orders_by_weekday(&sample());
        assert_eq!(days.get("Friday"), Some(&1));
        assert_eq!(days.get("Saturday"), Some(&3));
    }

    #[test]
    fn test_monthly_series_fill_empty_months() {
        let records = sample();
        let revenue = monthly_revenue(&records);
        let orders = monthly_orders(&records);

        let keys: Vec<&str> = revenue.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec!["2024-01-01 00:00:00", "2024-02-01 00:00:00", "2024-03-01 00:00:00"]
        );
        assert_eq!(revenue["2024-01-01 00:00:00"], 100.5);
        assert_eq!(revenue["2024-02-01 00:00:00"], 0.0);
        assert_eq!(revenue["2024-03-01 00:00:00"], 250.25);
        assert_eq!(orders["2024-01-01 00:00:00"], 2);
        assert_eq!(orders["2024-02-01 00:00:00"], 0);
    }

    #[test]
    fn test_monthly_series_cross_year_boundary() {
        let records = vec![
            R::new("1", 1.0, at(2023, 11, 30)).build(),
            R::new("2", 2.0, at(2024, 2, 1)).build(),
        ];
        assert_eq!(monthly_orders(&records).len(), 4);
    }

    #[test]
    fn test_snapshot_serializes_with_stable_keys() {
        let snapshot = aggregate(
            &sample(),
            10,
            AnalysisPeriod {
                start: Some("2024-01-05".to_string()),
                end: Some("2024-03-09".to_string()),
            },
        );
        let json = serde_json::to_value(&snapshot).unwrap();

        assert_eq!(json["period_start"], "2024-01-05");
        assert_eq!(json["global_kpis"]["total_orders"], 4);
        assert_eq!(json["seller_kpis"]["sales_by_seller"]["NATALIA"], 150.75);
        assert!(json["channel_kpis"]["revenue_by_channel"].is_object());
        assert!(json["customer_kpis"]["customer_status_count"].is_object());
        assert!(json["time_kpis"]["monthly_orders"].is_object());

        let text = serde_json::to_string(&snapshot).unwrap();
        let back: KpiSnapshot = serde_json::from_str(&text).unwrap();
        assert_eq!(back, snapshot);
    }

    #[test]
    fn test_ranking_serialization_keeps_rank_order() {
        let ranking = SellerRanking(vec![
            SellerRevenue { seller: "ZE".to_string(), revenue: 30.0 },
            SellerRevenue { seller: "ANA".to_string(), revenue: 10.0 },
        ]);
        assert_eq!(serde_json::to_string(&ranking).unwrap(), r#"{"ZE":30.0,"ANA":10.0}"#);
    }
}
