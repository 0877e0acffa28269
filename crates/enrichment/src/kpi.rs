//! Store KPI rollups over daily metric rows.
//!
//! Rows come from the analytics API already decoded; this module only
//! aggregates them.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use signals_common::{KpiTotals, PeerMedian};

/// Metrics summed per day.
pub const METRICS: [&str; 4] = ["count_in", "conversion_rate", "turnover", "sales_per_visitor"];

/// One store-day (or store-interval) of metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiRow {
    #[serde(alias = "shop_id")]
    pub store_id: u64,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    /// Used when `date` is absent.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub count_in: Option<f64>,
    #[serde(default)]
    pub conversion_rate: Option<f64>,
    #[serde(default)]
    pub turnover: Option<f64>,
    #[serde(default)]
    pub sales_per_visitor: Option<f64>,
}

impl KpiRow {
    pub fn effective_date(&self) -> Option<NaiveDate> {
        self.date.or_else(|| self.timestamp.map(|t| t.date_naive()))
    }

    pub fn metric(&self, name: &str) -> Option<f64> {
        let value = match name {
            "count_in" => self.count_in,
            "conversion_rate" => self.conversion_rate,
            "turnover" => self.turnover,
            "sales_per_visitor" => self.sales_per_visitor,
            _ => None,
        };
        value.filter(|v| v.is_finite())
    }
}

/// Totals of the two most recent complete days.
#[derive(Debug, Clone, PartialEq)]
pub struct DayComparison {
    pub yesterday_date: NaiveDate,
    pub yesterday: KpiTotals,
    pub day_before_date: NaiveDate,
    pub day_before: KpiTotals,
}

/// Compare the last two distinct days before `today` for one store.
///
/// "Yesterday" is the most recent date with rows, not necessarily the
/// calendar day before `today`. Returns `None` with fewer than two dates.
pub fn day_comparison(rows: &[KpiRow], store_id: u64, today: NaiveDate) -> Option<DayComparison> {
    let mut by_date: BTreeMap<NaiveDate, Vec<&KpiRow>> = BTreeMap::new();
    for row in rows.iter().filter(|r| r.store_id == store_id) {
        if let Some(date) = row.effective_date().filter(|d| *d < today) {
            by_date.entry(date).or_default().push(row);
        }
    }

    let mut days = by_date.iter().rev();
    let (yesterday_date, y_rows) = days.next()?;
    let (day_before_date, b_rows) = days.next()?;
    Some(DayComparison {
        yesterday_date: *yesterday_date,
        yesterday: totals(y_rows),
        day_before_date: *day_before_date,
        day_before: totals(b_rows),
    })
}

/// Sum every metric; missing values count as zero.
pub fn totals(rows: &[&KpiRow]) -> KpiTotals {
    METRICS
        .iter()
        .map(|m| {
            let sum = rows.iter().filter_map(|r| r.metric(m)).sum();
            (m.to_string(), sum)
        })
        .collect()
}

/// Period aggregates of one store.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StorePeriod {
    pub store_id: u64,
    pub count_in: f64,
    pub turnover: f64,
    /// Visitor-weighted conversion rate
    pub conversion_rate: Option<f64>,
    pub sales_per_visitor: Option<f64>,
}

/// Aggregate rows per store.
///
/// Conversion is weighted by visitors (`Σ(conv·count_in) / Σcount_in`) and
/// sales per visitor is `Σturnover / Σcount_in`; both are `None` for a store
/// without visitors.
pub fn store_periods(rows: &[KpiRow]) -> Vec<StorePeriod> {
    let mut groups: BTreeMap<u64, Vec<&KpiRow>> = BTreeMap::new();
    for row in rows {
        groups.entry(row.store_id).or_default().push(row);
    }

    groups
        .into_iter()
        .map(|(store_id, rows)| {
            let count_in: f64 = rows.iter().filter_map(|r| r.metric("count_in")).sum();
            let turnover: f64 = rows.iter().filter_map(|r| r.metric("turnover")).sum();
            let weighted: f64 = rows
                .iter()
                .filter_map(|r| Some(r.metric("conversion_rate")? * r.metric("count_in")?))
                .sum();
            let ratio = |num: f64| (count_in > 0.0).then(|| num / count_in);
            StorePeriod {
                store_id,
                count_in,
                turnover,
                conversion_rate: ratio(weighted),
                sales_per_visitor: ratio(turnover),
            }
        })
        .collect()
}

/// Median conversion and sales per visitor across stores.
pub fn peer_medians(rows: &[KpiRow]) -> PeerMedian {
    let periods = store_periods(rows);
    PeerMedian {
        conv: median(periods.iter().filter_map(|p| p.conversion_rate).collect()),
        spv: median(periods.iter().filter_map(|p| p.sales_per_visitor).collect()),
    }
}

/// Median of finite values; the mean of the middle pair for even counts.
pub fn median(mut values: Vec<f64>) -> Option<f64> {
    values.retain(|v| v.is_finite());
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}
