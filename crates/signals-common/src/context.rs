//! The merged context handed to the narrative and presentation layers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::summary::ForecastSummary;

/// Summed KPI values for one store-day, keyed by metric name.
pub type KpiTotals = BTreeMap<String, f64>;

/// Peer medians across all stores for the current week.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeerMedian {
    /// Median visitor-weighted conversion rate
    pub conv: Option<f64>,
    /// Median sales per visitor
    pub spv: Option<f64>,
}

/// Consumer confidence indicator from the statistics office.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceIndex {
    pub consumer_confidence: Option<f64>,
    pub period: Option<String>,
}

/// Everything known about a store for one enrichment request.
///
/// Signals that could not be obtained serialize as `null` (or an empty
/// `news` list); the object always carries every key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentContext {
    pub store: String,
    pub yesterday: KpiTotals,
    pub day_before: KpiTotals,
    pub peer_median: PeerMedian,
    pub weather: Option<ForecastSummary>,
    pub cci: Option<ConfidenceIndex>,
    pub news: Vec<String>,
    pub holiday: Option<String>,
}

impl EnrichmentContext {
    /// Number of external signals that produced something.
    pub fn signal_count(&self) -> usize {
        [
            self.weather.is_some(),
            self.cci.is_some(),
            !self.news.is_empty(),
            self.holiday.is_some(),
        ]
        .iter()
        .filter(|present| **present)
        .count()
    }

    pub fn to_json(&self) -> serde_json::Value {
        // Only maps with string keys and plain values: serialization cannot fail.
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_context_keeps_all_keys() {
        let ctx = EnrichmentContext {
            store: "Utrecht".to_string(),
            ..Default::default()
        };
        let json = ctx.to_json();

        for key in [
            "store",
            "yesterday",
            "day_before",
            "peer_median",
            "weather",
            "cci",
            "news",
            "holiday",
        ] {
            assert!(json.get(key).is_some(), "missing key {}", key);
        }
        assert!(json["weather"].is_null());
        assert!(json["cci"].is_null());
        assert!(json["holiday"].is_null());
        assert_eq!(json["news"], serde_json::json!([]));
        assert_eq!(ctx.signal_count(), 0);
    }

    #[test]
    fn test_signal_count() {
        let ctx = EnrichmentContext {
            news: vec!["Headline".to_string()],
            holiday: Some("Koningsdag".to_string()),
            ..Default::default()
        };
        assert_eq!(ctx.signal_count(), 2);
    }
}
