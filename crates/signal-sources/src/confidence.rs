//! Consumer confidence indicator from the statistics office.

use serde_json::Value;
use tracing::instrument;

use signals_common::{ConfidenceIndex, SignalError, SignalResult};

use crate::http::{HttpClient, Timeouts};

#[derive(Debug, Clone)]
pub struct ConfidenceClient {
    http: HttpClient,
    url: Option<String>,
    timeouts: Timeouts,
}

impl ConfidenceClient {
    pub fn new(http: HttpClient, url: Option<String>, timeouts: Timeouts) -> Self {
        Self {
            http,
            url: url.filter(|u| !u.trim().is_empty()),
            timeouts,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.url.is_some()
    }

    #[instrument(skip(self))]
    pub async fn fetch(&self) -> SignalResult<ConfidenceIndex> {
        let url = self
            .url
            .as_deref()
            .ok_or_else(|| SignalError::ConfigurationMissing("confidence feed URL".into()))?;
        let request = self.http.get(url, self.timeouts.metadata());
        let js = self.http.json(url, request).await?;
        parse_confidence(&js)
    }
}

/// Read the indicator from the first row of the `value` array.
///
/// The indicator is taken from `ConConfidence`, else `Value`; either may be a
/// number or a numeric string.
pub fn parse_confidence(js: &Value) -> SignalResult<ConfidenceIndex> {
    let row = js
        .get("value")
        .and_then(Value::as_array)
        .and_then(|rows| rows.first())
        .ok_or_else(|| SignalError::EmptyListing("confidence feed has no rows".into()))?;

    let consumer_confidence = ["ConConfidence", "Value"]
        .iter()
        .find_map(|k| row.get(*k).and_then(number));
    let period = row
        .get("Periods")
        .and_then(Value::as_str)
        .map(|p| p.trim().to_string());

    Ok(ConfidenceIndex {
        consumer_confidence,
        period,
    })
}

fn number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
