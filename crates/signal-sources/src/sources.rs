//! Source traits used by the aggregator.
//!
//! Trait methods never fail: each implementation swallows its own errors,
//! logs them and reports "nothing" (`None` or an empty collection).

use async_trait::async_trait;
use metrics::counter;
use tracing::{debug, warn};

use signals_common::{ConfidenceIndex, ForecastSummary, GeoPoint, SignalError, SignalResult};

use crate::confidence::ConfidenceClient;
use crate::holidays::{HolidayClient, HolidayMap};
use crate::news::NewsClient;
use crate::openweather::OpenWeatherClient;

/// Where a weather summary is wanted.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherRequest {
    /// Store coordinates, when known
    pub point: Option<GeoPoint>,
    /// Four-digit postcode
    pub postcode4: String,
}

#[async_trait]
pub trait WeatherSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn summary(&self, request: &WeatherRequest) -> Option<ForecastSummary>;
}

/// Postcode to coordinates, for stores without a known location.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn locate(&self, postcode4: &str) -> Option<GeoPoint>;
}

#[async_trait]
pub trait ConfidenceSource: Send + Sync {
    async fn confidence(&self) -> Option<ConfidenceIndex>;
}

#[async_trait]
pub trait NewsSource: Send + Sync {
    async fn headlines(&self) -> Vec<String>;
}

#[async_trait]
pub trait HolidaySource: Send + Sync {
    async fn holidays(&self) -> HolidayMap;
}

/// Log a failed signal and turn it into `None`.
///
/// Unconfigured sources log at debug; anything else is a warning and is
/// counted in `enrichment_signal_unavailable_total`.
pub fn soft<T>(signal: &'static str, result: SignalResult<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            report(signal, &e);
            None
        }
    }
}

pub fn report(signal: &'static str, e: &SignalError) {
    if e.is_unconfigured() {
        debug!(signal, error = %e, "Signal not configured");
    } else {
        warn!(signal, kind = e.kind(), error = %e, "Signal unavailable");
    }
    counter!("enrichment_signal_unavailable_total", "signal" => signal, "kind" => e.kind())
        .increment(1);
}

#[async_trait]
impl WeatherSource for OpenWeatherClient {
    fn name(&self) -> &'static str {
        "openweather"
    }

    async fn summary(&self, request: &WeatherRequest) -> Option<ForecastSummary> {
        let result = match request.point {
            Some(point) => self.summary_at(point).await,
            None => self.summary_for_postcode(&request.postcode4).await,
        };
        soft("weather", result)
    }
}

#[async_trait]
impl Geocoder for OpenWeatherClient {
    async fn locate(&self, postcode4: &str) -> Option<GeoPoint> {
        soft("geocode", self.geocode(postcode4).await)
    }
}

#[async_trait]
impl ConfidenceSource for ConfidenceClient {
    async fn confidence(&self) -> Option<ConfidenceIndex> {
        soft("cci", self.fetch().await)
    }
}

#[async_trait]
impl NewsSource for NewsClient {
    async fn headlines(&self) -> Vec<String> {
        soft("news", self.fetch().await).unwrap_or_default()
    }
}

#[async_trait]
impl HolidaySource for HolidayClient {
    async fn holidays(&self) -> HolidayMap {
        soft("holiday", self.fetch().await).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_soft_passes_values_through() {
        assert_eq!(soft("news", Ok(3)), Some(3));
        let err: SignalResult<u8> = Err(SignalError::ConfigurationMissing("x".into()));
        assert_eq!(soft("news", err), None);
        let err: SignalResult<u8> = Err(SignalError::HttpStatus {
            url: "u".into(),
            status: 503,
        });
        assert_eq!(soft("news", err), None);
    }
}
