//! Generic weather API client (OpenWeather-compatible).

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument};

use signals_common::{percent, ForecastSummary, GeoPoint, SignalError, SignalResult};

use crate::http::{join_url, HttpClient, Timeouts};

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org";

/// Forecast steps summarized (3-hourly, so about 48 hours).
pub const DEFAULT_STEPS: usize = 16;

#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    http: HttpClient,
    base_url: String,
    api_key: Option<String>,
    country: String,
    steps: usize,
    timeouts: Timeouts,
}

/// One 3-hourly record of the forecast endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ForecastStep {
    pub main: MainBlock,
    #[serde(default)]
    pub weather: Vec<Condition>,
    #[serde(default)]
    pub wind: Option<Wind>,
    /// Probability of precipitation, 0 to 1
    #[serde(default)]
    pub pop: Option<f64>,
    #[serde(default)]
    pub rain: Option<Rain>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MainBlock {
    pub temp: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Condition {
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Wind {
    pub speed: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Rain {
    #[serde(rename = "3h")]
    pub three_hours: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    list: Vec<ForecastStep>,
}

impl OpenWeatherClient {
    pub fn new(
        http: HttpClient,
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeouts: Timeouts,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            country: "NL".to_string(),
            steps: DEFAULT_STEPS,
            timeouts,
        }
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = country.into();
        self
    }

    pub fn with_steps(mut self, steps: usize) -> Self {
        self.steps = steps;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn api_key(&self) -> SignalResult<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| SignalError::ConfigurationMissing("weather API key".into()))
    }

    /// Coordinates of a postcode.
    #[instrument(skip(self))]
    pub async fn geocode(&self, postcode: &str) -> SignalResult<GeoPoint> {
        let key = self.api_key()?;
        if postcode.is_empty() {
            return Err(SignalError::ConfigurationMissing("store postcode".into()));
        }
        let url = join_url(&self.base_url, "geo/1.0/zip");
        let request = self.http.get(&url, self.timeouts.metadata()).query(&[
            ("zip", format!("{},{}", postcode, self.country)),
            ("appid", key.to_string()),
        ]);
        let js = self.http.json(&url, request).await?;

        let coord = |k: &str| js.get(k).and_then(Value::as_f64);
        match (coord("lat"), coord("lon")) {
            (Some(lat), Some(lon)) => Ok(GeoPoint::new(lat, lon)),
            _ => Err(SignalError::SchemaMismatch(
                "geocode response without lat/lon".into(),
            )),
        }
    }

    /// Forecast records for a point, in metric units.
    #[instrument(skip(self))]
    pub async fn forecast(&self, point: GeoPoint) -> SignalResult<Vec<ForecastStep>> {
        let key = self.api_key()?;
        let url = join_url(&self.base_url, "data/2.5/forecast");
        let request = self.http.get(&url, self.timeouts.metadata()).query(&[
            ("lat", point.lat.to_string()),
            ("lon", point.lon.to_string()),
            ("units", "metric".to_string()),
            ("appid", key.to_string()),
        ]);
        let js = self.http.json(&url, request).await?;
        let response: ForecastResponse = serde_json::from_value(js)
            .map_err(|e| SignalError::SchemaMismatch(format!("forecast: {}", e)))?;
        debug!(steps = response.list.len(), "Fetched forecast");
        Ok(response.list)
    }

    /// Geocode then summarize the leading forecast steps.
    pub async fn summary_for_postcode(&self, postcode: &str) -> SignalResult<ForecastSummary> {
        let point = self.geocode(postcode).await?;
        self.summary_at(point).await
    }

    /// Summarize the leading forecast steps at known coordinates.
    pub async fn summary_at(&self, point: GeoPoint) -> SignalResult<ForecastSummary> {
        let steps = self.forecast(point).await?;
        summarize_steps(&steps, self.steps)
    }
}

/// Reduce the first `limit` steps to a summary.
pub fn summarize_steps(steps: &[ForecastStep], limit: usize) -> SignalResult<ForecastSummary> {
    let window = &steps[..steps.len().min(limit)];
    if window.is_empty() {
        return Err(SignalError::EmptyListing("forecast has no steps".into()));
    }

    let temps = window.iter().map(|s| s.main.temp);
    let temp_min = temps.clone().fold(f64::INFINITY, f64::min);
    let temp_max = temps.fold(f64::NEG_INFINITY, f64::max);
    let pop = window
        .iter()
        .map(|s| s.pop.unwrap_or(0.0))
        .fold(0.0, f64::max);
    let rain_sum = window
        .iter()
        .filter_map(|s| s.rain.as_ref().and_then(|r| r.three_hours))
        .sum();
    let wind_max = window
        .iter()
        .filter_map(|s| s.wind.as_ref().and_then(|w| w.speed))
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))));
    let first_desc = window[0]
        .weather
        .first()
        .map(|c| c.description.clone())
        .unwrap_or_default();

    Ok(ForecastSummary {
        temp_min: Some(temp_min),
        temp_max: Some(temp_max),
        pop_max: percent(pop * 100.0),
        rain_sum,
        wind_max,
        first_desc,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steps(js: serde_json::Value) -> Vec<ForecastStep> {
        serde_json::from_value::<ForecastResponse>(js).unwrap().list
    }

    #[test]
    fn test_summarize_steps() {
        let list = steps(test_utils::fixtures::openweather::forecast(&[
            (12.0, 0.2, "light rain"),
            (9.5, 0.65, "overcast clouds"),
            (15.0, 0.0, "clear sky"),
        ]));
        let s = summarize_steps(&list, 16).unwrap();
        assert_eq!(s.temp_min, Some(9.5));
        assert_eq!(s.temp_max, Some(15.0));
        assert_eq!(s.pop_max, 65);
        assert_eq!(s.rain_sum, 1.5);
        assert_eq!(s.wind_max, Some(4.0));
        assert_eq!(s.first_desc, "light rain");
    }

    #[test]
    fn test_only_leading_steps() {
        let list = steps(test_utils::fixtures::openweather::forecast(&[
            (10.0, 0.1, "a"),
            (11.0, 0.1, "b"),
            (30.0, 1.0, "c"),
        ]));
        let s = summarize_steps(&list, 2).unwrap();
        assert_eq!(s.temp_max, Some(11.0));
        assert_eq!(s.pop_max, 10);
    }

    #[test]
    fn test_sparse_records() {
        let list = steps(serde_json::json!({ "list": [{ "main": { "temp": 4.0 } }] }));
        let s = summarize_steps(&list, 16).unwrap();
        assert_eq!(s.pop_max, 0);
        assert_eq!(s.rain_sum, 0.0);
        assert_eq!(s.wind_max, None);
        assert_eq!(s.first_desc, "");
    }

    #[test]
    fn test_empty_forecast() {
        assert!(summarize_steps(&[], 16).is_err());
    }
}
