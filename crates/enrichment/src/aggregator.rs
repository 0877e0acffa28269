//! Merge every external signal into one store context.
//!
//! The four signals are fetched concurrently; weather sources are tried one
//! after the other until one produces a summary. No signal can fail the
//! aggregation: a source that is unconfigured or broken leaves its own key
//! empty.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use metrics::counter;
use tracing::{debug, info, instrument, warn};

use forecast_grid::DecoderRegistry;
use signal_sources::{
    ConfidenceClient, ConfidenceSource, ForecastResolver, Geocoder, HolidayClient, HolidayMap,
    HolidaySource, HttpClient, NewsClient, NewsSource, OpenDataClient, OpenWeatherClient,
    WeatherRequest, WeatherSource,
};
use signals_common::{
    ConfidenceIndex, EnrichmentContext, ForecastSummary, GeoPoint, StoreInfo,
};

use crate::cache::{SignalCache, SignalKind, SignalValue};
use crate::config::{ConfigError, EnrichmentConfig};
use crate::gridded::GriddedForecastSource;
use crate::kpi::{self, KpiRow};

/// Location and day of one enrichment request.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalRequest {
    pub point: Option<GeoPoint>,
    pub postcode4: String,
    /// Day whose holiday label is reported.
    pub today: NaiveDate,
}

impl SignalRequest {
    pub fn for_store(store: &StoreInfo, today: NaiveDate) -> Self {
        Self {
            point: store.location(),
            postcode4: store.postcode4(),
            today,
        }
    }

    fn weather_request(&self) -> WeatherRequest {
        WeatherRequest {
            point: self.point,
            postcode4: self.postcode4.clone(),
        }
    }

    /// Cache scope of the weather signal.
    fn location_key(&self) -> String {
        match self.point {
            Some(p) => p.cache_key(),
            None => format!("pc4:{}", self.postcode4),
        }
    }
}

/// The external part of a store context.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExternalSignals {
    pub weather: Option<ForecastSummary>,
    pub cci: Option<ConfidenceIndex>,
    pub news: Vec<String>,
    pub holiday: Option<String>,
}

/// Stand-in for a signal that has no source.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSource;

#[async_trait]
impl ConfidenceSource for NoSource {
    async fn confidence(&self) -> Option<ConfidenceIndex> {
        None
    }
}

#[async_trait]
impl NewsSource for NoSource {
    async fn headlines(&self) -> Vec<String> {
        Vec::new()
    }
}

#[async_trait]
impl HolidaySource for NoSource {
    async fn holidays(&self) -> HolidayMap {
        HolidayMap::new()
    }
}

pub struct Aggregator {
    weather: Vec<Arc<dyn WeatherSource>>,
    geocoder: Option<Arc<dyn Geocoder>>,
    confidence: Arc<dyn ConfidenceSource>,
    news: Arc<dyn NewsSource>,
    holidays: Arc<dyn HolidaySource>,
    cache: Option<SignalCache>,
}

impl Aggregator {
    pub fn builder() -> AggregatorBuilder {
        AggregatorBuilder::default()
    }

    /// Wire the standard sources from configuration.
    ///
    /// Weather order is gridded model, then the generic weather API. Stores
    /// without coordinates are located through the weather API's geocoder.
    pub fn from_config(config: &EnrichmentConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let http = HttpClient::new().map_err(|e| ConfigError::Http(e.to_string()))?;
        let timeouts = config.timeouts;

        let open_data = OpenDataClient::new(
            http.clone(),
            config.open_data.base_url.clone(),
            config.open_data.api_key.clone(),
            timeouts,
        );
        let gridded = GriddedForecastSource::new(
            ForecastResolver::new(open_data, config.open_data.candidates.clone()),
            Arc::new(DecoderRegistry::with_available_backends()),
            config.summary.clone(),
        );
        let openweather = OpenWeatherClient::new(
            http.clone(),
            config.openweather.base_url.clone(),
            config.openweather.api_key.clone(),
            timeouts,
        )
        .with_country(config.openweather.country.clone())
        .with_steps(config.openweather.steps);
        let openweather = Arc::new(openweather);

        let mut news = NewsClient::new(http.clone(), config.news_feed_url.clone(), timeouts);
        if let Some(limit) = config.news_headlines {
            news = news.with_limit(limit);
        }

        info!(configured = ?config.configured_signals(), "Enrichment sources configured");

        Ok(Self::builder()
            .weather_source(Arc::new(gridded))
            .weather_source(openweather.clone())
            .geocoder(openweather)
            .confidence(Arc::new(ConfidenceClient::new(
                http.clone(),
                config.confidence_url.clone(),
                timeouts,
            )))
            .news(Arc::new(news))
            .holidays(Arc::new(HolidayClient::new(
                http,
                config.holidays_ics_url.clone(),
                timeouts,
            )))
            .cache(SignalCache::from_config(&config.cache))
            .build())
    }

    /// Names of the weather sources, in fallback order.
    pub fn weather_chain(&self) -> Vec<&'static str> {
        self.weather.iter().map(|s| s.name()).collect()
    }

    pub fn cache(&self) -> Option<&SignalCache> {
        self.cache.as_ref()
    }

    /// First weather summary along the fallback chain.
    #[instrument(skip(self, request), fields(location = %request.location_key()))]
    pub async fn weather(&self, request: &SignalRequest) -> Option<ForecastSummary> {
        let scope = request.location_key();
        if let Some(SignalValue::Weather(w)) = self.cached(SignalKind::Weather, &scope).await {
            return Some(w);
        }

        let mut weather_request = request.weather_request();
        if weather_request.point.is_none() {
            if let Some(geocoder) = &self.geocoder {
                weather_request.point = geocoder.locate(&weather_request.postcode4).await;
                debug!(point = ?weather_request.point, "Located store by postcode");
            }
        }
        for source in &self.weather {
            if let Some(summary) = source.summary(&weather_request).await {
                info!(source = source.name(), "Weather summary obtained");
                counter!("enrichment_weather_source_total", "source" => source.name())
                    .increment(1);
                self.store(SignalKind::Weather, &scope, SignalValue::Weather(summary.clone()))
                    .await;
                return Some(summary);
            }
            debug!(source = source.name(), "Weather source produced nothing, falling back");
        }

        warn!("No weather source produced a summary");
        counter!("enrichment_weather_source_total", "source" => "none").increment(1);
        None
    }

    pub async fn confidence(&self) -> Option<ConfidenceIndex> {
        if let Some(SignalValue::Confidence(c)) = self.cached(SignalKind::Confidence, "").await {
            return Some(c);
        }
        let cci = self.confidence.confidence().await?;
        self.store(SignalKind::Confidence, "", SignalValue::Confidence(cci.clone()))
            .await;
        Some(cci)
    }

    pub async fn headlines(&self) -> Vec<String> {
        if let Some(SignalValue::News(n)) = self.cached(SignalKind::News, "").await {
            return n;
        }
        let news = self.news.headlines().await;
        if !news.is_empty() {
            self.store(SignalKind::News, "", SignalValue::News(news.clone()))
                .await;
        }
        news
    }

    /// Holiday label for `today`.
    pub async fn holiday(&self, today: NaiveDate) -> Option<String> {
        let map = match self.cached(SignalKind::Holidays, "").await {
            Some(SignalValue::Holidays(map)) => map,
            _ => {
                let map = self.holidays.holidays().await;
                if !map.is_empty() {
                    self.store(SignalKind::Holidays, "", SignalValue::Holidays(map.clone()))
                        .await;
                }
                map
            }
        };
        map.get(&today).cloned()
    }

    /// Fetch the four external signals concurrently.
    #[instrument(skip(self))]
    pub async fn signals(&self, request: &SignalRequest) -> ExternalSignals {
        let (weather, cci, news, holiday) = tokio::join!(
            self.weather(request),
            self.confidence(),
            self.headlines(),
            self.holiday(request.today),
        );
        ExternalSignals {
            weather,
            cci,
            news,
            holiday,
        }
    }

    /// Full context for one store: KPI rollups plus external signals.
    ///
    /// `rows` holds the period's metric rows for every store; the store's own
    /// rows give the day comparison and all rows give the peer medians.
    #[instrument(skip(self, store, rows), fields(store = %store.name))]
    pub async fn enrich(
        &self,
        store: &StoreInfo,
        rows: &[KpiRow],
        today: NaiveDate,
    ) -> EnrichmentContext {
        let request = SignalRequest::for_store(store, today);
        let signals = self.signals(&request).await;

        let (yesterday, day_before) = match kpi::day_comparison(rows, store.id, today) {
            Some(cmp) => {
                debug!(yesterday = %cmp.yesterday_date, day_before = %cmp.day_before_date, "Day comparison");
                (cmp.yesterday, cmp.day_before)
            }
            None => {
                warn!(store_id = store.id, "Fewer than two days of KPI rows before today");
                Default::default()
            }
        };

        let context = EnrichmentContext {
            store: store.name.clone(),
            yesterday,
            day_before,
            peer_median: kpi::peer_medians(rows),
            weather: signals.weather,
            cci: signals.cci,
            news: signals.news,
            holiday: signals.holiday,
        };
        info!(signals = context.signal_count(), "Store context assembled");
        context
    }

    async fn cached(&self, kind: SignalKind, scope: &str) -> Option<SignalValue> {
        match &self.cache {
            Some(cache) => cache.get(kind, scope).await,
            None => None,
        }
    }

    async fn store(&self, kind: SignalKind, scope: &str, value: SignalValue) {
        if let Some(cache) = &self.cache {
            cache.put(kind, scope, value).await;
        }
    }
}

impl std::fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aggregator")
            .field("weather", &self.weather_chain())
            .field("geocoder", &self.geocoder.is_some())
            .field("cache", &self.cache)
            .finish()
    }
}

/// Assembles an [`Aggregator`]; signals without a source stay empty.
#[derive(Default)]
pub struct AggregatorBuilder {
    weather: Vec<Arc<dyn WeatherSource>>,
    geocoder: Option<Arc<dyn Geocoder>>,
    confidence: Option<Arc<dyn ConfidenceSource>>,
    news: Option<Arc<dyn NewsSource>>,
    holidays: Option<Arc<dyn HolidaySource>>,
    cache: Option<SignalCache>,
}

impl AggregatorBuilder {
    /// Append a weather source to the fallback chain.
    pub fn weather_source(mut self, source: Arc<dyn WeatherSource>) -> Self {
        self.weather.push(source);
        self
    }

    /// Locate stores that have no coordinates before the weather chain runs.
    pub fn geocoder(mut self, geocoder: Arc<dyn Geocoder>) -> Self {
        self.geocoder = Some(geocoder);
        self
    }

    pub fn confidence(mut self, source: Arc<dyn ConfidenceSource>) -> Self {
        self.confidence = Some(source);
        self
    }

    pub fn news(mut self, source: Arc<dyn NewsSource>) -> Self {
        self.news = Some(source);
        self
    }

    pub fn holidays(mut self, source: Arc<dyn HolidaySource>) -> Self {
        self.holidays = Some(source);
        self
    }

    pub fn cache(mut self, cache: Option<SignalCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn build(self) -> Aggregator {
        Aggregator {
            weather: self.weather,
            geocoder: self.geocoder,
            confidence: self.confidence.unwrap_or_else(|| Arc::new(NoSource)),
            news: self.news.unwrap_or_else(|| Arc::new(NoSource)),
            holidays: self.holidays.unwrap_or_else(|| Arc::new(NoSource)),
            cache: self.cache,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_from_store() {
        let store = StoreInfo {
            id: 1,
            name: "Utrecht".to_string(),
            region: String::new(),
            postcode: "3511 AB".to_string(),
            lat: None,
            lon: None,
        };
        let today = NaiveDate::from_ymd_opt(2024, 4, 27).unwrap();
        let request = SignalRequest::for_store(&store, today);
        assert_eq!(request.postcode4, "3511");
        assert_eq!(request.point, None);
        assert_eq!(request.location_key(), "pc4:3511");

        let with_point = SignalRequest {
            point: Some(GeoPoint::new(52.0907, 5.1214)),
            ..request
        };
        assert_eq!(with_point.location_key(), "52.09,5.12");
    }

    #[tokio::test]
    async fn test_empty_aggregator() {
        let aggregator = Aggregator::builder().build();
        assert!(aggregator.weather_chain().is_empty());

        let request = SignalRequest {
            point: None,
            postcode4: String::new(),
            today: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        };
        assert_eq!(aggregator.signals(&request).await, ExternalSignals::default());
    }

    #[test]
    fn test_from_default_config_wires_weather_chain() {
        let aggregator = Aggregator::from_config(&EnrichmentConfig::default()).unwrap();
        assert_eq!(aggregator.weather_chain(), vec!["gridded", "openweather"]);
        assert!(aggregator.cache().is_none());
    }
}
