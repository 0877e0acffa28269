//! Aggregation behavior with stub sources.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use enrichment::{Aggregator, KpiRow, SignalCache, SignalRequest, SignalTtls};
use signal_sources::{
    ConfidenceSource, Geocoder, HolidayMap, HolidaySource, NewsSource, WeatherRequest,
    WeatherSource,
};
use signals_common::{ConfidenceIndex, ForecastSummary, GeoPoint, StoreInfo};

struct StubWeather {
    name: &'static str,
    result: Option<ForecastSummary>,
    calls: AtomicUsize,
}

impl StubWeather {
    fn new(name: &'static str, result: Option<ForecastSummary>) -> Arc<Self> {
        Arc::new(Self {
            name,
            result,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WeatherSource for StubWeather {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn summary(&self, _request: &WeatherRequest) -> Option<ForecastSummary> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}

#[derive(Default)]
struct StubFeeds {
    calls: AtomicUsize,
}

#[async_trait]
impl ConfidenceSource for StubFeeds {
    async fn confidence(&self) -> Option<ConfidenceIndex> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Some(ConfidenceIndex {
            consumer_confidence: Some(-21.0),
            period: Some("2024MM04".to_string()),
        })
    }
}

#[async_trait]
impl NewsSource for StubFeeds {
    async fn headlines(&self) -> Vec<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        vec!["Inflatie daalt".to_string()]
    }
}

#[async_trait]
impl HolidaySource for StubFeeds {
    async fn holidays(&self) -> HolidayMap {
        self.calls.fetch_add(1, Ordering::SeqCst);
        HolidayMap::from([(day(2024, 4, 27), "Koningsdag".to_string())])
    }
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn summary(temp: f64) -> ForecastSummary {
    ForecastSummary {
        temp_min: Some(temp),
        temp_max: Some(temp + 5.0),
        pop_max: 40,
        ..Default::default()
    }
}

fn request(today: NaiveDate) -> SignalRequest {
    SignalRequest {
        point: Some(GeoPoint::new(52.09, 5.12)),
        postcode4: "3511".to_string(),
        today,
    }
}

fn store() -> StoreInfo {
    StoreInfo {
        id: 29658,
        name: "Amsterdam".to_string(),
        region: "Noord NL".to_string(),
        postcode: "1012 AB".to_string(),
        lat: Some(52.37),
        lon: Some(4.89),
    }
}

#[tokio::test]
async fn test_gridded_summary_wins() {
    let gridded = StubWeather::new("gridded", Some(summary(10.0)));
    let generic = StubWeather::new("openweather", Some(summary(20.0)));
    let aggregator = Aggregator::builder()
        .weather_source(gridded.clone())
        .weather_source(generic.clone())
        .build();

    let weather = aggregator.weather(&request(day(2024, 4, 27))).await;
    assert_eq!(weather.unwrap().temp_min, Some(10.0));
    assert_eq!(gridded.calls(), 1);
    assert_eq!(generic.calls(), 0);
}

#[tokio::test]
async fn test_generic_api_tried_when_gridded_unavailable() {
    let gridded = StubWeather::new("gridded", None);
    let generic = StubWeather::new("openweather", Some(summary(20.0)));
    let aggregator = Aggregator::builder()
        .weather_source(gridded.clone())
        .weather_source(generic.clone())
        .build();

    let weather = aggregator.weather(&request(day(2024, 4, 27))).await;
    assert_eq!(weather.unwrap().temp_min, Some(20.0));
    assert_eq!(gridded.calls(), 1);
    assert_eq!(generic.calls(), 1);
}

#[tokio::test]
async fn test_all_weather_sources_fail_other_signals_survive() {
    let gridded = StubWeather::new("gridded", None);
    let generic = StubWeather::new("openweather", None);
    let feeds = Arc::new(StubFeeds::default());
    let aggregator = Aggregator::builder()
        .weather_source(gridded.clone())
        .weather_source(generic.clone())
        .confidence(feeds.clone())
        .news(feeds.clone())
        .holidays(feeds.clone())
        .build();

    let signals = aggregator.signals(&request(day(2024, 4, 27))).await;
    assert!(signals.weather.is_none());
    assert_eq!(gridded.calls(), 1);
    assert_eq!(generic.calls(), 1);
    assert_eq!(signals.cci.unwrap().consumer_confidence, Some(-21.0));
    assert_eq!(signals.news, vec!["Inflatie daalt"]);
    assert_eq!(signals.holiday.as_deref(), Some("Koningsdag"));
}

#[tokio::test]
async fn test_holiday_only_for_today() {
    let feeds = Arc::new(StubFeeds::default());
    let aggregator = Aggregator::builder().holidays(feeds).build();
    assert_eq!(aggregator.holiday(day(2024, 4, 28)).await, None);
    assert_eq!(
        aggregator.holiday(day(2024, 4, 27)).await.as_deref(),
        Some("Koningsdag")
    );
}

#[tokio::test]
async fn test_unconfigured_context_has_every_key() {
    let aggregator = Aggregator::builder().build();
    let rows: Vec<KpiRow> = serde_json::from_value(test_utils::fixtures::kpi_rows()).unwrap();

    let context = aggregator.enrich(&store(), &rows, day(2024, 4, 30)).await;
    let json = context.to_json();

    assert_eq!(json["store"], "Amsterdam");
    assert_eq!(json["yesterday"]["count_in"], 500.0);
    assert_eq!(json["day_before"]["count_in"], 400.0);
    assert!(json["peer_median"]["spv"].as_f64().is_some());
    assert!(json["weather"].is_null());
    assert!(json["cci"].is_null());
    assert_eq!(json["news"], serde_json::json!([]));
    assert!(json["holiday"].is_null());
    assert_eq!(context.signal_count(), 0);
}

#[tokio::test]
async fn test_missing_kpi_history_leaves_empty_totals() {
    let aggregator = Aggregator::builder().build();
    let context = aggregator.enrich(&store(), &[], day(2024, 4, 30)).await;
    assert!(context.yesterday.is_empty());
    assert!(context.day_before.is_empty());
    assert_eq!(context.peer_median.conv, None);
}

#[tokio::test]
async fn test_identical_inputs_give_equal_contexts() {
    let feeds = Arc::new(StubFeeds::default());
    let aggregator = Aggregator::builder()
        .weather_source(StubWeather::new("gridded", None))
        .weather_source(StubWeather::new("openweather", Some(summary(12.0))))
        .confidence(feeds.clone())
        .news(feeds.clone())
        .holidays(feeds)
        .build();
    let rows: Vec<KpiRow> = serde_json::from_value(test_utils::fixtures::kpi_rows()).unwrap();

    let first = aggregator.enrich(&store(), &rows, day(2024, 4, 27)).await;
    let second = aggregator.enrich(&store(), &rows, day(2024, 4, 27)).await;
    assert_eq!(first, second);
    assert_eq!(first.signal_count(), 4);
}

#[tokio::test]
async fn test_cache_short_circuits_sources() {
    let gridded = StubWeather::new("gridded", Some(summary(10.0)));
    let feeds = Arc::new(StubFeeds::default());
    let cache = SignalCache::new(NonZeroUsize::new(16).unwrap(), SignalTtls::default());
    let aggregator = Aggregator::builder()
        .weather_source(gridded.clone())
        .confidence(feeds.clone())
        .news(feeds.clone())
        .holidays(feeds.clone())
        .cache(Some(cache.clone()))
        .build();

    let req = request(day(2024, 4, 27));
    let first = aggregator.signals(&req).await;
    let second = aggregator.signals(&req).await;

    assert_eq!(first, second);
    assert_eq!(gridded.calls(), 1);
    assert_eq!(feeds.calls.load(Ordering::SeqCst), 3);
    assert_eq!(cache.len().await, 4);

    // Another location misses the weather entry only.
    let elsewhere = SignalRequest {
        point: Some(GeoPoint::new(51.44, 5.47)),
        ..req
    };
    aggregator.signals(&elsewhere).await;
    assert_eq!(gridded.calls(), 2);
    assert_eq!(feeds.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_failures_are_not_cached() {
    let generic = StubWeather::new("openweather", None);
    let cache = SignalCache::new(NonZeroUsize::new(16).unwrap(), SignalTtls::default());
    let aggregator = Aggregator::builder()
        .weather_source(generic.clone())
        .cache(Some(cache))
        .build();

    let req = request(day(2024, 4, 27));
    assert!(aggregator.weather(&req).await.is_none());
    assert!(aggregator.weather(&req).await.is_none());
    assert_eq!(generic.calls(), 2);
}

/// Answers only when the request carries coordinates.
struct PointOnlyWeather;

#[async_trait]
impl WeatherSource for PointOnlyWeather {
    fn name(&self) -> &'static str {
        "gridded"
    }

    async fn summary(&self, request: &WeatherRequest) -> Option<ForecastSummary> {
        request.point.map(|p| summary(p.lat))
    }
}

#[derive(Default)]
struct StubGeocoder {
    calls: AtomicUsize,
}

#[async_trait]
impl Geocoder for StubGeocoder {
    async fn locate(&self, postcode4: &str) -> Option<GeoPoint> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (postcode4 == "3511").then(|| GeoPoint::new(52.0, 5.1))
    }
}

#[tokio::test]
async fn test_store_without_point_is_located_first() {
    let geocoder = Arc::new(StubGeocoder::default());
    let aggregator = Aggregator::builder()
        .weather_source(Arc::new(PointOnlyWeather))
        .geocoder(geocoder.clone())
        .build();

    let without_point = SignalRequest {
        point: None,
        ..request(day(2024, 4, 27))
    };
    let weather = aggregator.weather(&without_point).await.unwrap();
    assert_eq!(weather.temp_min, Some(52.0));
    assert_eq!(geocoder.calls.load(Ordering::SeqCst), 1);

    // Known coordinates skip the geocoder
    let weather = aggregator.weather(&request(day(2024, 4, 27))).await.unwrap();
    assert_eq!(weather.temp_min, Some(52.09));
    assert_eq!(geocoder.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failed_geocode_leaves_point_sources_empty() {
    let geocoder = Arc::new(StubGeocoder::default());
    let fallback = StubWeather::new("openweather", Some(summary(20.0)));
    let aggregator = Aggregator::builder()
        .weather_source(Arc::new(PointOnlyWeather))
        .weather_source(fallback.clone())
        .geocoder(geocoder.clone())
        .build();

    let unknown = SignalRequest {
        point: None,
        postcode4: "9999".to_string(),
        today: day(2024, 4, 27),
    };
    let weather = aggregator.weather(&unknown).await.unwrap();
    assert_eq!(weather.temp_min, Some(20.0));
    assert_eq!(fallback.calls(), 1);
}
