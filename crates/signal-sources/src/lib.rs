//! Provider clients for the external store signals.
//!
//! - [`open_data`] / [`resolver`]: gridded model runs from the
//!   meteorological open-data platform
//! - [`openweather`]: generic weather API, used as the weather fallback
//! - [`confidence`]: statistics office consumer confidence
//! - [`news`]: syndication feed headlines
//! - [`holidays`]: iCalendar holiday feed
//!
//! Client methods return [`SignalResult`](signals_common::SignalResult); the
//! [`sources`] traits wrap them so that no failure escapes a signal.

pub mod confidence;
pub mod holidays;
pub mod http;
pub mod news;
pub mod open_data;
pub mod openweather;
pub mod resolver;
pub mod sources;

pub use confidence::ConfidenceClient;
pub use holidays::{HolidayClient, HolidayMap};
pub use http::{HttpClient, Timeouts};
pub use news::NewsClient;
pub use open_data::{DatasetRun, ForecastFile, OpenDataClient};
pub use openweather::OpenWeatherClient;
pub use resolver::{default_candidates, DatasetCandidate, ForecastPayload, ForecastResolver};
pub use sources::{
    ConfidenceSource, Geocoder, HolidaySource, NewsSource, WeatherRequest, WeatherSource,
};
