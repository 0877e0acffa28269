//! Normalized weather summary shared by every weather source.

use serde::{Deserialize, Serialize};

/// The canonical weather signal handed to the narrative step.
///
/// Always fully keyed: fields a source could not derive carry their
/// defaults (`pop_max = 0`, `rain_sum = 0.0`, empty `first_desc`, absent
/// temperatures and wind).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSummary {
    /// Minimum temperature in Celsius
    pub temp_min: Option<f64>,
    /// Maximum temperature in Celsius
    pub temp_max: Option<f64>,
    /// Probability of precipitation in percent (0-100)
    pub pop_max: u8,
    /// Accumulated precipitation in millimeters
    pub rain_sum: f64,
    /// Maximum wind speed in m/s
    pub wind_max: Option<f64>,
    /// Short text description
    pub first_desc: String,
}

impl Default for ForecastSummary {
    fn default() -> Self {
        Self {
            temp_min: None,
            temp_max: None,
            pop_max: 0,
            rain_sum: 0.0,
            wind_max: None,
            first_desc: String::new(),
        }
    }
}

/// Fields derived so far by a source, before defaults are applied.
///
/// Sources fill what they can; [`PartialForecast::finish`] turns the result
/// into a [`ForecastSummary`] or reports "no data" when nothing was derived.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialForecast {
    pub temp_min: Option<f64>,
    pub temp_max: Option<f64>,
    pub pop_max: Option<u8>,
    pub rain_sum: Option<f64>,
    pub wind_max: Option<f64>,
    pub first_desc: Option<String>,
}

impl PartialForecast {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no field has been derived.
    pub fn is_empty(&self) -> bool {
        self.temp_min.is_none()
            && self.temp_max.is_none()
            && self.pop_max.is_none()
            && self.rain_sum.is_none()
            && self.wind_max.is_none()
            && self.first_desc.is_none()
    }

    /// Apply defaults, or return `None` if nothing was derived.
    pub fn finish(self) -> Option<ForecastSummary> {
        if self.is_empty() {
            return None;
        }

        let defaults = ForecastSummary::default();
        Some(ForecastSummary {
            temp_min: self.temp_min,
            temp_max: self.temp_max,
            pop_max: self.pop_max.unwrap_or(defaults.pop_max).min(100),
            rain_sum: self.rain_sum.unwrap_or(defaults.rain_sum),
            wind_max: self.wind_max,
            first_desc: self.first_desc.unwrap_or(defaults.first_desc),
        })
    }
}

/// Convert a percentage to an integer clamped to 0-100.
///
/// Halves round to the even neighbour (12.5 -> 12, 13.5 -> 14).
pub fn percent(value: f64) -> u8 {
    if !value.is_finite() {
        return 0;
    }
    value.round_ties_even().clamp(0.0, 100.0) as u8
}
