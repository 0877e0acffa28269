//! Time handling for forecast grids.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// Hours of forecast covered by a summary.
pub const DEFAULT_WINDOW_HOURS: i64 = 48;

/// Steps used when no grid timestep falls inside the window.
pub const DEFAULT_FALLBACK_STEPS: usize = 16;

/// The forecast window summarized for a request: `[start, end]`, inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    fallback_steps: usize,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, fallback_steps: usize) -> Self {
        Self {
            start,
            end,
            fallback_steps,
        }
    }

    /// The next `hours` hours from `now`.
    pub fn next_hours(now: DateTime<Utc>, hours: i64) -> Self {
        Self::new(now, now + Duration::hours(hours), DEFAULT_FALLBACK_STEPS)
    }

    /// Default 48 hour window with a 16 step fallback.
    pub fn forecast(now: DateTime<Utc>) -> Self {
        Self::next_hours(now, DEFAULT_WINDOW_HOURS)
    }

    pub fn with_fallback_steps(mut self, steps: usize) -> Self {
        self.fallback_steps = steps;
        self
    }

    pub fn fallback_steps(&self) -> usize {
        self.fallback_steps
    }

    pub fn contains(&self, dt: &DateTime<Utc>) -> bool {
        dt >= &self.start && dt <= &self.end
    }

    /// Indices of the timesteps inside the window.
    ///
    /// Falls back to the leading `fallback_steps` timesteps when none match,
    /// which covers stale runs and files referenced to another epoch.
    pub fn select(&self, times: &[Option<DateTime<Utc>>]) -> Vec<usize> {
        let inside: Vec<usize> = times
            .iter()
            .enumerate()
            .filter(|(_, t)| t.map_or(false, |t| self.contains(&t)))
            .map(|(i, _)| i)
            .collect();

        if inside.is_empty() {
            (0..times.len().min(self.fallback_steps)).collect()
        } else {
            inside
        }
    }
}

/// CF-convention time units, e.g. `"hours since 2024-01-01 00:00:00"`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CfTimeUnits {
    pub seconds_per_unit: f64,
    pub epoch: DateTime<Utc>,
}

impl CfTimeUnits {
    /// Seconds since the Unix epoch.
    pub fn unix_seconds() -> Self {
        Self {
            seconds_per_unit: 1.0,
            epoch: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    /// Parse a `"<unit> since <reference>"` string.
    pub fn parse(s: &str) -> Result<Self, TimeParseError> {
        let (unit, reference) = s
            .split_once(" since ")
            .ok_or_else(|| TimeParseError::InvalidFormat(s.to_string()))?;

        let seconds_per_unit = match unit.trim().to_lowercase().as_str() {
            "seconds" | "second" | "secs" | "sec" | "s" => 1.0,
            "minutes" | "minute" | "mins" | "min" => 60.0,
            "hours" | "hour" | "hrs" | "hr" | "h" => 3600.0,
            "days" | "day" | "d" => 86400.0,
            other => return Err(TimeParseError::UnknownUnit(other.to_string())),
        };

        Ok(Self {
            seconds_per_unit,
            epoch: parse_reference_time(reference.trim())?,
        })
    }

    /// Convert an offset in these units to a timestamp.
    pub fn to_datetime(&self, value: f64) -> Option<DateTime<Utc>> {
        if !value.is_finite() {
            return None;
        }
        let millis = (value * self.seconds_per_unit * 1000.0).round();
        if millis.abs() > i64::MAX as f64 {
            return None;
        }
        self.epoch.checked_add_signed(Duration::milliseconds(millis as i64))
    }

    /// Convert a timestamp to an offset in these units.
    pub fn to_offset(&self, dt: DateTime<Utc>) -> f64 {
        (dt - self.epoch).num_milliseconds() as f64 / 1000.0 / self.seconds_per_unit
    }
}

/// Parse the reference part of CF time units.
fn parse_reference_time(s: &str) -> Result<DateTime<Utc>, TimeParseError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    let trimmed = s
        .trim_end_matches(" UTC")
        .trim_end_matches("Z")
        .trim_end_matches(".0")
        .trim();

    for fmt in [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }

    // Date only
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        if let Some(ndt) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }

    Err(TimeParseError::InvalidFormat(s.to_string()))
}

#[derive(Debug, thiserror::Error)]
pub enum TimeParseError {
    #[error("Invalid time format: {0}")]
    InvalidFormat(String),

    #[error("Unknown time unit: {0}")]
    UnknownUnit(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, h, 0, 0).unwrap()
    }

    #[test]
    fn test_window_selects_inside_steps() {
        let now = at(6);
        let window = TimeWindow::forecast(now);
        let times: Vec<Option<DateTime<Utc>>> = (0..20)
            .map(|i| Some(at(0) + Duration::hours(i * 3)))
            .collect();

        let selected = window.select(&times);
        // 06:00 (index 2) through 06:00 + 48h, steps of 3h
        assert_eq!(selected.first(), Some(&2));
        assert!(selected.iter().all(|&i| window.contains(&times[i].unwrap())));
        assert_eq!(selected.len(), 17);
    }

    #[test]
    fn test_window_falls_back_to_leading_steps() {
        let now = at(0) + Duration::days(30);
        let window = TimeWindow::forecast(now);
        let times: Vec<Option<DateTime<Utc>>> =
            (0..40).map(|i| Some(at(0) + Duration::hours(i))).collect();

        assert_eq!(window.select(&times), (0..16).collect::<Vec<_>>());
    }

    #[test]
    fn test_window_fallback_on_short_axis() {
        let window = TimeWindow::forecast(at(0) + Duration::days(30));
        let times = vec![Some(at(0)), None, Some(at(1))];
        assert_eq!(window.select(&times), vec![0, 1, 2]);
    }

    #[test]
    fn test_cf_units_parse() {
        let units = CfTimeUnits::parse("hours since 2024-05-01 00:00:00").unwrap();
        assert_eq!(units.seconds_per_unit, 3600.0);
        assert_eq!(units.to_datetime(6.0), Some(at(6)));
        assert_eq!(units.to_offset(at(12)), 12.0);

        let units = CfTimeUnits::parse("seconds since 1970-01-01T00:00:00Z").unwrap();
        assert_eq!(units.epoch, DateTime::<Utc>::UNIX_EPOCH);

        let units = CfTimeUnits::parse("days since 2024-05-01").unwrap();
        assert_eq!(units.to_datetime(0.25), Some(at(6)));
    }

    #[test]
    fn test_cf_units_rejects_garbage() {
        assert!(CfTimeUnits::parse("fortnights since 2024-01-01").is_err());
        assert!(CfTimeUnits::parse("hours").is_err());
        assert!(CfTimeUnits::parse("hours since yesterday").is_err());
    }
}
