//! Point forecast summary from a decoded grid.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use signals_common::{
    ForecastSummary, GeoPoint, Grid, PartialForecast, SignalError, SignalResult, TimeWindow,
};

use crate::discover::{
    discover_axis, discover_time, discover_variable, LATITUDE, LONGITUDE, PRECIPITATION,
    TEMPERATURE, WIND_SPEED, WIND_U, WIND_V,
};
use crate::point::{nearest_point, PointIndex};
use crate::reduce;

/// Tuning for [`summarize_grid`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryOptions {
    /// Hours after "now" covered by the summary.
    pub window_hours: i64,
    /// Leading timesteps used when none fall inside the window.
    pub fallback_steps: usize,
    /// Precipitation above this value counts as a wet step.
    pub pop_threshold: f64,
    /// Treat precipitation totals below 1.0 as meters.
    pub precip_unit_heuristic: bool,
    /// Convert temperatures in Kelvin to Celsius.
    pub kelvin_to_celsius: bool,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self {
            window_hours: signals_common::time::DEFAULT_WINDOW_HOURS,
            fallback_steps: signals_common::time::DEFAULT_FALLBACK_STEPS,
            pop_threshold: 0.1,
            precip_unit_heuristic: true,
            kelvin_to_celsius: true,
        }
    }
}

/// Reduce a grid to a summary at the cell nearest to `target`.
///
/// Fails when the horizontal axes or the time axis can't be found, or when
/// no summary field could be derived. Individual variables that are missing
/// or malformed only leave their own fields at the defaults.
pub fn summarize_grid(
    grid: &Grid,
    target: GeoPoint,
    now: DateTime<Utc>,
    options: &SummaryOptions,
) -> SignalResult<ForecastSummary> {
    let lat_name = discover_axis(grid, LATITUDE)
        .ok_or_else(|| SignalError::SchemaMismatch("no latitude axis".into()))?;
    let lon_name = discover_axis(grid, LONGITUDE)
        .ok_or_else(|| SignalError::SchemaMismatch("no longitude axis".into()))?;
    let (lat, lon) = match (grid.variable(lat_name), grid.variable(lon_name)) {
        (Some(lat), Some(lon)) => (lat, lon),
        _ => return Err(SignalError::SchemaMismatch("missing coordinate data".into())),
    };

    let point = nearest_point(lat, lon, target).ok_or_else(|| {
        SignalError::SchemaMismatch(format!(
            "cannot locate a grid cell on {}/{}",
            lat_name, lon_name
        ))
    })?;
    debug!(lat = %lat_name, lon = %lon_name, ?point, "Nearest grid cell");

    let time_name =
        discover_time(grid).ok_or_else(|| SignalError::SchemaMismatch("no time axis".into()))?;
    let time_var = grid
        .variable(time_name)
        .ok_or_else(|| SignalError::SchemaMismatch("no time axis".into()))?;
    let time_dim = match time_var.dims() {
        [dim] => dim.clone(),
        dims => {
            return Err(SignalError::SchemaMismatch(format!(
                "time axis '{}' spans {} dimensions",
                time_name,
                dims.len()
            )))
        }
    };

    let window = TimeWindow::next_hours(now, options.window_hours)
        .with_fallback_steps(options.fallback_steps);
    let steps = match grid.time_values(time_name) {
        Ok(times) => window.select(&times),
        Err(e) => {
            debug!(time = %time_name, error = %e, "Unreadable time axis, using leading steps");
            (0..time_var.len().min(options.fallback_steps)).collect()
        }
    };
    debug!(time = %time_name, steps = steps.len(), "Selected forecast window");

    let sampler = Sampler {
        grid,
        point: &point,
        time_dim: &time_dim,
        steps,
    };
    let mut partial = PartialForecast::new();

    if let Some(name) = discover_variable(grid, TEMPERATURE) {
        if let Some((values, units)) = sampler.series(name) {
            let kelvin = options.kelvin_to_celsius && reduce::is_kelvin(units);
            if let Some((lo, hi)) = reduce::temperature_range(&values, kelvin) {
                partial.temp_min = Some(lo);
                partial.temp_max = Some(hi);
            }
        }
    }

    if let Some(name) = discover_variable(grid, PRECIPITATION) {
        if let Some((values, _)) = sampler.series(name) {
            partial.rain_sum = Some(reduce::precipitation_sum(
                &values,
                options.precip_unit_heuristic,
            ));
            partial.pop_max = Some(reduce::probability_of_precipitation(
                &values,
                options.pop_threshold,
            ));
        }
    }

    // A direct speed field wins; components are only used without one.
    partial.wind_max = match discover_variable(grid, WIND_SPEED) {
        Some(name) => sampler
            .series(name)
            .and_then(|(values, _)| reduce::nan_max(&values)),
        None => match (
            discover_variable(grid, WIND_U),
            discover_variable(grid, WIND_V),
        ) {
            (Some(u), Some(v)) => match (sampler.series(u), sampler.series(v)) {
                (Some((u, _)), Some((v, _))) => reduce::wind_from_components(&u, &v),
                _ => None,
            },
            _ => None,
        },
    };

    partial
        .finish()
        .ok_or_else(|| SignalError::SchemaMismatch("no forecast variable could be reduced".into()))
}

struct Sampler<'a> {
    grid: &'a Grid,
    point: &'a PointIndex,
    time_dim: &'a str,
    steps: Vec<usize>,
}

impl<'a> Sampler<'a> {
    /// Values of `name` at the point within the window, with its units.
    ///
    /// Variables that don't carry the time dimension and every point
    /// dimension are not sampled.
    fn series(&self, name: &str) -> Option<(Vec<f64>, Option<&'a str>)> {
        let var = self.grid.variable(name)?;
        let has_dims = var.dim_index(self.time_dim).is_some()
            && self.point.dims().all(|d| var.dim_index(d).is_some());
        if !has_dims {
            debug!(variable = %name, dims = ?var.dims(), "Variable not on the forecast grid");
            return None;
        }

        let mut picks: HashMap<String, Vec<usize>> = self.point.to_picks();
        picks.insert(self.time_dim.to_string(), self.steps.clone());
        Some((var.select(&picks), var.units()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use signals_common::Variable;

    const HOUR: f64 = 3600.0;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
    }

    fn dims(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    /// time x lat x lon grid with per-step constant fields.
    fn grid(steps: &[f64], fields: &[(&str, &str, Vec<f64>)]) -> Grid {
        let mut grid = Grid::new();
        grid.insert_coordinate("lat", Variable::axis("lat", vec![10.0, 20.0, 30.0]));
        grid.insert_coordinate("lon", Variable::axis("lon", vec![0.0, 1.0]));
        let epoch = now().timestamp() as f64;
        grid.insert_coordinate(
            "time",
            Variable::axis("time", steps.iter().map(|h| epoch + h * HOUR).collect()),
        );
        for (name, units, per_step) in fields {
            let data: Vec<f64> = per_step.iter().flat_map(|v| vec![*v; 6]).collect();
            let var = Variable::new(dims(&["time", "lat", "lon"]), vec![per_step.len(), 3, 2], data)
                .unwrap()
                .with_units(*units);
            grid.insert_variable(*name, var);
        }
        grid
    }

    #[test]
    fn test_full_summary() {
        let g = grid(
            &[0.0, 3.0, 6.0],
            &[
                ("t2m", "K", vec![283.15, 288.15, 293.15]),
                ("tp", "m", vec![0.0001, 0.0002, 0.0002]),
                ("u10", "m s-1", vec![3.0, 0.0, 1.0]),
                ("v10", "m s-1", vec![4.0, 1.0, 1.0]),
            ],
        );
        let s = summarize_grid(&g, GeoPoint::new(21.0, 0.4), now(), &SummaryOptions::default())
            .unwrap();
        assert!((s.temp_min.unwrap() - 10.0).abs() < 1e-9);
        assert!((s.temp_max.unwrap() - 20.0).abs() < 1e-9);
        assert!((s.rain_sum - 0.5).abs() < 1e-9);
        assert_eq!(s.pop_max, 0);
        assert_eq!(s.wind_max, Some(5.0));
        assert_eq!(s.first_desc, "");
    }

    #[test]
    fn test_window_excludes_late_steps() {
        let g = grid(&[0.0, 24.0, 72.0], &[("t2m", "degC", vec![1.0, 2.0, 30.0])]);
        let s = summarize_grid(&g, GeoPoint::new(10.0, 0.0), now(), &SummaryOptions::default())
            .unwrap();
        assert_eq!(s.temp_max, Some(2.0));
    }

    #[test]
    fn test_stale_run_falls_back_to_leading_steps() {
        let g = grid(&[-100.0, -99.0, -98.0], &[("t2m", "degC", vec![1.0, 2.0, 3.0])]);
        let options = SummaryOptions {
            fallback_steps: 2,
            ..SummaryOptions::default()
        };
        let s = summarize_grid(&g, GeoPoint::new(10.0, 0.0), now(), &options).unwrap();
        assert_eq!(s.temp_max, Some(2.0));
    }

    #[test]
    fn test_direct_wind_speed_preferred() {
        let g = grid(
            &[0.0],
            &[
                ("wind_speed", "m s-1", vec![7.0]),
                ("u10", "m s-1", vec![30.0]),
                ("v10", "m s-1", vec![40.0]),
            ],
        );
        let s = summarize_grid(&g, GeoPoint::new(10.0, 0.0), now(), &SummaryOptions::default())
            .unwrap();
        assert_eq!(s.wind_max, Some(7.0));
    }

    #[test]
    fn test_heuristic_can_be_disabled() {
        let g = grid(&[0.0], &[("tp", "mm", vec![0.5])]);
        let options = SummaryOptions {
            precip_unit_heuristic: false,
            ..SummaryOptions::default()
        };
        let s = summarize_grid(&g, GeoPoint::new(10.0, 0.0), now(), &options).unwrap();
        assert_eq!(s.rain_sum, 0.5);
        assert_eq!(s.pop_max, 100);
    }

    #[test]
    fn test_missing_axes_unavailable() {
        let mut g = Grid::new();
        g.insert_variable("t2m", Variable::axis("time", vec![280.0]));
        let err = summarize_grid(&g, GeoPoint::new(0.0, 0.0), now(), &SummaryOptions::default());
        assert!(matches!(err, Err(SignalError::SchemaMismatch(_))));
    }

    #[test]
    fn test_missing_time_unavailable() {
        let mut g = Grid::new();
        g.insert_coordinate("lat", Variable::axis("lat", vec![10.0]));
        g.insert_coordinate("lon", Variable::axis("lon", vec![0.0]));
        let err = summarize_grid(&g, GeoPoint::new(0.0, 0.0), now(), &SummaryOptions::default());
        assert!(matches!(err, Err(SignalError::SchemaMismatch(_))));
    }

    #[test]
    fn test_nothing_derived_is_unavailable() {
        let g = grid(&[0.0], &[("rh", "%", vec![50.0])]);
        let err = summarize_grid(&g, GeoPoint::new(0.0, 0.0), now(), &SummaryOptions::default());
        assert!(err.is_err());
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: SummaryOptions = serde_json::from_str(r#"{"window_hours": 24}"#).unwrap();
        assert_eq!(options.window_hours, 24);
        assert_eq!(options.fallback_steps, 16);
        assert!(options.precip_unit_heuristic);
    }
}
