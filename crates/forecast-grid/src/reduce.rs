//! Reductions from windowed point series to summary statistics.
//!
//! Every reduction ignores NaN. Each one is independent: a variable that
//! cannot be reduced leaves its summary field underived without affecting
//! the others.

use signals_common::percent;

/// Offset between Kelvin and Celsius.
pub const KELVIN_OFFSET: f64 = 273.15;

/// Whether a `units` attribute denotes Kelvin.
pub fn is_kelvin(units: Option<&str>) -> bool {
    matches!(
        units.map(|u| u.trim().to_ascii_lowercase()).as_deref(),
        Some("k") | Some("kelvin") | Some("degk") | Some("deg_k")
    )
}

/// Minimum and maximum, or `None` if there is no finite value.
pub fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    values
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

/// Temperature range in Celsius.
pub fn temperature_range(values: &[f64], kelvin: bool) -> Option<(f64, f64)> {
    let (lo, hi) = min_max(values)?;
    if kelvin {
        Some((lo - KELVIN_OFFSET, hi - KELVIN_OFFSET))
    } else {
        Some((lo, hi))
    }
}

/// Accumulated precipitation in millimeters.
///
/// With `unit_heuristic`, a total below 1.0 is taken to be in meters and
/// scaled by 1000. This is an approximation: a genuinely dry window in
/// millimeters gets scaled too.
pub fn precipitation_sum(values: &[f64], unit_heuristic: bool) -> f64 {
    let total: f64 = values.iter().filter(|v| !v.is_nan()).sum();
    if unit_heuristic && total < 1.0 {
        total * 1000.0
    } else {
        total
    }
}

/// Share of values strictly above `threshold`, as a rounded percentage.
///
/// The denominator counts every value, NaN included.
pub fn probability_of_precipitation(values: &[f64], threshold: f64) -> u8 {
    let wet = values.iter().filter(|&&v| v > threshold).count();
    percent(wet as f64 / values.len().max(1) as f64 * 100.0)
}

/// Maximum value, or `None` if there is no finite value.
pub fn nan_max(values: &[f64]) -> Option<f64> {
    min_max(values).map(|(_, hi)| hi)
}

/// Maximum wind speed from its components.
///
/// `None` when the series lengths differ or no pair is finite.
pub fn wind_from_components(u: &[f64], v: &[f64]) -> Option<f64> {
    if u.len() != v.len() {
        return None;
    }
    let speeds: Vec<f64> = u.iter().zip(v).map(|(u, v)| u.hypot(*v)).collect();
    nan_max(&speeds)
}
