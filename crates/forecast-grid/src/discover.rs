//! Variable name discovery.
//!
//! Forecast files name the same physical quantity differently per producer
//! (`t2m`, `2t`, `air_temperature_2m`, ...). Lookups go through prioritized
//! candidate lists: an exact match in candidate order wins, otherwise the
//! first available name containing any candidate as a substring.

use signals_common::Grid;

pub const LATITUDE: &[&str] = &["latitude", "lat", "gridlat", "y"];
pub const LONGITUDE: &[&str] = &["longitude", "lon", "gridlon", "x"];
pub const TIME: &[&str] = &["time", "forecast_time", "valid_time", "t"];
pub const TEMPERATURE: &[&str] = &["t2m", "t", "2t", "temperature", "air_temperature_2m"];
pub const PRECIPITATION: &[&str] = &["tp", "pr", "precipitation", "total_precipitation", "apcp"];
pub const WIND_SPEED: &[&str] = &["wind_speed", "wspd", "ws"];
pub const WIND_U: &[&str] = &["u10", "u", "10u"];
pub const WIND_V: &[&str] = &["v10", "v", "10v"];

/// Pick a name from `available`.
///
/// Pure function: exact match in candidate order, then the first available
/// name (in the order given) whose lowercase form contains a candidate.
pub fn discover<'a>(candidates: &[&str], available: &[&'a str]) -> Option<&'a str> {
    exact(candidates, available).or_else(|| substring(candidates, available))
}

/// Exact match only, in candidate order.
pub fn exact<'a>(candidates: &[&str], available: &[&'a str]) -> Option<&'a str> {
    candidates
        .iter()
        .find_map(|c| available.iter().find(|name| **name == *c).copied())
}

fn substring<'a>(candidates: &[&str], available: &[&'a str]) -> Option<&'a str> {
    available.iter().copied().find(|name| {
        let lower = name.to_lowercase();
        candidates.iter().any(|c| lower.contains(c))
    })
}

/// Discover a physical variable: exact over every field, then substring
/// over data variables only.
pub fn discover_variable<'g>(grid: &'g Grid, candidates: &[&str]) -> Option<&'g str> {
    exact(candidates, &grid.names())
        .or_else(|| substring(candidates, &grid.data_variable_names()))
}

/// Discover a horizontal axis: exact over every field.
pub fn discover_axis<'g>(grid: &'g Grid, candidates: &[&str]) -> Option<&'g str> {
    exact(candidates, &grid.names())
}

/// Discover the time axis: coordinates first, then any field.
pub fn discover_time<'g>(grid: &'g Grid) -> Option<&'g str> {
    exact(TIME, &grid.coordinate_names()).or_else(|| exact(TIME, &grid.names()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use signals_common::Variable;

    #[test]
    fn test_exact_follows_candidate_order() {
        let available = ["temperature", "t", "t2m"];
        assert_eq!(discover(TEMPERATURE, &available), Some("t2m"));
    }

    #[test]
    fn test_substring_fallback() {
        let available = ["air_temperature_at_2m", "precip_accum"];
        assert_eq!(discover(PRECIPITATION, &["PR_total"]), Some("PR_total"));
        assert_eq!(discover(&["precipitation"], &available), None);
        assert_eq!(discover(&["precip"], &available), Some("precip_accum"));
    }

    #[test]
    fn test_nothing_matches() {
        assert_eq!(discover(WIND_SPEED, &["cloud_cover"]), None);
        assert_eq!(discover(WIND_SPEED, &[]), None);
    }

    #[test]
    fn test_substring_ignores_coordinates() {
        let mut grid = Grid::new();
        grid.insert_coordinate("lat", Variable::axis("lat", vec![50.0]));
        grid.insert_variable("cloud", Variable::axis("lat", vec![1.0]));

        // "t" is a substring of "lat", but coordinates are not candidates.
        assert_eq!(discover_variable(&grid, TEMPERATURE), None);
        assert_eq!(discover_axis(&grid, LATITUDE), Some("lat"));
    }

    #[test]
    fn test_time_prefers_coordinates() {
        let mut grid = Grid::new();
        grid.insert_variable("time", Variable::axis("step", vec![0.0]));
        grid.insert_coordinate("valid_time", Variable::axis("step", vec![0.0]));
        assert_eq!(discover_time(&grid), Some("valid_time"));

        let mut grid = Grid::new();
        grid.insert_variable("forecast_time", Variable::axis("step", vec![0.0]));
        assert_eq!(discover_time(&grid), Some("forecast_time"));
    }
}
