//! GRIB2 parameter lookup tables.
//!
//! Translates (discipline, category, number) codes plus the first fixed
//! surface into the short variable names forecast consumers look for
//! (`t2m`, `tp`, `u10`, ...), together with their units.

use std::collections::HashMap;

/// Lookup key for parameter: (discipline, category, number)
pub type ParamKey = (u8, u8, u8);

/// Level type for "specified height above ground" (metres)
pub const LEVEL_HEIGHT_ABOVE_GROUND: u8 = 103;

/// Resolved variable name and units for a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterName {
    pub short_name: String,
    pub units: Option<String>,
}

#[derive(Debug, Clone)]
struct ParameterEntry {
    name: String,
    units: Option<String>,
}

/// GRIB2 parameter lookup tables.
///
/// Level aliases take precedence over the plain parameter name, so
/// temperature at 2 m above ground becomes `t2m` while temperature on any
/// other surface stays `t`.
#[derive(Debug, Clone, Default)]
pub struct Grib2Tables {
    parameters: HashMap<ParamKey, ParameterEntry>,
    /// (param, level_type, level_value in whole units) -> name
    level_aliases: HashMap<(ParamKey, u8, i64), String>,
}

impl Grib2Tables {
    /// Create empty tables
    pub fn new() -> Self {
        Self::default()
    }

    /// Tables covering the near-surface fields used for store forecasts.
    pub fn standard() -> Self {
        let mut tables = Self::new();
        let h = LEVEL_HEIGHT_ABOVE_GROUND;

        // Discipline 0, category 0: temperature
        tables.add_parameter(0, 0, 0, "t", Some("K"));
        tables.add_level_alias(0, 0, 0, h, 2, "t2m");
        tables.add_parameter(0, 0, 6, "d", Some("K"));
        tables.add_level_alias(0, 0, 6, h, 2, "d2m");

        // Category 1: moisture
        tables.add_parameter(0, 1, 1, "r", Some("%"));
        tables.add_level_alias(0, 1, 1, h, 2, "r2");
        tables.add_parameter(0, 1, 7, "prate", Some("kg m-2 s-1"));
        tables.add_parameter(0, 1, 8, "tp", Some("kg m-2"));

        // Category 2: momentum
        tables.add_parameter(0, 2, 1, "ws", Some("m s-1"));
        tables.add_parameter(0, 2, 2, "u", Some("m s-1"));
        tables.add_level_alias(0, 2, 2, h, 10, "u10");
        tables.add_parameter(0, 2, 3, "v", Some("m s-1"));
        tables.add_level_alias(0, 2, 3, h, 10, "v10");
        tables.add_parameter(0, 2, 22, "gust", Some("m s-1"));

        // Category 3: mass
        tables.add_parameter(0, 3, 0, "sp", Some("Pa"));
        tables.add_parameter(0, 3, 1, "prmsl", Some("Pa"));

        // Category 6: cloud
        tables.add_parameter(0, 6, 1, "tcc", Some("%"));

        tables
    }

    /// Add a parameter mapping
    pub fn add_parameter(
        &mut self,
        discipline: u8,
        category: u8,
        number: u8,
        name: &str,
        units: Option<&str>,
    ) {
        self.parameters.insert(
            (discipline, category, number),
            ParameterEntry {
                name: name.to_string(),
                units: units.map(str::to_string),
            },
        );
    }

    /// Name a parameter differently on one specific level.
    pub fn add_level_alias(
        &mut self,
        discipline: u8,
        category: u8,
        number: u8,
        level_type: u8,
        level_value: i64,
        name: &str,
    ) {
        self.level_aliases.insert(
            ((discipline, category, number), level_type, level_value),
            name.to_string(),
        );
    }

    /// Look up parameter short name by GRIB2 codes.
    ///
    /// Returns "P{discipline}_{category}_{number}" if not found.
    pub fn get_parameter_name(&self, discipline: u8, category: u8, number: u8) -> String {
        self.parameters
            .get(&(discipline, category, number))
            .map(|e| e.name.clone())
            .unwrap_or_else(|| format!("P{}_{}_{}", discipline, category, number))
    }

    /// Resolve the variable name and units for a field on a given level.
    pub fn lookup(
        &self,
        discipline: u8,
        category: u8,
        number: u8,
        level_type: u8,
        level_value: f64,
    ) -> ParameterName {
        let key = (discipline, category, number);
        let units = self.parameters.get(&key).and_then(|e| e.units.clone());

        let alias = if level_value.fract() == 0.0 {
            self.level_aliases
                .get(&(key, level_type, level_value as i64))
                .cloned()
        } else {
            None
        };

        ParameterName {
            short_name: alias
                .unwrap_or_else(|| self.get_parameter_name(discipline, category, number)),
            units,
        }
    }

    /// Get the number of parameters in the table
    pub fn parameter_count(&self) -> usize {
        self.parameters.len()
    }

    /// Check if the tables are empty
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty() && self.level_aliases.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_aliases() {
        let tables = Grib2Tables::standard();

        assert_eq!(tables.lookup(0, 0, 0, 103, 2.0).short_name, "t2m");
        assert_eq!(tables.lookup(0, 0, 0, 100, 85000.0).short_name, "t");
        assert_eq!(tables.lookup(0, 2, 2, 103, 10.0).short_name, "u10");
        assert_eq!(tables.lookup(0, 2, 3, 103, 10.0).short_name, "v10");
        assert_eq!(tables.lookup(0, 1, 8, 1, 0.0).short_name, "tp");
    }

    #[test]
    fn test_units_follow_parameter() {
        let tables = Grib2Tables::standard();
        let name = tables.lookup(0, 0, 0, 103, 2.0);
        assert_eq!(name.units.as_deref(), Some("K"));
    }

    #[test]
    fn test_parameter_not_found() {
        let tables = Grib2Tables::standard();

        let name = tables.lookup(99, 99, 99, 1, 0.0);
        assert_eq!(name.short_name, "P99_99_99");
        assert_eq!(name.units, None);
    }

    #[test]
    fn test_empty_tables() {
        let tables = Grib2Tables::new();

        assert_eq!(tables.parameter_count(), 0);
        assert!(tables.is_empty());
        assert_eq!(tables.get_parameter_name(0, 0, 0), "P0_0_0");
    }
}
