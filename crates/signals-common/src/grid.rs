//! In-memory gridded dataset decoded from GRIB2 or NetCDF payloads.
//!
//! A [`Grid`] is a flat collection of named n-dimensional [`Variable`]s,
//! some of which are marked as coordinates (latitude, longitude, time).
//! Names follow whatever convention the producing file used; consumers
//! discover them by candidate lists rather than assuming fixed names.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{SignalError, SignalResult};
use crate::time::{CfTimeUnits, TimeParseError};

/// A geographic target point in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Short key used for cache lookups (about 1 km resolution).
    pub fn cache_key(&self) -> String {
        format!("{:.2},{:.2}", self.lat, self.lon)
    }
}

/// An n-dimensional array of values stored in row-major order.
///
/// Missing cells are stored as `NaN`.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    dims: Vec<String>,
    shape: Vec<usize>,
    data: Vec<f64>,
    units: Option<String>,
}

impl Variable {
    /// Create a variable, checking that the data length matches the shape.
    pub fn new(dims: Vec<String>, shape: Vec<usize>, data: Vec<f64>) -> SignalResult<Self> {
        if dims.len() != shape.len() {
            return Err(SignalError::Decode(format!(
                "{} dimension names for {} axes",
                dims.len(),
                shape.len()
            )));
        }
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(SignalError::Decode(format!(
                "shape {:?} needs {} values, got {}",
                shape,
                expected,
                data.len()
            )));
        }
        Ok(Self {
            dims,
            shape,
            data,
            units: None,
        })
    }

    /// A one-dimensional variable indexed by its own dimension.
    pub fn axis(name: &str, values: Vec<f64>) -> Self {
        Self {
            dims: vec![name.to_string()],
            shape: vec![values.len()],
            data: values,
            units: None,
        }
    }

    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = Some(units.into());
        self
    }

    pub fn dims(&self) -> &[String] {
        &self.dims
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn units(&self) -> Option<&str> {
        self.units.as_deref()
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Position of a named dimension.
    pub fn dim_index(&self, name: &str) -> Option<usize> {
        self.dims.iter().position(|d| d == name)
    }

    /// Select values by per-dimension index lists.
    ///
    /// Dimensions named in `picks` are restricted to the given indices
    /// (out-of-range indices are dropped); every other dimension is taken in
    /// full. Values come back in row-major order of the selection.
    pub fn select(&self, picks: &HashMap<String, Vec<usize>>) -> Vec<f64> {
        let axes: Vec<Vec<usize>> = self
            .dims
            .iter()
            .zip(&self.shape)
            .map(|(dim, &len)| match picks.get(dim) {
                Some(indices) => indices.iter().copied().filter(|&i| i < len).collect(),
                None => (0..len).collect(),
            })
            .collect();

        if axes.iter().any(|a| a.is_empty()) {
            return Vec::new();
        }

        let strides = self.strides();
        let total: usize = axes.iter().map(|a| a.len()).product();
        let mut out = Vec::with_capacity(total);
        let mut cursor = vec![0usize; axes.len()];

        loop {
            let offset: usize = cursor
                .iter()
                .enumerate()
                .map(|(axis, &pos)| axes[axis][pos] * strides[axis])
                .sum();
            out.push(self.data[offset]);

            // Odometer increment, last axis fastest.
            let mut axis = axes.len();
            loop {
                if axis == 0 {
                    return out;
                }
                axis -= 1;
                cursor[axis] += 1;
                if cursor[axis] < axes[axis].len() {
                    break;
                }
                cursor[axis] = 0;
            }
        }
    }

    /// Map every value in place.
    pub fn map_values(&mut self, f: impl Fn(f64) -> f64) {
        for v in &mut self.data {
            *v = f(*v);
        }
    }

    fn strides(&self) -> Vec<usize> {
        let mut strides = vec![1usize; self.shape.len()];
        for i in (0..self.shape.len().saturating_sub(1)).rev() {
            strides[i] = strides[i + 1] * self.shape[i + 1];
        }
        strides
    }
}

/// A decoded gridded dataset.
///
/// Names iterate in sorted order so discovery is deterministic.
#[derive(Debug, Clone, Default)]
pub struct Grid {
    variables: BTreeMap<String, Variable>,
    coordinates: BTreeSet<String>,
}

impl Grid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a coordinate variable (latitude, longitude, time, ...).
    pub fn insert_coordinate(&mut self, name: impl Into<String>, var: Variable) {
        let name = name.into();
        self.coordinates.insert(name.clone());
        self.variables.insert(name, var);
    }

    /// Insert a data variable.
    pub fn insert_variable(&mut self, name: impl Into<String>, var: Variable) {
        let name = name.into();
        self.coordinates.remove(&name);
        self.variables.insert(name, var);
    }

    /// Mark an already-inserted variable as a coordinate.
    pub fn mark_coordinate(&mut self, name: &str) {
        if self.variables.contains_key(name) {
            self.coordinates.insert(name.to_string());
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn is_coordinate(&self, name: &str) -> bool {
        self.coordinates.contains(name)
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.get(name)
    }

    pub fn variable_mut(&mut self, name: &str) -> Option<&mut Variable> {
        self.variables.get_mut(name)
    }

    /// Every field name, coordinates included.
    pub fn names(&self) -> Vec<&str> {
        self.variables.keys().map(String::as_str).collect()
    }

    pub fn coordinate_names(&self) -> Vec<&str> {
        self.coordinates.iter().map(String::as_str).collect()
    }

    /// Names of non-coordinate variables.
    pub fn data_variable_names(&self) -> Vec<&str> {
        self.variables
            .keys()
            .filter(|name| !self.coordinates.contains(*name))
            .map(String::as_str)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Interpret a variable as timestamps.
    ///
    /// Uses CF-style `"<unit> since <epoch>"` units when present, otherwise
    /// treats values as seconds since the Unix epoch. `NaN` steps are
    /// reported as `None`.
    pub fn time_values(&self, name: &str) -> Result<Vec<Option<DateTime<Utc>>>, TimeParseError> {
        let var = self
            .variables
            .get(name)
            .ok_or_else(|| TimeParseError::InvalidFormat(format!("no variable '{}'", name)))?;

        let units = match var.units() {
            Some(u) if u.contains(" since ") => CfTimeUnits::parse(u)?,
            _ => CfTimeUnits::unix_seconds(),
        };

        Ok(var.data().iter().map(|&v| units.to_datetime(v)).collect())
    }
}
