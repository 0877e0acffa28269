//! Store directory entries.

use serde::{Deserialize, Serialize};

use crate::grid::GeoPoint;

/// One physical store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreInfo {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub postcode: String,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
}

impl StoreInfo {
    /// Four-digit postcode, or empty when the configured one has no digits.
    pub fn postcode4(&self) -> String {
        postcode4(&self.postcode)
    }

    /// Coordinates, when both are configured.
    pub fn location(&self) -> Option<GeoPoint> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Some(GeoPoint::new(lat, lon)),
            _ => None,
        }
    }
}

/// Lookup table of stores by id and display name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreDirectory {
    #[serde(default)]
    pub stores: Vec<StoreInfo>,
}

impl StoreDirectory {
    pub fn new(stores: Vec<StoreInfo>) -> Self {
        Self { stores }
    }

    pub fn by_id(&self, id: u64) -> Option<&StoreInfo> {
        self.stores.iter().find(|s| s.id == id)
    }

    pub fn by_name(&self, name: &str) -> Option<&StoreInfo> {
        self.stores.iter().find(|s| s.name.eq_ignore_ascii_case(name))
    }

    /// Display names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.stores.iter().map(|s| s.name.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn ids(&self) -> Vec<u64> {
        self.stores.iter().map(|s| s.id).collect()
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }
}

/// Reduce a postcode to its leading four digits ("3811 AB" -> "3811").
pub fn postcode4(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| c.is_ascii_digit())
        .take(4)
        .collect()
}
