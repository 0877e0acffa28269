//! GRIB2 reader (WMO FM 92 GRIB Edition 2).
//!
//! Pure Rust decoding of regular latitude/longitude GRIB2 fields packed
//! with simple packing, which covers the surface fields of the common NWP
//! models. Messages are read one at a time with [`Grib2Reader`] and can be
//! assembled into a time-stacked [`signals_common::Grid`] with [`to_grid`].

pub mod grid;
pub mod reader;
pub mod sections;
pub mod tables;
pub mod unpacking;

use thiserror::Error;

pub use grid::to_grid;
pub use reader::{Grib2Message, Grib2Reader};
pub use tables::{Grib2Tables, ParameterName};
pub use unpacking::unpack_simple;

/// Magic bytes at the start of every GRIB message.
pub const GRIB_MAGIC: &[u8; 4] = b"GRIB";

/// Quick check whether a payload starts like a GRIB message.
pub fn looks_like_grib(data: &[u8]) -> bool {
    data.len() >= 8 && &data[0..4] == GRIB_MAGIC
}

/// Errors raised while reading GRIB2 data.
#[derive(Debug, Error)]
pub enum Grib2Error {
    #[error("Invalid GRIB2 format: {0}")]
    InvalidFormat(String),

    #[error("Invalid section {section}: {reason}")]
    InvalidSection { section: u8, reason: String },

    #[error("Unsupported grid template {0}")]
    UnsupportedGrid(u16),

    #[error("Unsupported packing template {0}")]
    UnsupportedPacking(u16),

    #[error("Unpacking failed: {0}")]
    UnpackingError(String),

    #[error("No usable messages in payload")]
    NoMessages,
}
