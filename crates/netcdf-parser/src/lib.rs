//! NetCDF reader producing forecast grids.
//!
//! Classic-format files (CDF-1, CDF-2 and CDF-5) are decoded in pure Rust.
//! NetCDF-4 files are HDF5 containers; reading those needs the system
//! netcdf/HDF5 libraries and is available behind the `native` feature.
//!
//! ```toml
//! netcdf-parser = { path = "../netcdf-parser", features = ["native"] }
//! ```
//!
//! System requirements for `native`: libhdf5-dev libnetcdf-dev

pub mod classic;
pub mod error;
pub mod grid;
#[cfg(feature = "native")]
pub mod native;

use signals_common::Grid;

pub use classic::ClassicFile;
pub use error::{NetCdfError, NetCdfResult};
pub use grid::classic_to_grid;
#[cfg(feature = "native")]
pub use native::{native_to_grid, silence_hdf5_errors};

/// Signature of an HDF5 superblock (NetCDF-4 files).
pub const HDF5_MAGIC: &[u8; 8] = b"\x89HDF\r\n\x1a\n";

/// On-disk flavour of a NetCDF payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavour {
    /// Classic format with its version byte (1, 2 or 5)
    Classic(u8),
    /// NetCDF-4 / HDF5
    Hdf5,
}

/// Detect the NetCDF flavour from the leading bytes.
pub fn detect(data: &[u8]) -> Option<Flavour> {
    if data.len() >= 4 && &data[0..3] == b"CDF" {
        return Some(Flavour::Classic(data[3]));
    }
    if data.len() >= HDF5_MAGIC.len() && &data[..HDF5_MAGIC.len()] == HDF5_MAGIC {
        return Some(Flavour::Hdf5);
    }
    None
}

/// Whether this build can decode NetCDF-4/HDF5 payloads.
pub fn native_available() -> bool {
    cfg!(feature = "native")
}

/// Decode a NetCDF payload into a grid.
pub fn decode(data: &[u8]) -> NetCdfResult<Grid> {
    match detect(data) {
        Some(Flavour::Classic(_)) => classic_to_grid(data),
        Some(Flavour::Hdf5) => decode_hdf5(data),
        None => Err(NetCdfError::InvalidFormat(
            "payload is neither NetCDF classic nor HDF5".to_string(),
        )),
    }
}

#[cfg(feature = "native")]
fn decode_hdf5(data: &[u8]) -> NetCdfResult<Grid> {
    native_to_grid(data)
}

#[cfg(not(feature = "native"))]
fn decode_hdf5(_data: &[u8]) -> NetCdfResult<Grid> {
    Err(NetCdfError::Unsupported(
        "NetCDF-4/HDF5 payloads need the `native` feature".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_flavour() {
        assert_eq!(detect(b"CDF\x01rest"), Some(Flavour::Classic(1)));
        assert_eq!(detect(b"CDF\x02"), Some(Flavour::Classic(2)));
        assert_eq!(detect(b"\x89HDF\r\n\x1a\nmore"), Some(Flavour::Hdf5));
        assert_eq!(detect(b"GRIB"), None);
        assert_eq!(detect(b""), None);
    }

    #[test]
    fn test_decode_rejects_unknown_payload() {
        assert!(matches!(
            decode(b"<html>not found</html>"),
            Err(NetCdfError::InvalidFormat(_))
        ));
    }

    #[cfg(not(feature = "native"))]
    #[test]
    fn test_hdf5_needs_native_feature() {
        assert!(!native_available());
        assert!(matches!(
            decode(b"\x89HDF\r\n\x1a\n\0\0\0\0"),
            Err(NetCdfError::Unsupported(_))
        ));
    }
}
