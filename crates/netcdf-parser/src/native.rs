//! Native NetCDF-4/HDF5 reading using the netcdf library.
//!
//! The netcdf library requires a file path (it wraps libnetcdf/HDF5 which need
//! file handles). When reading from bytes, we write to a temp file first.
//!
//! On Linux, `/dev/shm` (memory-backed tmpfs) is used when writable.

use std::collections::BTreeSet;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Once;

use signals_common::{Grid, Variable};
use tracing::debug;

use crate::error::{NetCdfError, NetCdfResult};
use crate::grid::{apply_packing, Packing};

/// Silence HDF5's automatic error printing to stderr.
///
/// The HDF5 C library prints verbose error messages to stderr even when errors
/// are handled gracefully by the Rust code (e.g., when checking for optional
/// attributes that don't exist). Safe to call multiple times.
pub fn silence_hdf5_errors() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        // SAFETY: H5Eset_auto2 is thread-safe and we're passing null pointers
        // to disable error output, which is a documented valid use.
        unsafe {
            hdf5_metno_sys::h5e::H5Eset_auto2(
                hdf5_metno_sys::h5e::H5E_DEFAULT,
                None,
                std::ptr::null_mut(),
            );
        }
    });
}

/// Removes the temp file on every exit path.
struct TempPath(PathBuf);

impl Drop for TempPath {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

/// Decode any NetCDF payload the system library understands into a grid.
pub fn native_to_grid(data: &[u8]) -> NetCdfResult<Grid> {
    silence_hdf5_errors();

    let temp = TempPath(get_optimal_temp_dir().join(generate_temp_filename()));
    let mut file = std::fs::File::create(&temp.0)?;
    file.write_all(data)?;
    drop(file);

    let nc_file = netcdf::open(&temp.0)
        .map_err(|e| NetCdfError::InvalidFormat(format!("Failed to open NetCDF: {}", e)))?;

    let mut coordinates = BTreeSet::new();
    let mut grid = Grid::new();

    for var in nc_file.variables() {
        let name = var.name();
        let dims: Vec<String> = var.dimensions().iter().map(|d| d.name()).collect();
        let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();

        if dims.len() == 1 && dims[0] == name {
            coordinates.insert(name.clone());
        }
        if let Some(listed) = get_str_attr(&var, "coordinates") {
            coordinates.extend(listed.split_whitespace().map(str::to_string));
        }

        // Text and compound variables do not convert to f64.
        let raw: Vec<f64> = match var.get_values(..) {
            Ok(values) => values,
            Err(e) => {
                debug!(variable = %name, error = %e, "Skipping non-numeric variable");
                continue;
            }
        };

        let values = apply_packing(
            raw,
            Packing {
                fill: get_f64_attr(&var, "_FillValue"),
                missing: get_f64_attr(&var, "missing_value"),
                scale: get_f64_attr(&var, "scale_factor").unwrap_or(1.0),
                offset: get_f64_attr(&var, "add_offset").unwrap_or(0.0),
            },
        );

        let variable = Variable::new(dims, shape, values)
            .map_err(|e| NetCdfError::InvalidFormat(format!("{}: {}", name, e)))?;
        let variable = match get_str_attr(&var, "units") {
            Some(units) => variable.with_units(units),
            None => variable,
        };
        grid.insert_variable(name, variable);
    }

    for name in &coordinates {
        grid.mark_coordinate(name);
    }

    if grid.is_empty() {
        return Err(NetCdfError::MissingData("no numeric variables".to_string()));
    }
    Ok(grid)
}

// =============================================================================
// Internal helpers
// =============================================================================

/// Get the optimal temp directory for NetCDF file operations.
fn get_optimal_temp_dir() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        use std::path::Path;
        let shm_path = Path::new("/dev/shm");
        if shm_path.exists() && shm_path.is_dir() {
            let test_path = shm_path.join(format!(".netcdf_test_{}", std::process::id()));
            if std::fs::write(&test_path, b"test").is_ok() {
                let _ = std::fs::remove_file(&test_path);
                return shm_path.to_path_buf();
            }
        }
    }

    std::env::temp_dir()
}

/// Unique temp file name from process ID, thread ID and a counter.
fn generate_temp_filename() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let pid = std::process::id();
    let tid = std::thread::current().id();
    let count = COUNTER.fetch_add(1, Ordering::Relaxed);

    format!("forecast_native_{}_{:?}_{}.nc", pid, tid, count)
}

/// Check if a variable has an attribute with the given name.
/// This avoids HDF5 error spam when checking for optional attributes.
fn has_attr(var: &netcdf::Variable, name: &str) -> bool {
    var.attributes().any(|attr| attr.name() == name)
}

fn get_f64_attr(var: &netcdf::Variable, name: &str) -> Option<f64> {
    if !has_attr(var, name) {
        return None;
    }
    let attr_value = var.attribute_value(name)?.ok()?;
    f64::try_from(attr_value).ok()
}

fn get_str_attr(var: &netcdf::Variable, name: &str) -> Option<String> {
    if !has_attr(var, name) {
        return None;
    }
    match var.attribute_value(name)?.ok()? {
        netcdf::AttributeValue::Str(s) => Some(s),
        _ => None,
    }
}
