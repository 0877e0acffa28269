//! Classic-format file to [`Grid`] conversion.

use std::collections::BTreeSet;

use signals_common::{Grid, Variable};
use tracing::debug;

use crate::classic::{AttrValue, ClassicFile, NcType, VariableHeader};
use crate::error::{NetCdfError, NetCdfResult};

/// Decode every numeric variable of a classic-format file.
///
/// Packed values are unpacked with `scale_factor`/`add_offset`, and cells
/// equal to `_FillValue` or `missing_value` become `NaN`. Dimension
/// variables and names listed in any `coordinates` attribute are marked as
/// coordinates.
pub fn classic_to_grid(data: &[u8]) -> NetCdfResult<Grid> {
    let file = ClassicFile::parse(data)?;
    debug!(
        version = file.version,
        dims = file.dimensions.len(),
        vars = file.variables.len(),
        numrecs = file.numrecs,
        "Parsed NetCDF classic header"
    );

    let coordinates = coordinate_names(&file);
    let mut grid = Grid::new();

    for header in &file.variables {
        if header.nc_type == NcType::Char {
            continue;
        }

        let raw = file.read_raw(header)?;
        let values = unpack(header, raw);
        let (dims, shape) = file.shape(header);

        let var = Variable::new(dims, shape, values)
            .map_err(|e| NetCdfError::InvalidFormat(format!("{}: {}", header.name, e)))?;
        let var = match header.attribute("units").and_then(AttrValue::as_text) {
            Some(units) => var.with_units(units),
            None => var,
        };

        if coordinates.contains(&header.name) {
            grid.insert_coordinate(header.name.clone(), var);
        } else {
            grid.insert_variable(header.name.clone(), var);
        }
    }

    if grid.is_empty() {
        return Err(NetCdfError::MissingData("no numeric variables".to_string()));
    }
    Ok(grid)
}

fn coordinate_names(file: &ClassicFile<'_>) -> BTreeSet<String> {
    let mut names: BTreeSet<String> = file
        .variables
        .iter()
        .filter(|v| {
            v.dim_ids.len() == 1
                && file
                    .dimensions
                    .get(v.dim_ids[0])
                    .map_or(false, |d| d.name == v.name)
        })
        .map(|v| v.name.clone())
        .collect();

    for var in &file.variables {
        if let Some(listed) = var.attribute("coordinates").and_then(AttrValue::as_text) {
            names.extend(listed.split_whitespace().map(str::to_string));
        }
    }
    names
}

/// Apply CF packing and missing-value conventions.
fn unpack(header: &VariableHeader, raw: Vec<f64>) -> Vec<f64> {
    let number = |name: &str| header.attribute(name).and_then(AttrValue::as_number);
    apply_packing(
        raw,
        Packing {
            fill: number("_FillValue"),
            missing: number("missing_value"),
            scale: number("scale_factor").unwrap_or(1.0),
            offset: number("add_offset").unwrap_or(0.0),
        },
    )
}

/// CF packing attributes of one variable.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Packing {
    pub fill: Option<f64>,
    pub missing: Option<f64>,
    pub scale: f64,
    pub offset: f64,
}

pub(crate) fn apply_packing(raw: Vec<f64>, packing: Packing) -> Vec<f64> {
    raw.into_iter()
        .map(|v| {
            if Some(v) == packing.fill || Some(v) == packing.missing || v.is_nan() {
                f64::NAN
            } else {
                v * packing.scale + packing.offset
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_packing() {
        let packing = Packing {
            fill: Some(-32767.0),
            missing: None,
            scale: 0.01,
            offset: 273.15,
        };
        let out = apply_packing(vec![0.0, 100.0, -32767.0], packing);
        assert!((out[0] - 273.15).abs() < 1e-9);
        assert!((out[1] - 274.15).abs() < 1e-9);
        assert!(out[2].is_nan());
    }
}
