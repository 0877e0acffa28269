//! Assemble GRIB2 messages into a time-stacked [`Grid`].

use std::collections::{BTreeMap, BTreeSet};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use signals_common::{Grid, Variable};
use tracing::{debug, warn};

use crate::reader::Grib2Reader;
use crate::sections::GridDefinition;
use crate::tables::Grib2Tables;
use crate::Grib2Error;

pub const TIME_DIM: &str = "time";
pub const LAT_DIM: &str = "latitude";
pub const LON_DIM: &str = "longitude";
pub const TIME_UNITS: &str = "seconds since 1970-01-01 00:00:00";

struct FieldSeries {
    units: Option<String>,
    level: (u8, i64),
    steps: BTreeMap<DateTime<Utc>, Vec<f64>>,
}

/// Decode every supported message in `data` into one grid.
///
/// Each distinct parameter becomes a variable with dims
/// `(time, latitude, longitude)`. The time axis is the sorted union of all
/// valid times; steps a variable lacks are filled with `NaN`. Messages on a
/// different grid than the first accepted one, or with unsupported templates,
/// are skipped.
pub fn to_grid(data: Bytes, tables: &Grib2Tables) -> Result<Grid, Grib2Error> {
    let mut reader = Grib2Reader::new(data);
    let mut reference: Option<GridDefinition> = None;
    let mut fields: BTreeMap<String, FieldSeries> = BTreeMap::new();
    let mut times: BTreeSet<DateTime<Utc>> = BTreeSet::new();
    let mut last_error: Option<Grib2Error> = None;
    let mut skipped = 0usize;

    loop {
        let message = match reader.next_message() {
            Ok(Some(message)) => message,
            Ok(None) => break,
            Err(e) => {
                debug!(error = %e, "Skipping GRIB2 message");
                skipped += 1;
                last_error = Some(e);
                continue;
            }
        };

        let grid_def = &message.grid_definition;
        match &reference {
            Some(r) if !same_grid(r, grid_def) => {
                debug!(
                    ni = grid_def.ni,
                    nj = grid_def.nj,
                    "Skipping message on a different grid"
                );
                skipped += 1;
                continue;
            }
            Some(_) => {}
            None => reference = Some(grid_def.clone()),
        }

        let Some(valid_time) = message.valid_time() else {
            debug!(
                time_unit = message.product_definition.time_unit,
                "Skipping message with unknown time unit"
            );
            skipped += 1;
            continue;
        };

        let values = match message.unpack_data() {
            Ok(values) => values,
            Err(e) => {
                warn!(error = %e, "Failed to unpack GRIB2 field");
                skipped += 1;
                last_error = Some(e);
                continue;
            }
        };

        let parameter = message.parameter(tables);
        let product = &message.product_definition;
        let level = (product.level_type, product.level_value.round() as i64);

        // Same parameter on another level gets its own variable.
        let name = match fields.get(&parameter.short_name) {
            Some(series) if series.level != level => {
                format!("{}_{}_{}", parameter.short_name, level.0, level.1)
            }
            _ => parameter.short_name,
        };

        let series = fields.entry(name).or_insert_with(|| FieldSeries {
            units: parameter.units,
            level,
            steps: BTreeMap::new(),
        });
        series.steps.insert(valid_time, values);
        times.insert(valid_time);
    }

    let Some(grid_def) = reference.filter(|_| !fields.is_empty()) else {
        return Err(last_error.unwrap_or(Grib2Error::NoMessages));
    };

    if skipped > 0 {
        debug!(skipped, "Some GRIB2 messages were not used");
    }

    build_grid(&grid_def, fields, &times)
}

fn build_grid(
    grid_def: &GridDefinition,
    fields: BTreeMap<String, FieldSeries>,
    times: &BTreeSet<DateTime<Utc>>,
) -> Result<Grid, Grib2Error> {
    let (nj, ni) = grid_def.dims();
    let plane = nj * ni;
    let times: Vec<DateTime<Utc>> = times.iter().copied().collect();

    let mut grid = Grid::new();
    grid.insert_coordinate(
        LAT_DIM,
        Variable::axis(LAT_DIM, grid_def.latitudes()).with_units("degrees_north"),
    );
    grid.insert_coordinate(
        LON_DIM,
        Variable::axis(LON_DIM, grid_def.longitudes()).with_units("degrees_east"),
    );
    let epoch_seconds = times.iter().map(|t| t.timestamp() as f64).collect();
    grid.insert_coordinate(
        TIME_DIM,
        Variable::axis(TIME_DIM, epoch_seconds).with_units(TIME_UNITS),
    );

    for (name, series) in fields {
        let mut data = vec![f64::NAN; times.len() * plane];
        for (t, time) in times.iter().enumerate() {
            if let Some(values) = series.steps.get(time) {
                let n = values.len().min(plane);
                data[t * plane..t * plane + n].copy_from_slice(&values[..n]);
            }
        }

        let var = Variable::new(
            vec![TIME_DIM.to_string(), LAT_DIM.to_string(), LON_DIM.to_string()],
            vec![times.len(), nj, ni],
            data,
        )
        .map_err(|e| Grib2Error::InvalidFormat(e.to_string()))?;

        let var = match series.units {
            Some(units) => var.with_units(units),
            None => var,
        };
        grid.insert_variable(name, var);
    }

    Ok(grid)
}

fn same_grid(a: &GridDefinition, b: &GridDefinition) -> bool {
    a.ni == b.ni
        && a.nj == b.nj
        && a.la1 == b.la1
        && a.lo1 == b.lo1
        && a.la2 == b.la2
        && a.lo2 == b.lo2
        && a.scanning_mode == b.scanning_mode
}
