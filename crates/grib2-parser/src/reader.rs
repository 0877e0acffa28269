//! Sequential message reader.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::sections::{
    self, Bitmap, DataRepresentation, DataSection, GridDefinition, Identification, Indicator,
    ProductDefinition,
};
use crate::tables::{Grib2Tables, ParameterName};
use crate::unpacking::unpack_simple;
use crate::{Grib2Error, GRIB_MAGIC};

/// One fully parsed GRIB2 message holding a single field.
#[derive(Debug, Clone)]
pub struct Grib2Message {
    pub indicator: Indicator,
    pub identification: Identification,
    pub grid_definition: GridDefinition,
    pub product_definition: ProductDefinition,
    pub data_representation: DataRepresentation,
    pub bitmap: Option<Bitmap>,
    pub data_section: DataSection,
}

impl Grib2Message {
    /// Parse a single message (from `GRIB` through `7777`).
    pub fn parse(msg: &[u8]) -> Result<Self, Grib2Error> {
        let indicator = sections::parse_indicator(msg)?;
        if indicator.edition != 2 {
            return Err(Grib2Error::InvalidFormat(format!(
                "GRIB edition {} is not supported",
                indicator.edition
            )));
        }

        Ok(Self {
            indicator,
            identification: sections::parse_identification(msg)?,
            grid_definition: sections::parse_grid_definition(msg)?,
            product_definition: sections::parse_product_definition(msg)?,
            data_representation: sections::parse_data_representation(msg)?,
            bitmap: sections::parse_bitmap(msg)?,
            data_section: sections::parse_data_section(msg)?,
        })
    }

    /// Variable name and units for this field.
    pub fn parameter(&self, tables: &Grib2Tables) -> ParameterName {
        let product = &self.product_definition;
        tables.lookup(
            self.indicator.discipline,
            product.parameter_category,
            product.parameter_number,
            product.level_type,
            product.level_value,
        )
    }

    pub fn reference_time(&self) -> DateTime<Utc> {
        self.identification.reference_time
    }

    /// Time the field is valid for.
    pub fn valid_time(&self) -> Option<DateTime<Utc>> {
        self.product_definition.valid_time(self.reference_time())
    }

    /// Decode the field into row-major `[lat][lon]` values, `NaN` for missing.
    pub fn unpack_data(&self) -> Result<Vec<f64>, Grib2Error> {
        let rep = &self.data_representation;
        let values = unpack_simple(
            &self.data_section.data,
            self.grid_definition.num_points as usize,
            rep.bits_per_value,
            rep.reference_value,
            rep.binary_scale_factor,
            rep.decimal_scale_factor,
            self.bitmap.as_ref().map(|b| b.data.as_ref()),
        )?;
        Ok(self.grid_definition.to_row_major(values))
    }
}

/// Reads consecutive GRIB2 messages out of a byte buffer.
///
/// Bytes between messages (padding, headers of wrapping formats) are
/// skipped by scanning for the next `GRIB` marker.
pub struct Grib2Reader {
    data: Bytes,
    offset: usize,
}

impl Grib2Reader {
    pub fn new(data: Bytes) -> Self {
        Self { data, offset: 0 }
    }

    /// Parse the next message. Returns `Ok(None)` once the buffer is exhausted.
    pub fn next_message(&mut self) -> Result<Option<Grib2Message>, Grib2Error> {
        let Some(start) = self.find_next_magic() else {
            self.offset = self.data.len();
            return Ok(None);
        };
        // Past the marker, so a broken header does not stall the reader.
        self.offset = start + GRIB_MAGIC.len();

        let indicator = sections::parse_indicator(&self.data[start..])?;
        let length = usize::try_from(indicator.message_length).map_err(|_| {
            Grib2Error::InvalidFormat(format!(
                "message length {} overflows",
                indicator.message_length
            ))
        })?;
        let end = start
            .checked_add(length)
            .filter(|&end| end <= self.data.len() && length >= 20)
            .ok_or_else(|| {
                Grib2Error::InvalidFormat(format!(
                    "message at offset {} declares {} bytes, {} available",
                    start,
                    length,
                    self.data.len() - start
                ))
            })?;

        self.offset = end;

        let msg = self.data.slice(start..end);
        if &msg[msg.len() - 4..] != b"7777" {
            return Err(Grib2Error::InvalidFormat(format!(
                "message at offset {} is missing its end marker",
                start
            )));
        }

        debug!(offset = start, length, "Parsing GRIB2 message");
        Grib2Message::parse(&msg).map(Some)
    }

    fn find_next_magic(&self) -> Option<usize> {
        let rest = self.data.get(self.offset..)?;
        rest.windows(GRIB_MAGIC.len())
            .position(|w| w == GRIB_MAGIC)
            .map(|pos| self.offset + pos)
    }
}
