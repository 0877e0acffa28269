//! GRIB2 section parsing.
//!
//! This module handles parsing of individual GRIB2 message sections.
//! Every function takes the bytes of one complete message, from the `GRIB`
//! magic up to and including the `7777` end marker.

use crate::Grib2Error;
use bytes::Bytes;
use chrono::{DateTime, Duration, NaiveDate, Utc};

/// Value used by GRIB2 for "missing" in unsigned 4-octet fields.
const MISSING_U32: u32 = 0xFFFF_FFFF;

/// Section 0: Indicator Section (16 bytes)
#[derive(Debug, Clone)]
pub struct Indicator {
    pub discipline: u8,
    pub edition: u8,
    pub message_length: u64,
}

/// Section 1: Identification Section
#[derive(Debug, Clone)]
pub struct Identification {
    pub center: u16,
    pub sub_center: u16,
    pub significance_of_reference_time: u8,
    pub reference_time: DateTime<Utc>,
    pub production_status: u8,
    pub data_type: u8,
}

/// Section 3: Grid Definition Section
///
/// Coordinates are kept in the file's native unit (microdegrees unless the
/// template specifies a basic angle) and converted on access.
#[derive(Debug, Clone)]
pub struct GridDefinition {
    pub template: u16,
    pub num_points: u32,
    pub ni: u32,
    pub nj: u32,
    pub la1: i32,
    pub lo1: i32,
    pub la2: i32,
    pub lo2: i32,
    pub di: u32,
    pub dj: u32,
    pub scanning_mode: u8,
    /// (basic angle, subdivisions) when coordinates are not in microdegrees
    pub angle_unit: Option<(u32, u32)>,
}

/// Section 4: Product Definition Section
#[derive(Debug, Clone)]
pub struct ProductDefinition {
    pub template: u16,
    pub parameter_category: u8,
    pub parameter_number: u8,
    pub time_unit: u8,
    pub forecast_time: u32,
    pub level_type: u8,
    pub level_value: f64,
    /// End of the statistical processing interval (template 4.8 and friends)
    pub interval_end: Option<DateTime<Utc>>,
}

/// Section 5: Data Representation Section
#[derive(Debug, Clone)]
pub struct DataRepresentation {
    pub num_data_points: u32,
    pub template: u16,
    pub reference_value: f32,
    pub binary_scale_factor: i16,
    pub decimal_scale_factor: i16,
    pub bits_per_value: u8,
}

/// Section 6: Bitmap Section
#[derive(Debug, Clone)]
pub struct Bitmap {
    pub indicator: u8,
    pub data: Bytes,
}

/// Section 7: Data Section
#[derive(Debug, Clone)]
pub struct DataSection {
    pub data: Bytes,
}

impl GridDefinition {
    /// Grid dimensions as (rows, columns).
    pub fn dims(&self) -> (usize, usize) {
        (self.nj as usize, self.ni as usize)
    }

    /// Points scan in the -i direction (east to west).
    pub fn scans_negative_i(&self) -> bool {
        self.scanning_mode & 0x80 != 0
    }

    /// Adjacent points are consecutive along j (column-major storage).
    pub fn j_consecutive(&self) -> bool {
        self.scanning_mode & 0x20 != 0
    }

    /// Convert a stored coordinate to degrees.
    pub fn to_degrees(&self, raw: i32) -> f64 {
        match self.angle_unit {
            Some((basic, subdivisions)) => raw as f64 * basic as f64 / subdivisions as f64,
            None => raw as f64 / 1e6,
        }
    }

    /// Latitude of every row, in storage order.
    pub fn latitudes(&self) -> Vec<f64> {
        let first = self.to_degrees(self.la1);
        let last = self.to_degrees(self.la2);
        linspace(first, last, self.nj as usize)
    }

    /// Longitude of every column, in storage order, normalized to [-180, 180).
    pub fn longitudes(&self) -> Vec<f64> {
        let first = self.to_degrees(self.lo1);
        let mut last = self.to_degrees(self.lo2);

        // Grids crossing the prime meridian store e.g. 350 -> 10.
        if !self.scans_negative_i() && last < first {
            last += 360.0;
        } else if self.scans_negative_i() && last > first {
            last -= 360.0;
        }

        linspace(first, last, self.ni as usize)
            .into_iter()
            .map(normalize_longitude)
            .collect()
    }

    /// Reorder unpacked values into row-major `[row][column]` order.
    pub fn to_row_major(&self, values: Vec<f64>) -> Vec<f64> {
        if !self.j_consecutive() {
            return values;
        }
        let (nj, ni) = self.dims();
        let mut out = vec![f64::NAN; values.len()];
        for i in 0..ni {
            for j in 0..nj {
                if let Some(v) = values.get(i * nj + j) {
                    out[j * ni + i] = *v;
                }
            }
        }
        out
    }
}

impl ProductDefinition {
    /// Forecast offset from the reference time, if the time unit is known.
    pub fn forecast_offset(&self) -> Option<Duration> {
        let t = self.forecast_time as i64;
        let offset = match self.time_unit {
            0 => Duration::minutes(t),
            1 => Duration::hours(t),
            2 => Duration::days(t),
            10 => Duration::hours(3 * t),
            11 => Duration::hours(6 * t),
            12 => Duration::hours(12 * t),
            13 => Duration::seconds(t),
            _ => return None,
        };
        Some(offset)
    }

    /// Valid time of the field: the end of the accumulation interval for
    /// statistically processed products, otherwise reference + offset.
    pub fn valid_time(&self, reference_time: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if let Some(end) = self.interval_end {
            return Some(end);
        }
        self.forecast_offset().map(|offset| reference_time + offset)
    }
}

// ===== Parsing Functions =====

/// Parse Section 0 (Indicator) from start of message
pub fn parse_indicator(data: &[u8]) -> Result<Indicator, Grib2Error> {
    if data.len() < 16 {
        return Err(Grib2Error::InvalidFormat(
            "Not enough data for indicator section".to_string(),
        ));
    }

    if &data[0..4] != crate::GRIB_MAGIC {
        return Err(Grib2Error::InvalidFormat(
            "Invalid GRIB magic bytes".to_string(),
        ));
    }

    // Octets 1-4: "GRIB", 5-6: reserved, 7: discipline, 8: edition,
    // 9-16: total message length (8-byte big-endian)
    let discipline = data[6];
    let edition = data[7];
    let message_length = u64::from_be_bytes([
        data[8], data[9], data[10], data[11], data[12], data[13], data[14], data[15],
    ]);

    Ok(Indicator {
        discipline,
        edition,
        message_length,
    })
}

/// Parse Section 1 (Identification)
pub fn parse_identification(msg: &[u8]) -> Result<Identification, Grib2Error> {
    let section = section_slice(msg, 1)?;
    if section.len() < 21 {
        return Err(Grib2Error::InvalidSection {
            section: 1,
            reason: "Not enough data".to_string(),
        });
    }

    let center = u16::from_be_bytes([section[5], section[6]]);
    let sub_center = u16::from_be_bytes([section[7], section[8]]);
    let significance_of_reference_time = section[11];

    let year = u16::from_be_bytes([section[12], section[13]]);
    let (month, day, hour, minute, second) =
        (section[14], section[15], section[16], section[17], section[18]);

    let reference_time = NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32)
        .and_then(|date| date.and_hms_opt(hour as u32, minute as u32, second as u32))
        .ok_or_else(|| Grib2Error::InvalidSection {
            section: 1,
            reason: format!(
                "Invalid date: {}-{:02}-{:02} {:02}:{:02}:{:02}",
                year, month, day, hour, minute, second
            ),
        })?;

    Ok(Identification {
        center,
        sub_center,
        significance_of_reference_time,
        reference_time: DateTime::<Utc>::from_naive_utc_and_offset(reference_time, Utc),
        production_status: section[19],
        data_type: section[20],
    })
}

/// Parse Section 3 (Grid Definition)
pub fn parse_grid_definition(msg: &[u8]) -> Result<GridDefinition, Grib2Error> {
    let section = section_slice(msg, 3)?;
    if section.len() < 14 {
        return Err(Grib2Error::InvalidSection {
            section: 3,
            reason: "Not enough data".to_string(),
        });
    }

    // Octets 7-10: number of data points, 13-14: grid definition template
    let num_points = u32::from_be_bytes([section[6], section[7], section[8], section[9]]);
    let template = u16::from_be_bytes([section[12], section[13]]);

    if template != 0 {
        return Err(Grib2Error::UnsupportedGrid(template));
    }

    // Template 3.0: Latitude/longitude (equidistant cylindrical)
    let gd = &section[14..];
    if gd.len() < 58 {
        return Err(Grib2Error::InvalidSection {
            section: 3,
            reason: format!("Template 3.0 needs at least 58 bytes, got {}", gd.len()),
        });
    }

    let ni = u32::from_be_bytes([gd[16], gd[17], gd[18], gd[19]]);
    let nj = u32::from_be_bytes([gd[20], gd[21], gd[22], gd[23]]);
    let basic_angle = u32::from_be_bytes([gd[24], gd[25], gd[26], gd[27]]);
    let subdivisions = u32::from_be_bytes([gd[28], gd[29], gd[30], gd[31]]);

    let angle_unit = if basic_angle == 0
        || basic_angle == MISSING_U32
        || subdivisions == 0
        || subdivisions == MISSING_U32
    {
        None
    } else {
        Some((basic_angle, subdivisions))
    };

    let grid = GridDefinition {
        template,
        num_points,
        ni,
        nj,
        la1: decode_grib2_signed(&gd[32..36]),
        lo1: decode_grib2_signed(&gd[36..40]),
        la2: decode_grib2_signed(&gd[41..45]),
        lo2: decode_grib2_signed(&gd[45..49]),
        di: u32::from_be_bytes([gd[49], gd[50], gd[51], gd[52]]),
        dj: u32::from_be_bytes([gd[53], gd[54], gd[55], gd[56]]),
        scanning_mode: gd[57],
        angle_unit,
    };

    if grid.ni == 0 || grid.nj == 0 || grid.ni as u64 * grid.nj as u64 != num_points as u64 {
        return Err(Grib2Error::InvalidSection {
            section: 3,
            reason: format!(
                "{}x{} grid does not match {} data points",
                grid.ni, grid.nj, num_points
            ),
        });
    }

    Ok(grid)
}

/// Parse Section 4 (Product Definition)
pub fn parse_product_definition(msg: &[u8]) -> Result<ProductDefinition, Grib2Error> {
    let section = section_slice(msg, 4)?;
    if section.len() < 34 {
        return Err(Grib2Error::InvalidSection {
            section: 4,
            reason: "Not enough data".to_string(),
        });
    }

    // Octets 8-9: template, 10: category, 11: number, 18: time unit,
    // 19-22: forecast time, 23: first surface type, 24: scale, 25-28: value
    let template = u16::from_be_bytes([section[7], section[8]]);
    let parameter_category = section[9];
    let parameter_number = section[10];
    let time_unit = section[17];
    let forecast_time =
        u32::from_be_bytes([section[18], section[19], section[20], section[21]]);

    let level_type = section[22];
    let scale_factor = decode_grib2_signed8(section[23]);
    let scaled_value = u32::from_be_bytes([section[24], section[25], section[26], section[27]]);
    let level_value = if scaled_value == MISSING_U32 {
        0.0
    } else {
        scaled_value as f64 / 10f64.powi(scale_factor as i32)
    };

    // Templates 4.8 (accumulations) and 4.11 (ensemble accumulations) carry the
    // end of the overall time interval right after the horizontal-level fields.
    let interval_end_offset = match template {
        8 => Some(34),
        11 => Some(37),
        _ => None,
    };
    let interval_end = interval_end_offset.and_then(|o| parse_timestamp(section, o));

    Ok(ProductDefinition {
        template,
        parameter_category,
        parameter_number,
        time_unit,
        forecast_time,
        level_type,
        level_value,
        interval_end,
    })
}

/// Parse Section 5 (Data Representation)
pub fn parse_data_representation(msg: &[u8]) -> Result<DataRepresentation, Grib2Error> {
    let section = section_slice(msg, 5)?;
    if section.len() < 11 {
        return Err(Grib2Error::InvalidSection {
            section: 5,
            reason: "Not enough data".to_string(),
        });
    }

    // Octets 6-9: number of packed values, 10-11: template number
    let num_data_points = u32::from_be_bytes([section[5], section[6], section[7], section[8]]);
    let template = u16::from_be_bytes([section[9], section[10]]);

    if template != 0 {
        return Err(Grib2Error::UnsupportedPacking(template));
    }

    // Template 5.0 (simple packing):
    // 12-15 reference value (IEEE f32), 16-17 E, 18-19 D, 20 bits per value
    if section.len() < 20 {
        return Err(Grib2Error::InvalidSection {
            section: 5,
            reason: "Template 5.0 truncated".to_string(),
        });
    }

    Ok(DataRepresentation {
        num_data_points,
        template,
        reference_value: f32::from_be_bytes([section[11], section[12], section[13], section[14]]),
        binary_scale_factor: decode_grib2_signed16([section[15], section[16]]),
        decimal_scale_factor: decode_grib2_signed16([section[17], section[18]]),
        bits_per_value: section[19],
    })
}

/// Parse Section 6 (Bitmap). Returns `None` when no bitmap applies.
pub fn parse_bitmap(msg: &[u8]) -> Result<Option<Bitmap>, Grib2Error> {
    let section = match section_slice(msg, 6) {
        Ok(section) => section,
        Err(_) => return Ok(None),
    };

    if section.len() < 6 {
        return Err(Grib2Error::InvalidSection {
            section: 6,
            reason: "Not enough data".to_string(),
        });
    }

    match section[5] {
        255 => Ok(None),
        0 => Ok(Some(Bitmap {
            indicator: 0,
            data: Bytes::copy_from_slice(&section[6..]),
        })),
        other => Err(Grib2Error::InvalidSection {
            section: 6,
            reason: format!("Unsupported bitmap indicator {}", other),
        }),
    }
}

/// Parse Section 7 (Data)
pub fn parse_data_section(msg: &[u8]) -> Result<DataSection, Grib2Error> {
    let section = section_slice(msg, 7)?;
    if section.len() < 5 {
        return Err(Grib2Error::InvalidSection {
            section: 7,
            reason: "Not enough data".to_string(),
        });
    }

    Ok(DataSection {
        data: Bytes::copy_from_slice(&section[5..]),
    })
}

// ===== Helper Functions =====

/// Decode a 4-octet GRIB2 signed value (sign bit + magnitude).
///
/// Returns 0 for inputs that are not exactly four bytes long.
pub fn decode_grib2_signed(bytes: &[u8]) -> i32 {
    if bytes.len() != 4 {
        return 0;
    }
    let raw = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let magnitude = (raw & 0x7FFF_FFFF) as i32;
    if raw & 0x8000_0000 != 0 {
        -magnitude
    } else {
        magnitude
    }
}

/// Decode a 2-octet GRIB2 signed value.
pub fn decode_grib2_signed16(bytes: [u8; 2]) -> i16 {
    let raw = u16::from_be_bytes(bytes);
    let magnitude = (raw & 0x7FFF) as i16;
    if raw & 0x8000 != 0 {
        -magnitude
    } else {
        magnitude
    }
}

/// Decode a 1-octet GRIB2 signed value.
pub fn decode_grib2_signed8(byte: u8) -> i8 {
    let magnitude = (byte & 0x7F) as i8;
    if byte & 0x80 != 0 {
        -magnitude
    } else {
        magnitude
    }
}

/// Find a section by number and return its bytes (including its header).
fn section_slice(msg: &[u8], section_num: u8) -> Result<&[u8], Grib2Error> {
    let offset = find_section(msg, section_num)?;
    let length = read_u32(msg, offset) as usize;
    Ok(&msg[offset..offset + length])
}

/// Find a section by number within a message
fn find_section(data: &[u8], section_num: u8) -> Result<usize, Grib2Error> {
    let mut offset = 16; // After Section 0

    loop {
        if offset + 4 <= data.len() && &data[offset..offset + 4] == b"7777" {
            return Err(Grib2Error::InvalidSection {
                section: section_num,
                reason: "Reached end of message without finding section".to_string(),
            });
        }

        if offset + 5 > data.len() {
            return Err(Grib2Error::InvalidSection {
                section: section_num,
                reason: "Section not found".to_string(),
            });
        }

        let section_length = read_u32(data, offset) as usize;
        if section_length < 5 || offset + section_length > data.len() {
            return Err(Grib2Error::InvalidSection {
                section: section_num,
                reason: "Invalid section length".to_string(),
            });
        }

        if data[offset + 4] == section_num {
            return Ok(offset);
        }

        offset += section_length;
    }
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

/// Read a 7-octet timestamp (year:2, month, day, hour, minute, second).
fn parse_timestamp(section: &[u8], offset: usize) -> Option<DateTime<Utc>> {
    let b = section.get(offset..offset + 7)?;
    let year = u16::from_be_bytes([b[0], b[1]]);
    let naive = NaiveDate::from_ymd_opt(year as i32, b[2] as u32, b[3] as u32)?
        .and_hms_opt(b[4] as u32, b[5] as u32, b[6] as u32)?;
    Some(DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc))
}

fn linspace(first: f64, last: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![first],
        _ => {
            let step = (last - first) / (n - 1) as f64;
            (0..n).map(|k| first + step * k as f64).collect()
        }
    }
}

fn normalize_longitude(lon: f64) -> f64 {
    let wrapped = (lon + 180.0).rem_euclid(360.0) - 180.0;
    // Keep 180 itself instead of flipping it to -180.
    if wrapped == -180.0 && lon > 0.0 {
        180.0
    } else {
        wrapped
    }
}
