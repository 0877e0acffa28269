//! GRIB2 data unpacking.
//!
//! Only simple packing (template 5.0) is implemented; it covers the
//! deterministic surface fields published by the open-data platform.

use crate::Grib2Error;

/// Largest field accepted (2^27 points, 1 GiB of decoded values).
pub const MAX_POINTS: usize = 1 << 27;

/// Unpack simple packed GRIB2 data.
///
/// Simple packing formula: value = (reference_value + packed_value * 2^E) * 10^(-D)
///
/// Points masked out by the bitmap come back as `NaN`. They occupy no bits
/// in the packed stream.
pub fn unpack_simple(
    packed_data: &[u8],
    num_points: usize,
    bits_per_value: u8,
    reference_value: f32,
    binary_scale_factor: i16,
    decimal_scale_factor: i16,
    bitmap: Option<&[u8]>,
) -> Result<Vec<f64>, Grib2Error> {
    check_extent(packed_data, num_points, bits_per_value, bitmap)?;

    let reference = reference_value as f64;
    let binary_scale = 2.0_f64.powi(binary_scale_factor as i32);
    let decimal_scale = 10.0_f64.powi(-(decimal_scale_factor as i32));

    let mut values = Vec::with_capacity(num_points);
    let mut bit_position = 0;
    let bits_per_value = bits_per_value as usize;

    for i in 0..num_points {
        if let Some(bm) = bitmap {
            if !bitmap_bit(bm, i) {
                values.push(f64::NAN);
                continue;
            }
        }

        if bits_per_value == 0 {
            // Constant field
            values.push(reference * decimal_scale);
            continue;
        }

        let packed_value = extract_bits(packed_data, bit_position, bits_per_value)
            .map_err(|e| Grib2Error::UnpackingError(format!("point {}: {}", i, e)))?;
        bit_position += bits_per_value;

        values.push((reference + packed_value as f64 * binary_scale) * decimal_scale);
    }

    Ok(values)
}

/// Reject point counts the packed stream or bitmap cannot back.
fn check_extent(
    packed_data: &[u8],
    num_points: usize,
    bits_per_value: u8,
    bitmap: Option<&[u8]>,
) -> Result<(), Grib2Error> {
    if num_points > MAX_POINTS {
        return Err(Grib2Error::UnpackingError(format!(
            "{} points exceeds the limit of {}",
            num_points, MAX_POINTS
        )));
    }
    let available_bits = packed_data.len().saturating_mul(8);
    match bitmap {
        Some(bm) if bm.len().saturating_mul(8) < num_points => {
            Err(Grib2Error::UnpackingError(format!(
                "bitmap covers {} of {} points",
                bm.len() * 8,
                num_points
            )))
        }
        Some(_) => Ok(()),
        None if num_points * bits_per_value as usize > available_bits => {
            Err(Grib2Error::UnpackingError(format!(
                "{} points at {} bits need more than {} bytes",
                num_points,
                bits_per_value,
                packed_data.len()
            )))
        }
        None => Ok(()),
    }
}

/// Bitmap: 1 bit per grid point, MSB first, 1 = value present.
fn bitmap_bit(bitmap: &[u8], index: usize) -> bool {
    match bitmap.get(index / 8) {
        Some(byte) => (byte >> (7 - (index % 8))) & 1 == 1,
        None => false,
    }
}

/// Extract bits from a byte array
/// Returns the bits as a 32-bit unsigned integer
fn extract_bits(data: &[u8], start_bit: usize, num_bits: usize) -> Result<u32, String> {
    if num_bits > 32 || num_bits == 0 {
        return Err(format!("Invalid number of bits: {}", num_bits));
    }

    let mut result = 0u32;

    for i in 0..num_bits {
        let absolute_bit = start_bit + i;
        let byte_idx = absolute_bit / 8;
        let bit_idx = 7 - (absolute_bit % 8); // MSB first

        if byte_idx >= data.len() {
            return Err("Not enough data to extract bits".to_string());
        }

        let bit = (data[byte_idx] >> bit_idx) & 1;
        result = (result << 1) | (bit as u32);
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_bits() {
        let data = vec![0b10110101];

        assert_eq!(extract_bits(&data, 0, 2).unwrap(), 0b10);
        assert_eq!(extract_bits(&data, 2, 2).unwrap(), 0b11);
        assert_eq!(extract_bits(&data, 0, 8).unwrap(), 0b10110101);
        assert!(extract_bits(&data, 4, 8).is_err());
    }

    #[test]
    fn test_simple_unpacking_with_scales() {
        // reference 250, E = 0, D = 1: (250 + x) / 10
        let packed = vec![100, 200];
        let values = unpack_simple(&packed, 2, 8, 250.0, 0, 1, None).unwrap();
        assert_eq!(values.len(), 2);
        assert!((values[0] - 35.0).abs() < 1e-9);
        assert!((values[1] - 45.0).abs() < 1e-9);
    }

    #[test]
    fn test_negative_binary_scale() {
        // E = -1 halves each packed step
        let values = unpack_simple(&[3], 1, 8, 0.0, -1, 0, None).unwrap();
        assert!((values[0] - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_bitmap_marks_missing_points() {
        // Points 0 and 2 present, point 1 masked; only two packed values.
        let bitmap = vec![0b1010_0000];
        let values = unpack_simple(&[7, 9], 3, 8, 0.0, 0, 0, Some(&bitmap)).unwrap();
        assert_eq!(values[0], 7.0);
        assert!(values[1].is_nan());
        assert_eq!(values[2], 9.0);
    }

    #[test]
    fn test_constant_field() {
        let values = unpack_simple(&[], 4, 0, 12.5, 0, 0, None).unwrap();
        assert_eq!(values, vec![12.5; 4]);
    }

    #[test]
    fn test_truncated_data_is_an_error() {
        assert!(unpack_simple(&[1], 2, 8, 0.0, 0, 0, None).is_err());
    }

    #[test]
    fn test_oversized_point_count_is_rejected_before_allocating() {
        // Section 3 claiming ~4e9 points for a constant field
        let result = unpack_simple(&[], 4_000_000_000, 0, 1.0, 0, 0, None);
        assert!(matches!(result, Err(Grib2Error::UnpackingError(_))));

        let result = unpack_simple(&[0; 4], 1_000_000, 8, 0.0, 0, 0, None);
        assert!(matches!(result, Err(Grib2Error::UnpackingError(_))));
    }

    #[test]
    fn test_short_bitmap_is_rejected() {
        let result = unpack_simple(&[7; 16], 16, 8, 0.0, 0, 0, Some(&[0xFF]));
        assert!(matches!(result, Err(Grib2Error::UnpackingError(_))));
    }
}
