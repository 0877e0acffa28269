//! GRIB2 test data generator.
//!
//! Creates minimal synthetic GRIB2 messages (template 3.0 grid, template
//! 4.0/4.8 product, template 5.0 simple packing) with real values so the
//! decoder can be exercised end to end.

/// Build a minimal GRIB2 message with the specified parameters.
#[derive(Debug, Clone)]
pub struct Grib2Builder {
    discipline: u8,
    center: u16,
    year: u16,
    month: u8,
    day: u8,
    hour: u8,
    // Grid definition
    ni: u32,
    nj: u32,
    la1: i32, // first lat (microdegrees)
    lo1: i32, // first lon (microdegrees)
    la2: i32,
    lo2: i32,
    di: u32,
    dj: u32,
    scanning_mode: u8,
    // Product definition
    param_category: u8,
    param_number: u8,
    level_type: u8,
    level_value: u32,
    time_unit: u8,
    forecast_time: u32,
    accumulation_hours: Option<u32>,
    // Data
    decimal_scale: i16,
    data_values: Vec<f64>,
}

impl Grib2Builder {
    /// 3x3 grid over the Netherlands (53N..51N, 4E..6E, 1 degree),
    /// 2 m temperature of 288.15 K.
    pub fn new_harmonie() -> Self {
        let ni = 3;
        let nj = 3;
        Self {
            discipline: 0, // Meteorological
            center: 99,    // De Bilt
            year: 2024,
            month: 5,
            day: 1,
            hour: 0,
            ni,
            nj,
            la1: 53_000_000,
            lo1: 4_000_000,
            la2: 51_000_000,
            lo2: 6_000_000,
            di: 1_000_000,
            dj: 1_000_000,
            scanning_mode: 0b0000_0000, // +i, -j, i consecutive
            param_category: 0,
            param_number: 0, // TMP
            level_type: 103, // m above ground
            level_value: 2,
            time_unit: 1, // hours
            forecast_time: 0,
            accumulation_hours: None,
            decimal_scale: 0,
            data_values: vec![288.15; (ni * nj) as usize],
        }
    }

    pub fn with_reference_time(mut self, year: u16, month: u8, day: u8, hour: u8) -> Self {
        self.year = year;
        self.month = month;
        self.day = day;
        self.hour = hour;
        self
    }

    /// Regular grid from corner coordinates in degrees.
    pub fn with_grid(mut self, ni: u32, nj: u32, first: (f64, f64), last: (f64, f64)) -> Self {
        self.ni = ni;
        self.nj = nj;
        self.la1 = micro(first.0);
        self.lo1 = micro(first.1);
        self.la2 = micro(last.0);
        self.lo2 = micro(last.1);
        self.di = step(self.lo1, self.lo2, ni);
        self.dj = step(self.la1, self.la2, nj);
        self.data_values = vec![0.0; (ni * nj) as usize];
        self
    }

    pub fn with_scanning_mode(mut self, mode: u8) -> Self {
        self.scanning_mode = mode;
        self
    }

    pub fn with_discipline(mut self, discipline: u8) -> Self {
        self.discipline = discipline;
        self
    }

    pub fn with_parameter(mut self, category: u8, number: u8) -> Self {
        self.param_category = category;
        self.param_number = number;
        self
    }

    pub fn with_level(mut self, level_type: u8, level_value: u32) -> Self {
        self.level_type = level_type;
        self.level_value = level_value;
        self
    }

    pub fn with_forecast_hour(mut self, hour: u32) -> Self {
        self.time_unit = 1;
        self.forecast_time = hour;
        self
    }

    /// Raw time range unit (code table 4.4) and forecast time.
    pub fn with_forecast_time(mut self, time_unit: u8, value: u32) -> Self {
        self.time_unit = time_unit;
        self.forecast_time = value;
        self
    }

    /// Emit template 4.8: accumulation over `hours` starting at the forecast time.
    pub fn with_accumulation(mut self, hours: u32) -> Self {
        self.accumulation_hours = Some(hours);
        self
    }

    pub fn with_decimal_scale(mut self, d: i16) -> Self {
        self.decimal_scale = d;
        self
    }

    pub fn with_constant_value(mut self, value: f64) -> Self {
        self.data_values = vec![value; (self.ni * self.nj) as usize];
        self
    }

    pub fn with_gradient(mut self, min_val: f64, max_val: f64) -> Self {
        let n = (self.ni * self.nj) as usize;
        self.data_values = (0..n)
            .map(|i| min_val + (max_val - min_val) * (i as f64 / n as f64))
            .collect();
        self
    }

    /// Values in scan order; `NaN` marks missing points (emits a bitmap).
    pub fn with_data(mut self, data: Vec<f64>) -> Self {
        self.data_values = data;
        self
    }

    /// Build the complete GRIB2 message bytes
    pub fn build(&self) -> Vec<u8> {
        let sections = [
            self.build_section1(),
            self.build_section3(),
            self.build_section4(),
            self.build_section5(),
            self.build_section6(),
            self.build_section7(),
        ];

        let message_length = 16 + sections.iter().map(Vec::len).sum::<usize>() + 4;

        let mut message = Vec::with_capacity(message_length);
        // Section 0: Indicator
        message.extend_from_slice(b"GRIB");
        message.extend_from_slice(&[0, 0]); // Reserved
        message.push(self.discipline);
        message.push(2); // Edition 2
        message.extend_from_slice(&(message_length as u64).to_be_bytes());

        for section in &sections {
            message.extend_from_slice(section);
        }

        // Section 8: End
        message.extend_from_slice(b"7777");
        message
    }

    fn build_section1(&self) -> Vec<u8> {
        let mut section = Vec::new();
        section.extend_from_slice(&21u32.to_be_bytes());
        section.push(1); // Section number

        section.extend_from_slice(&self.center.to_be_bytes());
        section.extend_from_slice(&0u16.to_be_bytes()); // Sub-center
        section.push(2); // Master table version
        section.push(0); // Local table version
        section.push(1); // Significance of reference time (start of forecast)

        section.extend_from_slice(&self.year.to_be_bytes());
        section.push(self.month);
        section.push(self.day);
        section.push(self.hour);
        section.push(0); // Minute
        section.push(0); // Second

        section.push(0); // Production status (operational)
        section.push(1); // Type of data (forecast)
        section
    }

    fn build_section3(&self) -> Vec<u8> {
        let mut section = Vec::new();
        section.extend_from_slice(&72u32.to_be_bytes());
        section.push(3); // Section number

        section.push(0); // Source of grid definition
        section.extend_from_slice(&(self.ni * self.nj).to_be_bytes());
        section.push(0); // Number of octets for optional list
        section.push(0); // Interpretation of optional list
        section.extend_from_slice(&0u16.to_be_bytes()); // Template 3.0

        section.push(6); // Shape of Earth (spherical, 6371229 m)
        section.push(0);
        section.extend_from_slice(&0u32.to_be_bytes());
        section.push(0);
        section.extend_from_slice(&0u32.to_be_bytes());
        section.push(0);
        section.extend_from_slice(&0u32.to_be_bytes());

        section.extend_from_slice(&self.ni.to_be_bytes());
        section.extend_from_slice(&self.nj.to_be_bytes());
        section.extend_from_slice(&0u32.to_be_bytes()); // Basic angle
        section.extend_from_slice(&0xFFFF_FFFFu32.to_be_bytes()); // Subdivisions

        section.extend_from_slice(&signed32(self.la1));
        section.extend_from_slice(&signed32(self.lo1));
        section.push(48); // Resolution and component flags
        section.extend_from_slice(&signed32(self.la2));
        section.extend_from_slice(&signed32(self.lo2));
        section.extend_from_slice(&self.di.to_be_bytes());
        section.extend_from_slice(&self.dj.to_be_bytes());
        section.push(self.scanning_mode);
        section
    }

    fn build_section4(&self) -> Vec<u8> {
        let template: u16 = if self.accumulation_hours.is_some() { 8 } else { 0 };
        let length: u32 = if template == 8 { 58 } else { 34 };

        let mut section = Vec::new();
        section.extend_from_slice(&length.to_be_bytes());
        section.push(4); // Section number

        section.extend_from_slice(&0u16.to_be_bytes()); // Number of coordinate values
        section.extend_from_slice(&template.to_be_bytes());

        section.push(self.param_category);
        section.push(self.param_number);
        section.push(2); // Type of generating process (forecast)
        section.push(0); // Background generating process
        section.push(0); // Analysis or forecast process
        section.extend_from_slice(&0u16.to_be_bytes()); // Hours of cutoff
        section.push(0); // Minutes of cutoff
        section.push(self.time_unit);
        section.extend_from_slice(&self.forecast_time.to_be_bytes());

        section.push(self.level_type);
        section.push(0); // Scale factor
        section.extend_from_slice(&self.level_value.to_be_bytes());

        section.push(255); // Type of second fixed surface (none)
        section.push(0);
        section.extend_from_slice(&0u32.to_be_bytes());

        if let Some(hours) = self.accumulation_hours {
            let start_hours = match self.time_unit {
                0 => self.forecast_time as i64 / 60,
                _ => self.forecast_time as i64,
            };
            let (y, mo, d, h) = add_hours(
                (self.year, self.month, self.day, self.hour),
                start_hours + hours as i64,
            );
            section.extend_from_slice(&y.to_be_bytes());
            section.extend_from_slice(&[mo, d, h, 0, 0]);
            section.push(1); // Number of time ranges
            section.extend_from_slice(&0u32.to_be_bytes()); // Missing values in statistics
            section.push(1); // Accumulation
            section.push(2); // Successive times, same reference time
            section.push(1); // Hours
            section.extend_from_slice(&hours.to_be_bytes());
            section.push(255); // Increment unit
            section.extend_from_slice(&0u32.to_be_bytes());
        }

        section
    }

    fn present_values(&self) -> Vec<f64> {
        let factor = 10f64.powi(self.decimal_scale as i32);
        self.data_values
            .iter()
            .filter(|v| !v.is_nan())
            .map(|v| v * factor)
            .collect()
    }

    /// (reference value, binary scale factor, bits per value)
    fn packing_parameters(&self) -> (f32, i16, u8) {
        let values = self.present_values();
        let (min_val, max_val) = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), &v| {
                (min.min(v), max.max(v))
            });
        if values.is_empty() {
            return (0.0, 0, 0);
        }

        let range = max_val - min_val;
        if range == 0.0 {
            return (min_val as f32, 0, 0);
        }

        // 16-bit packing: range = 65535 * 2^E
        let binary_scale_factor = (range / 65535.0).log2().ceil() as i16;
        (min_val as f32, binary_scale_factor, 16)
    }

    fn build_section5(&self) -> Vec<u8> {
        let (reference_value, binary_scale_factor, bits_per_value) = self.packing_parameters();

        let mut section = Vec::new();
        section.extend_from_slice(&21u32.to_be_bytes());
        section.push(5); // Section number

        section.extend_from_slice(&(self.present_values().len() as u32).to_be_bytes());
        section.extend_from_slice(&0u16.to_be_bytes()); // Template 5.0

        section.extend_from_slice(&reference_value.to_be_bytes());
        section.extend_from_slice(&signed16(binary_scale_factor));
        section.extend_from_slice(&signed16(self.decimal_scale));
        section.push(bits_per_value);
        section.push(0); // Original field type (floating point)
        section
    }

    fn build_section6(&self) -> Vec<u8> {
        let mut section = Vec::new();

        if !self.data_values.iter().any(|v| v.is_nan()) {
            section.extend_from_slice(&6u32.to_be_bytes());
            section.push(6);
            section.push(255); // No bitmap
            return section;
        }

        let mut bitmap = vec![0u8; self.data_values.len().div_ceil(8)];
        for (i, v) in self.data_values.iter().enumerate() {
            if !v.is_nan() {
                bitmap[i / 8] |= 0x80 >> (i % 8);
            }
        }
        section.extend_from_slice(&(6 + bitmap.len() as u32).to_be_bytes());
        section.push(6);
        section.push(0); // Bitmap follows
        section.extend_from_slice(&bitmap);
        section
    }

    fn build_section7(&self) -> Vec<u8> {
        let packed_data = self.pack_simple();

        let mut section = Vec::new();
        section.extend_from_slice(&(5 + packed_data.len() as u32).to_be_bytes());
        section.push(7); // Section number
        section.extend_from_slice(&packed_data);
        section
    }

    fn pack_simple(&self) -> Vec<u8> {
        let (reference_value, binary_scale_factor, bits_per_value) = self.packing_parameters();
        if bits_per_value == 0 {
            return Vec::new();
        }

        let reference = reference_value as f64;
        let binary_scale = 2.0_f64.powi(binary_scale_factor as i32);

        let mut packed = Vec::new();
        for v in self.present_values() {
            let x = ((v - reference) / binary_scale).round().clamp(0.0, 65535.0) as u16;
            packed.extend_from_slice(&x.to_be_bytes());
        }
        packed
    }
}

/// GRIB2 sign-magnitude encoding of a 4-octet integer.
pub fn signed32(v: i32) -> [u8; 4] {
    let magnitude = v.unsigned_abs() & 0x7FFF_FFFF;
    let raw = if v < 0 { magnitude | 0x8000_0000 } else { magnitude };
    raw.to_be_bytes()
}

/// GRIB2 sign-magnitude encoding of a 2-octet integer.
pub fn signed16(v: i16) -> [u8; 2] {
    let magnitude = v.unsigned_abs() & 0x7FFF;
    let raw = if v < 0 { magnitude | 0x8000 } else { magnitude };
    raw.to_be_bytes()
}

fn micro(deg: f64) -> i32 {
    (deg * 1e6).round() as i32
}

fn step(first: i32, last: i32, n: u32) -> u32 {
    if n < 2 {
        0
    } else {
        (last - first).unsigned_abs() / (n - 1)
    }
}

/// Add whole hours to a (year, month, day, hour) timestamp.
fn add_hours((year, month, day, hour): (u16, u8, u8, u8), hours: i64) -> (u16, u8, u8, u8) {
    let mut total = hour as i64 + hours;
    let (mut y, mut m, mut d) = (year as i64, month as i64, day as i64);
    while total >= 24 {
        total -= 24;
        d += 1;
        if d > days_in_month(y, m) {
            d = 1;
            m += 1;
            if m > 12 {
                m = 1;
                y += 1;
            }
        }
    }
    (y as u16, m as u8, d as u8, total as u8)
}

fn days_in_month(year: i64, month: i64) -> i64 {
    match month {
        4 | 6 | 9 | 11 => 30,
        2 if (year % 4 == 0 && year % 100 != 0) || year % 400 == 0 => 29,
        2 => 28,
        _ => 31,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_harmonie_message() {
        let data = Grib2Builder::new_harmonie().build();

        assert_eq!(&data[0..4], b"GRIB");
        assert_eq!(data[7], 2, "Should be GRIB2");
        assert_eq!(&data[data.len() - 4..], b"7777");

        let declared = u64::from_be_bytes(data[8..16].try_into().unwrap());
        assert_eq!(declared as usize, data.len());
    }

    #[test]
    fn test_sign_magnitude() {
        assert_eq!(signed32(-1), [0x80, 0, 0, 1]);
        assert_eq!(signed32(5), [0, 0, 0, 5]);
        assert_eq!(signed16(-3), [0x80, 3]);
    }

    #[test]
    fn test_bitmap_emitted_for_missing_values() {
        let with_gap = Grib2Builder::new_harmonie()
            .with_data(vec![1.0, f64::NAN, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0])
            .build();
        let without = Grib2Builder::new_harmonie()
            .with_data((0..9).map(|v| v as f64).collect())
            .build();
        // Two bitmap bytes added, one packed value (2 bytes) dropped.
        assert_eq!(with_gap.len(), without.len());
    }

    #[test]
    fn test_add_hours_rolls_over_month() {
        assert_eq!(add_hours((2024, 1, 31, 18), 12), (2024, 2, 1, 6));
        assert_eq!(add_hours((2024, 2, 28, 23), 1), (2024, 2, 29, 0));
        assert_eq!(add_hours((2024, 12, 31, 0), 24), (2025, 1, 1, 0));
    }
}
