//! Synthetic GRIB2 message builder.
//!
//! Creates small, structurally valid GRIB2 messages for testing. A message
//! carries one lat/lon grid (template 3.0) and one or more products; every
//! product after the first is emitted as a repetition of sections 4 to 7.

use crate::encoding::{create_png_samples, pack_bits};

/// Encode a sign-magnitude integer of `bytes` bytes.
pub fn sign_magnitude(value: i64, bytes: usize) -> Vec<u8> {
    let bits = bytes * 8;
    let mut raw = value.unsigned_abs();
    if value < 0 {
        raw |= 1 << (bits - 1);
    }
    raw.to_be_bytes()[8 - bytes..].to_vec()
}

/// Wrap a section body with its length and section number.
pub fn section(number: u8, body: &[u8]) -> Vec<u8> {
    let mut out = ((body.len() + 5) as u32).to_be_bytes().to_vec();
    out.push(number);
    out.extend_from_slice(body);
    out
}

/// One statistical-processing time range of an interval product.
#[derive(Debug, Clone)]
pub struct TimeRangeSpec {
    pub statistical_process: u8,
    pub increment_type: u8,
    pub range_unit: u8,
    pub range_length: u32,
    pub increment_unit: u8,
    pub increment: u32,
}

/// Interval block of templates 4.8 and 4.11.
#[derive(Debug, Clone)]
pub struct IntervalSpec {
    /// (year, month, day, hour, minute, second)
    pub end: (u16, u8, u8, u8, u8, u8),
    pub ranges: Vec<TimeRangeSpec>,
}

/// How the data of a product is packed.
#[derive(Debug, Clone)]
pub enum Packing {
    /// Template 5.0 with explicit packed integers.
    Simple {
        reference: f32,
        binary_scale: i16,
        decimal_scale: i16,
        bits: u8,
        values: Vec<u32>,
    },
    /// Template 5.0 computed from floating point values (16 bits).
    FromValues(Vec<f32>),
    /// Template 5.4, 32-bit.
    Ieee(Vec<f32>),
    /// Template 5.41 with a grayscale image of `bits` depth.
    Png {
        reference: f32,
        binary_scale: i16,
        decimal_scale: i16,
        bits: u8,
        values: Vec<u32>,
    },
    /// Any template: body after the DRS header, and the data section body.
    Raw {
        template: u16,
        data_point_count: u32,
        template_body: Vec<u8>,
        data: Vec<u8>,
    },
}

/// Bitmap section of a product.
#[derive(Debug, Clone, Default)]
pub enum BitmapSpec {
    #[default]
    Absent,
    Bits(Vec<bool>),
    /// Indicator 254: reuse the previous bitmap of the message.
    Previous,
}

#[derive(Debug, Clone)]
pub struct ProductSpec {
    pub category: u8,
    pub number: u8,
    pub generating_process_type: u8,
    pub generating_process_id: u8,
    pub time_unit: u8,
    pub forecast_time: i32,
    pub level_type: u8,
    pub level_scale: u8,
    pub level_value: u32,
    pub level2_type: u8,
    pub level2_scale: u8,
    pub level2_value: u32,
    /// (ensemble type, perturbation number, ensemble size) for 4.1/4.11.
    pub ensemble: Option<(u8, u8, u8)>,
    pub interval: Option<IntervalSpec>,
    pub coordinates: Vec<f32>,
    pub packing: Packing,
    pub bitmap: BitmapSpec,
}

impl ProductSpec {
    /// 2 m temperature forecast in hours, simple packing of `values`.
    pub fn temperature(values: Vec<f32>) -> Self {
        Self {
            category: 0,
            number: 0,
            generating_process_type: 2,
            generating_process_id: 96,
            time_unit: 1,
            forecast_time: 0,
            level_type: 103,
            level_scale: 0,
            level_value: 2,
            level2_type: 255,
            level2_scale: 0,
            level2_value: 0,
            ensemble: None,
            interval: None,
            coordinates: Vec::new(),
            packing: Packing::FromValues(values),
            bitmap: BitmapSpec::Absent,
        }
    }

    pub fn template(&self) -> u16 {
        match (&self.ensemble, &self.interval) {
            (None, None) => 0,
            (Some(_), None) => 1,
            (None, Some(_)) => 8,
            (Some(_), Some(_)) => 11,
        }
    }

    fn section4(&self) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&(self.coordinates.len() as u16).to_be_bytes());
        body.extend_from_slice(&self.template().to_be_bytes());

        body.push(self.category);
        body.push(self.number);
        body.push(self.generating_process_type);
        body.push(0); // Background generating process
        body.push(self.generating_process_id);
        body.extend_from_slice(&0u16.to_be_bytes()); // Hours of cutoff
        body.push(0); // Minutes of cutoff
        body.push(self.time_unit);
        body.extend_from_slice(&sign_magnitude(self.forecast_time as i64, 4));
        body.push(self.level_type);
        body.push(self.level_scale);
        body.extend_from_slice(&self.level_value.to_be_bytes());
        body.push(self.level2_type);
        body.push(self.level2_scale);
        body.extend_from_slice(&self.level2_value.to_be_bytes());

        if let Some((kind, member, size)) = self.ensemble {
            body.extend_from_slice(&[kind, member, size]);
        }

        if let Some(interval) = &self.interval {
            let (year, month, day, hour, minute, second) = interval.end;
            body.extend_from_slice(&year.to_be_bytes());
            body.extend_from_slice(&[month, day, hour, minute, second]);
            body.push(interval.ranges.len() as u8);
            body.extend_from_slice(&0u32.to_be_bytes()); // Missing values in statistics
            for range in &interval.ranges {
                body.push(range.statistical_process);
                body.push(range.increment_type);
                body.push(range.range_unit);
                body.extend_from_slice(&range.range_length.to_be_bytes());
                body.push(range.increment_unit);
                body.extend_from_slice(&range.increment.to_be_bytes());
            }
        }

        for c in &self.coordinates {
            body.extend_from_slice(&c.to_be_bytes());
        }
        section(4, &body)
    }

    /// Sections 5 and 7.
    fn data_sections(&self) -> (Vec<u8>, Vec<u8>) {
        let (template, count, template_body, data) = match &self.packing {
            Packing::Simple {
                reference,
                binary_scale,
                decimal_scale,
                bits,
                values,
            } => (
                0u16,
                values.len() as u32,
                simple_params(*reference, *binary_scale, *decimal_scale, *bits),
                pack_bits(values, *bits as usize),
            ),
            Packing::FromValues(values) => {
                let (reference, binary_scale, bits, packed) = pack_simple(values);
                (
                    0,
                    values.len() as u32,
                    simple_params(reference, binary_scale, 0, bits),
                    packed,
                )
            }
            Packing::Ieee(values) => (
                4,
                values.len() as u32,
                vec![1],
                values.iter().flat_map(|v| v.to_be_bytes()).collect(),
            ),
            Packing::Png {
                reference,
                binary_scale,
                decimal_scale,
                bits,
                values,
            } => (
                41,
                values.len() as u32,
                simple_params(*reference, *binary_scale, *decimal_scale, *bits),
                create_png_samples(values, values.len(), 1, *bits, 0, 1),
            ),
            Packing::Raw {
                template,
                data_point_count,
                template_body,
                data,
            } => (*template, *data_point_count, template_body.clone(), data.clone()),
        };

        let mut body = Vec::new();
        body.extend_from_slice(&count.to_be_bytes());
        body.extend_from_slice(&template.to_be_bytes());
        body.extend_from_slice(&template_body);
        (section(5, &body), section(7, &data))
    }

    fn section6(&self) -> Vec<u8> {
        match &self.bitmap {
            BitmapSpec::Absent => section(6, &[255]),
            BitmapSpec::Previous => section(6, &[254]),
            BitmapSpec::Bits(bits) => {
                let flags: Vec<u32> = bits.iter().map(|b| *b as u32).collect();
                let mut body = vec![0];
                body.extend_from_slice(&pack_bits(&flags, 1));
                section(6, &body)
            }
        }
    }
}

/// Reference value, E, D, bits and original type (10 bytes).
pub fn simple_params(reference: f32, binary_scale: i16, decimal_scale: i16, bits: u8) -> Vec<u8> {
    let mut out = reference.to_be_bytes().to_vec();
    out.extend_from_slice(&sign_magnitude(binary_scale as i64, 2));
    out.extend_from_slice(&sign_magnitude(decimal_scale as i64, 2));
    out.push(bits);
    out.push(0); // Original field type (floating point)
    out
}

/// 16-bit simple packing of `values`: (reference, E, bits, packed bytes).
fn pack_simple(values: &[f32]) -> (f32, i16, u8, Vec<u8>) {
    let (min_val, max_val) = values.iter().fold(
        (f32::INFINITY, f32::NEG_INFINITY),
        |(min, max), &v| (min.min(v), max.max(v)),
    );
    let range = max_val - min_val;
    if values.is_empty() || range == 0.0 {
        let reference = if values.is_empty() { 0.0 } else { min_val };
        return (reference, 0, 0, Vec::new());
    }

    // value = reference + packed * 2^E with packed <= 65535
    let binary_scale_factor = (range / 65535.0).log2().ceil() as i16;
    let binary_scale = 2.0_f32.powi(binary_scale_factor as i32);
    let packed: Vec<u32> = values
        .iter()
        .map(|&v| ((v - min_val) / binary_scale).round() as u32)
        .collect();
    (min_val, binary_scale_factor, 16, pack_bits(&packed, 16))
}

/// Build a minimal GRIB2 message with the specified parameters
#[derive(Debug, Clone)]
pub struct Grib2Builder {
    discipline: u8,
    center: u16,
    year: u16,
    month: u8,
    day: u8,
    hour: u8,
    local_use: Option<Vec<u8>>,
    // Grid definition
    ni: u32,       // columns
    nj: u32,       // rows
    la1: i32,      // first lat (microdegrees)
    lo1: i32,      // first lon (microdegrees)
    la2: i32,      // last lat (microdegrees)
    lo2: i32,      // last lon (microdegrees)
    di: u32,       // lon increment (microdegrees)
    dj: u32,       // lat increment (microdegrees)
    scanning_mode: u8,
    products: Vec<ProductSpec>,
}

impl Grib2Builder {
    /// Create a new builder with defaults for GFS-like data
    pub fn new_gfs() -> Self {
        // Small 10x10 grid centered on CONUS
        let ni = 10;
        let nj = 10;
        Self {
            discipline: 0, // Meteorological
            center: 7,     // NCEP
            year: 2025,
            month: 12,
            day: 10,
            hour: 12,
            local_use: None,
            ni,
            nj,
            la1: 45_000_000,  // 45.0N
            lo1: 230_000_000, // 230.0E
            la2: 35_000_000,  // 35.0N
            lo2: 239_000_000, // 239.0E
            di: 1_000_000,    // 1.0 degree
            dj: 1_000_000,
            scanning_mode: 0b0000_0000, // +i, -j, i consecutive
            products: vec![ProductSpec::temperature(vec![288.15; (ni * nj) as usize])],
        }
    }

    /// A 1 x `n` grid, convenient for exact value checks.
    pub fn new_row(n: u32) -> Self {
        Self::new_gfs().with_grid(n, 1)
    }

    pub fn with_discipline(mut self, discipline: u8) -> Self {
        self.discipline = discipline;
        self
    }

    pub fn with_center(mut self, center: u16) -> Self {
        self.center = center;
        self
    }

    pub fn with_reference_time(mut self, year: u16, month: u8, day: u8, hour: u8) -> Self {
        self.year = year;
        self.month = month;
        self.day = day;
        self.hour = hour;
        self
    }

    pub fn with_local_use(mut self, bytes: Vec<u8>) -> Self {
        self.local_use = Some(bytes);
        self
    }

    /// Resize the grid; the current product gets zero-valued data and the
    /// last point moves to keep the increments.
    pub fn with_grid(mut self, ni: u32, nj: u32) -> Self {
        self.ni = ni;
        self.nj = nj;
        self.lo2 = self.lo1 + (ni.saturating_sub(1) * self.di) as i32;
        self.la2 = self.la1 - (nj.saturating_sub(1) * self.dj) as i32;
        self.current().packing = Packing::FromValues(vec![0.0; (ni * nj) as usize]);
        self
    }

    pub fn with_scanning_mode(mut self, mode: u8) -> Self {
        self.scanning_mode = mode;
        self
    }

    fn current(&mut self) -> &mut ProductSpec {
        let last = self.products.len() - 1;
        &mut self.products[last]
    }

    pub fn with_parameter(mut self, category: u8, number: u8) -> Self {
        let p = self.current();
        p.category = category;
        p.number = number;
        self
    }

    pub fn with_level(mut self, level_type: u8, scale: u8, value: u32) -> Self {
        let p = self.current();
        p.level_type = level_type;
        p.level_scale = scale;
        p.level_value = value;
        self
    }

    pub fn with_second_level(mut self, level_type: u8, scale: u8, value: u32) -> Self {
        let p = self.current();
        p.level2_type = level_type;
        p.level2_scale = scale;
        p.level2_value = value;
        self
    }

    pub fn with_forecast(mut self, time_unit: u8, forecast_time: i32) -> Self {
        let p = self.current();
        p.time_unit = time_unit;
        p.forecast_time = forecast_time;
        self
    }

    pub fn with_generating_process(mut self, process_type: u8, process_id: u8) -> Self {
        let p = self.current();
        p.generating_process_type = process_type;
        p.generating_process_id = process_id;
        self
    }

    pub fn with_ensemble(mut self, kind: u8, member: u8, size: u8) -> Self {
        self.current().ensemble = Some((kind, member, size));
        self
    }

    pub fn with_interval(mut self, interval: IntervalSpec) -> Self {
        self.current().interval = Some(interval);
        self
    }

    pub fn with_coordinates(mut self, coordinates: Vec<f32>) -> Self {
        self.current().coordinates = coordinates;
        self
    }

    pub fn with_data(mut self, data: Vec<f32>) -> Self {
        self.current().packing = Packing::FromValues(data);
        self
    }

    pub fn with_gradient(mut self, min_val: f32, max_val: f32) -> Self {
        let n = (self.ni * self.nj) as usize;
        let data = (0..n)
            .map(|i| min_val + (max_val - min_val) * (i as f32 / n as f32))
            .collect();
        self.current().packing = Packing::FromValues(data);
        self
    }

    pub fn with_packing(mut self, packing: Packing) -> Self {
        self.current().packing = packing;
        self
    }

    pub fn with_bitmap(mut self, bitmap: BitmapSpec) -> Self {
        self.current().bitmap = bitmap;
        self
    }

    /// Start another product in the same message (sections 4 to 7 repeated).
    pub fn with_product(mut self, product: ProductSpec) -> Self {
        self.products.push(product);
        self
    }

    /// Build the complete GRIB2 message bytes
    pub fn build(&self) -> Vec<u8> {
        let mut sections = Vec::new();
        sections.extend_from_slice(&self.section1());
        if let Some(local) = &self.local_use {
            sections.extend_from_slice(&section(2, local));
        }
        sections.extend_from_slice(&self.section3());
        for product in &self.products {
            let (section5, section7) = product.data_sections();
            sections.extend_from_slice(&product.section4());
            sections.extend_from_slice(&section5);
            sections.extend_from_slice(&product.section6());
            sections.extend_from_slice(&section7);
        }

        let message_length = 16 + sections.len() + 4;
        let mut message = Vec::with_capacity(message_length);
        message.extend_from_slice(b"GRIB");
        message.extend_from_slice(&[0, 0]); // Reserved
        message.push(self.discipline);
        message.push(2); // Edition 2
        message.extend_from_slice(&(message_length as u64).to_be_bytes());
        message.extend_from_slice(&sections);
        message.extend_from_slice(b"7777");
        message
    }

    /// Section 1 (21 bytes).
    pub fn section1(&self) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&self.center.to_be_bytes());
        body.extend_from_slice(&0u16.to_be_bytes()); // Sub-center
        body.push(2); // Master table version
        body.push(1); // Local table version
        body.push(1); // Significance of reference time (start of forecast)
        body.extend_from_slice(&self.year.to_be_bytes());
        body.push(self.month);
        body.push(self.day);
        body.push(self.hour);
        body.push(0); // Minute
        body.push(0); // Second
        body.push(0); // Production status (operational)
        body.push(1); // Type of data (forecast)
        section(1, &body)
    }

    /// Section 3, template 3.0 (72 bytes).
    pub fn section3(&self) -> Vec<u8> {
        let mut body = Vec::new();
        body.push(0); // Source of grid definition
        body.extend_from_slice(&(self.ni * self.nj).to_be_bytes());
        body.push(0); // Number of octets for optional list
        body.push(0); // Interpretation of optional list
        body.extend_from_slice(&0u16.to_be_bytes()); // Template 3.0

        body.push(6); // Shape of Earth (spherical, radius 6371229 m)
        body.push(0);
        body.extend_from_slice(&0u32.to_be_bytes());
        body.push(0);
        body.extend_from_slice(&0u32.to_be_bytes());
        body.push(0);
        body.extend_from_slice(&0u32.to_be_bytes());

        body.extend_from_slice(&self.ni.to_be_bytes());
        body.extend_from_slice(&self.nj.to_be_bytes());
        body.extend_from_slice(&0u32.to_be_bytes()); // Basic angle
        body.extend_from_slice(&0xFFFF_FFFFu32.to_be_bytes()); // Subdivisions
        body.extend_from_slice(&sign_magnitude(self.la1 as i64, 4));
        body.extend_from_slice(&sign_magnitude(self.lo1 as i64, 4));
        body.push(48); // Resolution and component flags
        body.extend_from_slice(&sign_magnitude(self.la2 as i64, 4));
        body.extend_from_slice(&sign_magnitude(self.lo2 as i64, 4));
        body.extend_from_slice(&self.di.to_be_bytes());
        body.extend_from_slice(&self.dj.to_be_bytes());
        body.push(self.scanning_mode);
        section(3, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_gfs_message() {
        let message = Grib2Builder::new_gfs().build();
        assert_eq!(&message[0..4], b"GRIB");
        assert_eq!(message[7], 2);
        let length = u64::from_be_bytes(message[8..16].try_into().unwrap());
        assert_eq!(length as usize, message.len());
        assert_eq!(&message[message.len() - 4..], b"7777");
    }

    #[test]
    fn test_section_lengths() {
        let builder = Grib2Builder::new_gfs();
        assert_eq!(builder.section1().len(), 21);
        assert_eq!(builder.section3().len(), 72);
        let product = ProductSpec::temperature(vec![1.0]);
        assert_eq!(product.section4().len(), 34);
        assert_eq!(product.data_sections().0.len(), 21);
    }

    #[test]
    fn test_sign_magnitude() {
        assert_eq!(sign_magnitude(-1, 2), vec![0x80, 0x01]);
        assert_eq!(sign_magnitude(5, 1), vec![5]);
    }

    #[test]
    fn test_repeated_products() {
        let single = Grib2Builder::new_row(3).build();
        let double = Grib2Builder::new_row(3)
            .with_product(ProductSpec::temperature(vec![1.0, 2.0, 3.0]))
            .build();
        assert!(double.len() > single.len());
    }
}
