//! GRIB2 data unpacking algorithms.
//!
//! Implements the packing methods of section 5:
//! - Simple packing (5.0)
//! - Complex packing, with or without spatial differencing (5.2, 5.3)
//! - IEEE floating point (5.4)
//! - JPEG 2000 (5.40) through a pluggable [`ImageDecoder`]
//! - PNG (5.41) with the built-in decoder
//!
//! Unpacking is pure: it reads only its arguments, so records may be
//! unpacked in parallel.

mod bits;
mod complex;
mod png_image;

pub use bits::{BitReader, MAX_PACKING_BITS};
pub use png_image::{decode_png, PngImage};

use crate::error::{Grib2Error, Result};
use crate::sections::{BitmapView, DataRepresentationView, Section, SectionKind, SimplePacking};
use std::fmt;
use std::sync::Arc;

/// External decoder for image-compressed data (JPEG 2000 code streams).
pub trait ImageDecoder: Send + Sync + fmt::Debug {
    /// Decode the code stream into one unsigned sample per grid point.
    fn decode(&self, codestream: &[u8]) -> Result<Vec<u32>>;
}

#[derive(Debug, Clone)]
pub struct UnpackOptions {
    /// Value written at points without data.
    pub missing_value: f32,
    pub jpeg2000: Option<Arc<dyn ImageDecoder>>,
}

impl Default for UnpackOptions {
    fn default() -> Self {
        Self {
            missing_value: f32::NAN,
            jpeg2000: None,
        }
    }
}

/// Unpacked values of one record, row-major over `shape = (ny, nx)`.
#[derive(Debug, Clone, PartialEq)]
pub struct UnpackedGrid {
    pub values: Vec<f32>,
    /// Set when some points carry no data.
    pub missing_value: Option<f32>,
    pub shape: (usize, usize),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridStats {
    pub valid: usize,
    pub missing: usize,
    pub min: f32,
    pub max: f32,
    pub mean: f64,
}

impl UnpackedGrid {
    pub fn is_missing(&self, value: f32) -> bool {
        match self.missing_value {
            Some(m) if m.is_nan() => value.is_nan(),
            Some(m) => value == m,
            None => false,
        }
    }

    pub fn valid_values(&self) -> impl Iterator<Item = f32> + '_ {
        self.values.iter().copied().filter(|v| !self.is_missing(*v))
    }

    pub fn stats(&self) -> GridStats {
        let mut stats = GridStats {
            valid: 0,
            missing: 0,
            min: f32::INFINITY,
            max: f32::NEG_INFINITY,
            mean: 0.0,
        };
        let mut sum = 0.0f64;
        for &v in &self.values {
            if self.is_missing(v) {
                stats.missing += 1;
                continue;
            }
            stats.valid += 1;
            stats.min = stats.min.min(v);
            stats.max = stats.max.max(v);
            sum += v as f64;
        }
        if stats.valid > 0 {
            stats.mean = sum / stats.valid as f64;
        } else {
            stats.min = f32::NAN;
            stats.max = f32::NAN;
        }
        stats
    }
}

/// Applies `Y = (R + X * 2^E) * 10^-D`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Scaler {
    reference: f64,
    binary: f64,
    decimal: f64,
}

impl Scaler {
    pub(crate) fn new(params: &SimplePacking) -> Self {
        Self {
            reference: params.reference_value as f64,
            binary: 2f64.powi(params.binary_scale_factor as i32),
            decimal: 10f64.powi(-(params.decimal_scale_factor as i32)),
        }
    }

    pub(crate) fn apply(&self, packed: i64) -> f32 {
        ((self.reference + packed as f64 * self.binary) * self.decimal) as f32
    }

    /// Value of a field whose bit width is 0.
    pub(crate) fn constant(&self) -> f32 {
        (self.reference * self.decimal) as f32
    }
}

/// Unpack one record.
///
/// `data` is the data section body (after its 5-byte header), `shape` the
/// grid dimensions `(ny, nx)` from the grid definition.
pub fn unpack(
    drs: &Section,
    bitmap: Option<&Section>,
    data: &[u8],
    shape: (usize, usize),
    options: &UnpackOptions,
) -> Result<UnpackedGrid> {
    let view = DataRepresentationView::new(drs);
    let count = view.data_point_count()? as usize;
    let points = shape.0.checked_mul(shape.1).ok_or_else(|| {
        Grib2Error::invalid_field("shape", format!("{}x{} grid is too large", shape.0, shape.1))
    })?;
    if count > points {
        return Err(Grib2Error::invalid_field(
            "data_point_count",
            format!("{count} data points for a {}x{} grid", shape.0, shape.1),
        ));
    }

    let packed: Vec<Option<f32>> = match view.template() {
        0 => unpack_simple(&view.simple()?, data, count)?
            .into_iter()
            .map(Some)
            .collect(),
        2 | 3 => complex::unpack(&view, data, count)?,
        4 => unpack_ieee(view.ieee_precision()?, data, count)?
            .into_iter()
            .map(Some)
            .collect(),
        40 => {
            let params = view.simple()?;
            if params.bits_per_value == 0 {
                vec![Some(Scaler::new(&params).constant()); count]
            } else {
                check_width(&params)?;
                let decoder = options
                    .jpeg2000
                    .as_ref()
                    .ok_or(Grib2Error::CodecUnavailable("JPEG 2000"))?;
                scale_samples(&params, &decoder.decode(data)?, count)?
            }
        }
        41 => {
            let params = view.simple()?;
            if params.bits_per_value == 0 {
                vec![Some(Scaler::new(&params).constant()); count]
            } else {
                check_width(&params)?;
                scale_samples(&params, decode_png(data)?.samples(), count)?
            }
        }
        template => {
            return Err(Grib2Error::UnsupportedTemplate {
                kind: SectionKind::DataRepresentation,
                template,
            })
        }
    };

    expand(packed, bitmap, shape, options.missing_value)
}

/// Spread packed values over the grid through the bitmap.
fn expand(
    packed: Vec<Option<f32>>,
    bitmap: Option<&Section>,
    shape: (usize, usize),
    missing_value: f32,
) -> Result<UnpackedGrid> {
    let total = shape.0.saturating_mul(shape.1);
    let bits = match bitmap {
        Some(section) => {
            let view = BitmapView::new(section);
            match view.indicator()? {
                0 | 254 => Some(view.bits()),
                255 => None,
                other => {
                    return Err(Grib2Error::invalid_field(
                        "bitmap_indicator",
                        format!("predefined bitmap {other} is not supported"),
                    ))
                }
            }
        }
        None => None,
    };

    let mut has_missing = packed.iter().any(Option::is_none);
    let values = match &bits {
        Some(bits) => {
            if bits.len() * 8 < total {
                return Err(Grib2Error::invalid_field(
                    "bitmap",
                    format!("{} bits for {} grid points", bits.len() * 8, total),
                ));
            }
            let mut source = packed.into_iter();
            let mut values = Vec::with_capacity(total);
            for i in 0..total {
                if BitmapView::is_set(bits, i) {
                    let value = source.next().ok_or_else(|| {
                        Grib2Error::invalid_field("bitmap", "more points set than packed values")
                    })?;
                    values.push(value.unwrap_or(missing_value));
                } else {
                    has_missing = true;
                    values.push(missing_value);
                }
            }
            let extra = source.count();
            if extra > 0 {
                return Err(Grib2Error::invalid_field(
                    "bitmap",
                    format!("{extra} packed values left over after the last point set"),
                ));
            }
            values
        }
        None => {
            if packed.len() != total {
                return Err(Grib2Error::invalid_field(
                    "data_point_count",
                    format!(
                        "{} packed values for a {}x{} grid",
                        packed.len(),
                        shape.0,
                        shape.1
                    ),
                ));
            }
            packed
                .into_iter()
                .map(|v| v.unwrap_or(missing_value))
                .collect()
        }
    };

    Ok(UnpackedGrid {
        values,
        missing_value: (bits.is_some() || has_missing).then_some(missing_value),
        shape,
    })
}

fn check_width(params: &SimplePacking) -> Result<()> {
    if params.bits_per_value > MAX_PACKING_BITS {
        return Err(Grib2Error::UnsupportedPackingWidth {
            bits: params.bits_per_value,
        });
    }
    Ok(())
}

/// Simple packing: `count` values of `bits_per_value` bits each.
pub fn unpack_simple(params: &SimplePacking, data: &[u8], count: usize) -> Result<Vec<f32>> {
    let scaler = Scaler::new(params);
    if params.bits_per_value == 0 {
        return Ok(vec![scaler.constant(); count]);
    }
    check_width(params)?;

    let mut reader = BitReader::new(data);
    (0..count)
        .map(|_| Ok(scaler.apply(reader.read(params.bits_per_value)? as i64)))
        .collect()
}

fn unpack_ieee(precision: u8, data: &[u8], count: usize) -> Result<Vec<f32>> {
    let width = match precision {
        1 => 4,
        2 => 8,
        3 => return Err(Grib2Error::UnsupportedPackingWidth { bits: 128 }),
        other => {
            return Err(Grib2Error::invalid_field(
                "precision",
                format!("unknown IEEE precision {other}"),
            ))
        }
    };
    if data.len() < count * width {
        return Err(Grib2Error::TruncatedData {
            needed: (count * width * 8) as u64,
            available: (data.len() * 8) as u64,
        });
    }
    let chunks = data.chunks_exact(width).take(count);
    Ok(if width == 4 {
        chunks
            .map(|c| f32::from_be_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    } else {
        chunks
            .map(|c| {
                let mut eight = [0u8; 8];
                eight.copy_from_slice(c);
                f64::from_be_bytes(eight) as f32
            })
            .collect()
    })
}

fn scale_samples(params: &SimplePacking, samples: &[u32], count: usize) -> Result<Vec<Option<f32>>> {
    check_width(params)?;
    if samples.len() < count {
        return Err(Grib2Error::codec(
            "image",
            format!("{} samples decoded, {} expected", samples.len(), count),
        ));
    }
    let scaler = Scaler::new(params);
    Ok(samples[..count]
        .iter()
        .map(|&x| Some(scaler.apply(x as i64)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simple(reference: f32, e: i16, d: i16, bits: u8) -> SimplePacking {
        SimplePacking {
            reference_value: reference,
            binary_scale_factor: e,
            decimal_scale_factor: d,
            bits_per_value: bits,
            original_field_type: 0,
        }
    }

    #[test]
    fn test_simple_unpacking() {
        let values = unpack_simple(&simple(0.0, 0, 0, 8), &[100, 200], 2).unwrap();
        assert_eq!(values, vec![100.0, 200.0]);
    }

    #[test]
    fn test_simple_formula() {
        // R = 1, E = 1, D = 0, X = 10 -> (1 + 10 * 2) * 1 = 21
        let values = unpack_simple(&simple(1.0, 1, 0, 8), &[10], 1).unwrap();
        assert_eq!(values, vec![21.0]);

        // D = 1 divides by ten
        let values = unpack_simple(&simple(0.0, 0, 1, 8), &[25], 1).unwrap();
        assert!((values[0] - 2.5).abs() < 1e-6);
    }

    #[test]
    fn test_constant_field() {
        let values = unpack_simple(&simple(273.0, 0, 0, 0), &[], 4).unwrap();
        assert_eq!(values, vec![273.0; 4]);
    }

    #[test]
    fn test_width_above_limit() {
        let err = unpack_simple(&simple(0.0, 0, 0, 40), &[0; 10], 1).unwrap_err();
        assert!(matches!(err, Grib2Error::UnsupportedPackingWidth { bits: 40 }));
    }

    #[test]
    fn test_ieee_widths() {
        let mut data = 1.25f32.to_be_bytes().to_vec();
        data.extend_from_slice(&(-3.5f32).to_be_bytes());
        assert_eq!(unpack_ieee(1, &data, 2).unwrap(), vec![1.25, -3.5]);

        let data = 6.5f64.to_be_bytes();
        assert_eq!(unpack_ieee(2, &data, 1).unwrap(), vec![6.5]);
        assert!(unpack_ieee(1, &data, 3).is_err());
    }

    #[test]
    fn test_grid_stats() {
        let grid = UnpackedGrid {
            values: vec![1.0, f32::NAN, 3.0],
            missing_value: Some(f32::NAN),
            shape: (1, 3),
        };
        let stats = grid.stats();
        assert_eq!(stats.valid, 2);
        assert_eq!(stats.missing, 1);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 3.0);
        assert_eq!(stats.mean, 2.0);
    }
}
