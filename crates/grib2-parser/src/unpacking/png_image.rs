//! Template 5.41 image decoding on top of the `png` crate.
//!
//! GRIB2 PNG payloads are non-interlaced grayscale (1 to 16 bits), RGB
//! (8 bits per channel, read as one 24-bit sample) or RGBA (read as one
//! 32-bit sample) images. Anything else is rejected.

use super::bits::BitReader;
use crate::error::{Grib2Error, Result};
use ::png::{BitDepth, ColorType, Decoder, Transformations};

const CODEC: &str = "PNG";

/// Decoded image with one unsigned sample per pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PngImage {
    pub width: u32,
    pub height: u32,
    pub bit_depth: u8,
    pub color_type: u8,
    samples: Vec<u32>,
}

impl PngImage {
    pub fn samples(&self) -> &[u32] {
        &self.samples
    }

    /// Bits of one pixel, all channels together.
    pub fn bits_per_pixel(&self) -> u32 {
        self.bit_depth as u32 * channels(self.color_type).unwrap_or(1)
    }
}

fn channels(color_type: u8) -> Option<u32> {
    match color_type {
        0 => Some(1),
        2 => Some(3),
        4 => Some(2),
        6 => Some(4),
        _ => None,
    }
}

fn supported(color_type: ColorType, bit_depth: BitDepth) -> bool {
    match color_type {
        ColorType::Grayscale => true,
        ColorType::Rgb | ColorType::GrayscaleAlpha | ColorType::Rgba => {
            bit_depth == BitDepth::Eight
        }
        ColorType::Indexed => false,
    }
}

pub fn decode_png(data: &[u8]) -> Result<PngImage> {
    let mut decoder = Decoder::new(data);
    // keep samples exactly as packed, 16-bit stays big-endian
    decoder.set_transformations(Transformations::IDENTITY);
    let mut reader = decoder
        .read_info()
        .map_err(|e| Grib2Error::codec(CODEC, e.to_string()))?;

    let info = reader.info();
    if info.interlaced {
        return Err(Grib2Error::codec(CODEC, "interlaced images are not supported"));
    }
    if !supported(info.color_type, info.bit_depth) {
        return Err(Grib2Error::codec(
            CODEC,
            format!(
                "unsupported sample layout: color type {} at {} bits",
                info.color_type as u8, info.bit_depth as u8
            ),
        ));
    }

    let mut buf = vec![0u8; reader.output_buffer_size()];
    let frame = reader
        .next_frame(&mut buf)
        .map_err(|e| Grib2Error::codec(CODEC, e.to_string()))?;

    let bit_depth = frame.bit_depth as u8;
    let color_type = frame.color_type as u8;
    let bits_per_pixel = bit_depth as u32 * frame.color_type.samples() as u32;
    let width = frame.width as usize;
    let height = frame.height as usize;

    let mut samples = Vec::with_capacity(width * height);
    for row in buf[..frame.buffer_size()].chunks_exact(frame.line_size) {
        let mut bits = BitReader::new(row);
        for _ in 0..width {
            samples.push(bits.read(bits_per_pixel as u8)?);
        }
    }
    if samples.len() != width * height {
        return Err(Grib2Error::codec(
            CODEC,
            format!("{} samples decoded, {} expected", samples.len(), width * height),
        ));
    }

    Ok(PngImage {
        width: frame.width,
        height: frame.height,
        bit_depth,
        color_type,
        samples,
    })
}
