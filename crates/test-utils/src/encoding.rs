//! Bit packing and PNG encoding for building packed (templates 5.0 to
//! 5.41) fixtures.

use ::png::{BitDepth, ColorType, Encoder, FilterType};

/// Encode unsigned samples as a PNG image.
///
/// * `bit_depth` / `color_type` - as in IHDR (0 gray, 2 RGB, 4 gray-alpha, 6 RGBA)
/// * `filter` - scanline filter applied to every row (0 none, 1 sub, 2 up)
///
/// Each sample carries all channels of one pixel, most significant first.
pub fn create_png_samples(
    samples: &[u32],
    width: usize,
    height: usize,
    bit_depth: u8,
    color_type: u8,
    filter: u8,
) -> Vec<u8> {
    let (color, channels) = match color_type {
        0 => (ColorType::Grayscale, 1),
        2 => (ColorType::Rgb, 3),
        4 => (ColorType::GrayscaleAlpha, 2),
        6 => (ColorType::Rgba, 4),
        other => panic!("unsupported color type {other}"),
    };
    let depth = BitDepth::from_u8(bit_depth).expect("valid PNG bit depth");
    let filter = match filter {
        0 => FilterType::NoFilter,
        1 => FilterType::Sub,
        2 => FilterType::Up,
        other => panic!("unsupported filter {other}"),
    };

    let bits_per_pixel = bit_depth as usize * channels;
    let row_bytes = (width * bits_per_pixel).div_ceil(8);
    let mut image = Vec::with_capacity(row_bytes * height);
    for row in 0..height {
        let mut packed = BitWriter::default();
        for col in 0..width {
            packed.write(samples[row * width + col], bits_per_pixel);
        }
        let mut bytes = packed.finish();
        bytes.resize(row_bytes, 0);
        image.extend_from_slice(&bytes);
    }

    let mut png = Vec::new();
    let mut encoder = Encoder::new(&mut png, width as u32, height as u32);
    encoder.set_color(color);
    encoder.set_depth(depth);
    encoder.set_filter(filter);
    let mut writer = encoder.write_header().expect("in-memory PNG header");
    writer.write_image_data(&image).expect("in-memory PNG data");
    writer.finish().expect("in-memory PNG trailer");
    png
}

/// MSB-first bit packer.
#[derive(Debug, Default)]
pub struct BitWriter {
    bytes: Vec<u8>,
    used: usize,
}

impl BitWriter {
    pub fn write(&mut self, value: u32, bits: usize) {
        for shift in (0..bits).rev() {
            if self.used % 8 == 0 {
                self.bytes.push(0);
            }
            let bit = ((value as u64 >> shift) & 1) as u8;
            let last = self.bytes.len() - 1;
            self.bytes[last] |= bit << (7 - self.used % 8);
            self.used += 1;
        }
    }

    /// Pad to the next byte boundary.
    pub fn align(&mut self) {
        self.used = self.used.div_ceil(8) * 8;
    }

    pub fn finish(self) -> Vec<u8> {
        self.bytes
    }
}

/// Pack `values` at `bits` bits each, MSB first, padded to whole bytes.
pub fn pack_bits(values: &[u32], bits: usize) -> Vec<u8> {
    let mut writer = BitWriter::default();
    for &v in values {
        writer.write(v, bits);
    }
    writer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_bits() {
        assert_eq!(pack_bits(&[0b101, 0b011], 3), vec![0b1010_1100]);
        assert_eq!(pack_bits(&[0xABC], 12), vec![0xAB, 0xC0]);
        assert!(pack_bits(&[], 8).is_empty());
    }

    #[test]
    fn test_png_structure() {
        let png = create_png_samples(&[1, 2, 3, 4], 2, 2, 8, 0, 0);
        assert_eq!(&png[..8], &[137, 80, 78, 71, 13, 10, 26, 10]);
        assert_eq!(&png[12..16], b"IHDR");
        assert_eq!(&png[png.len() - 8..png.len() - 4], b"IEND");
    }
}
