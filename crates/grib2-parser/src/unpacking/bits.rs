//! MSB-first bit extraction over packed data.

use crate::error::{Grib2Error, Result};

/// Widest integer a packed value may use.
pub const MAX_PACKING_BITS: u8 = 32;

/// Sequential reader of big-endian bit fields.
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    bit_pos: u64,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, bit_pos: 0 }
    }

    /// Current position in bits from the start of the data.
    pub fn position(&self) -> u64 {
        self.bit_pos
    }

    pub fn available(&self) -> u64 {
        self.data.len() as u64 * 8
    }

    /// Read a `bits`-wide unsigned value. Zero bits read as 0.
    pub fn read(&mut self, bits: u8) -> Result<u32> {
        if bits == 0 {
            return Ok(0);
        }
        if bits > MAX_PACKING_BITS {
            return Err(Grib2Error::UnsupportedPackingWidth { bits });
        }
        let needed = self.bit_pos + bits as u64;
        if needed > self.available() {
            return Err(Grib2Error::TruncatedData {
                needed,
                available: self.available(),
            });
        }

        let mut value = 0u64;
        let mut remaining = bits as u32;
        while remaining > 0 {
            let byte = self.data[(self.bit_pos / 8) as usize];
            let free = 8 - (self.bit_pos % 8) as u32;
            let take = free.min(remaining);
            let chunk = (byte as u64 >> (free - take)) & ((1u64 << take) - 1);
            value = (value << take) | chunk;
            self.bit_pos += take as u64;
            remaining -= take;
        }
        Ok(value as u32)
    }

    /// Read a sign-magnitude integer of `bits` bits.
    pub fn read_signed(&mut self, bits: u8) -> Result<i64> {
        if bits == 0 {
            return Ok(0);
        }
        let raw = self.read(bits)?;
        Ok(crate::cursor::from_sign_magnitude(raw as u64, bits as u32))
    }

    /// Move to the next byte boundary.
    pub fn align(&mut self) {
        self.bit_pos = self.bit_pos.div_ceil(8) * 8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_bits() {
        let data = [0b1011_0101u8];
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.read(2).unwrap(), 0b10);
        assert_eq!(reader.read(2).unwrap(), 0b11);
        assert_eq!(reader.read(4).unwrap(), 0b0101);
        assert!(matches!(
            reader.read(1),
            Err(Grib2Error::TruncatedData { needed: 9, available: 8 })
        ));
    }

    #[test]
    fn test_cross_byte_fields() {
        let data = [0xAB, 0xCD, 0xEF, 0x12, 0x34];
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.read(12).unwrap(), 0xABC);
        assert_eq!(reader.read(20).unwrap(), 0xDEF12);
        reader.align();
        assert_eq!(reader.position(), 32);
        assert_eq!(reader.read(8).unwrap(), 0x34);
    }

    #[test]
    fn test_full_width_and_limits() {
        let data = [0xFF; 5];
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.read(32).unwrap(), u32::MAX);
        assert!(matches!(
            reader.read(33),
            Err(Grib2Error::UnsupportedPackingWidth { bits: 33 })
        ));
        assert_eq!(reader.read(0).unwrap(), 0);
    }

    #[test]
    fn test_signed_and_align() {
        let data = [0b1000_0011, 0b0000_0101];
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.read_signed(8).unwrap(), -3);
        reader.align();
        assert_eq!(reader.read_signed(8).unwrap(), 5);
    }
}
