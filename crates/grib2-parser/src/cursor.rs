//! Big-endian, bounds-checked reads over a span of bytes.
//!
//! Positions are absolute: a cursor built over a message read from offset
//! `base` of a file reports file offsets, so spans recorded while decoding
//! can be used to re-read sections later.

use crate::error::{Grib2Error, Result};
use bytes::Bytes;

/// Decode a GRIB sign-magnitude integer held in the low `bits` bits of `raw`.
///
/// GRIB2 stores negative numbers with the most significant bit set and the
/// magnitude in the remaining bits, not in two's complement.
pub fn from_sign_magnitude(raw: u64, bits: u32) -> i64 {
    let sign = 1u64 << (bits - 1);
    let magnitude = (raw & (sign - 1)) as i64;
    if raw & sign != 0 {
        -magnitude
    } else {
        magnitude
    }
}

/// Encode `value` as a `bits`-wide sign-magnitude integer.
pub fn to_sign_magnitude(value: i64, bits: u32) -> u64 {
    let sign = 1u64 << (bits - 1);
    let magnitude = value.unsigned_abs() & (sign - 1);
    if value < 0 {
        magnitude | sign
    } else {
        magnitude
    }
}

#[derive(Debug, Clone)]
pub struct BinaryCursor {
    data: Bytes,
    base: u64,
    pos: usize,
}

impl BinaryCursor {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self::with_base(data, 0)
    }

    /// Cursor whose first byte sits at absolute offset `base`.
    pub fn with_base(data: impl Into<Bytes>, base: u64) -> Self {
        Self {
            data: data.into(),
            base,
            pos: 0,
        }
    }

    pub fn position(&self) -> u64 {
        self.base + self.pos as u64
    }

    /// Absolute offset one past the last readable byte.
    pub fn end(&self) -> u64 {
        self.base + self.data.len() as u64
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn seek(&mut self, offset: u64) -> Result<()> {
        if offset < self.base || offset > self.end() {
            return Err(Grib2Error::OutOfBounds {
                offset,
                requested: 0,
                end: self.end(),
            });
        }
        self.pos = (offset - self.base) as usize;
        Ok(())
    }

    pub fn skip(&mut self, count: usize) -> Result<()> {
        self.take(count).map(|_| ())
    }

    fn take(&mut self, count: usize) -> Result<&[u8]> {
        if count > self.remaining() {
            return Err(Grib2Error::OutOfBounds {
                offset: self.position(),
                requested: count as u64,
                end: self.end(),
            });
        }
        let start = self.pos;
        self.pos += count;
        Ok(&self.data[start..self.pos])
    }

    /// Look at the next `count` bytes without consuming them.
    pub fn peek(&self, count: usize) -> Result<&[u8]> {
        if count > self.remaining() {
            return Err(Grib2Error::OutOfBounds {
                offset: self.position(),
                requested: count as u64,
                end: self.end(),
            });
        }
        Ok(&self.data[self.pos..self.pos + count])
    }

    /// Unsigned big-endian integer of `width` bytes (1..=8).
    pub fn read_uint(&mut self, width: usize) -> Result<u64> {
        debug_assert!((1..=8).contains(&width));
        Ok(self
            .take(width)?
            .iter()
            .fold(0u64, |acc, &b| (acc << 8) | b as u64))
    }

    /// Sign-magnitude big-endian integer of `width` bytes (1..=8).
    pub fn read_int(&mut self, width: usize) -> Result<i64> {
        let raw = self.read_uint(width)?;
        Ok(from_sign_magnitude(raw, width as u32 * 8))
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(self.read_uint(2)? as u16)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(self.read_uint(4)? as u32)
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        self.read_uint(8)
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_int(1)? as i8)
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(self.read_int(2)? as i16)
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(self.read_int(4)? as i32)
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_bits(self.read_u64()?))
    }

    /// Next `count` bytes as a zero-copy slice of the underlying buffer.
    pub fn read_bytes(&mut self, count: usize) -> Result<Bytes> {
        self.take(count)?;
        Ok(self.data.slice(self.pos - count..self.pos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_magnitude() {
        assert_eq!(from_sign_magnitude(0x0000_0005, 32), 5);
        assert_eq!(from_sign_magnitude(0x8000_0005, 32), -5);
        assert_eq!(from_sign_magnitude(0x81, 8), -1);
        assert_eq!(from_sign_magnitude(0x8000, 16), 0);
        assert_eq!(to_sign_magnitude(-5, 32), 0x8000_0005);
        assert_eq!(to_sign_magnitude(-1, 8), 0x81);
        assert_eq!(to_sign_magnitude(300, 16), 300);
    }

    #[test]
    fn test_reads_are_big_endian_and_absolute() {
        let mut cursor = BinaryCursor::with_base(vec![0x01, 0x02, 0x80, 0x03, 0xff], 100);
        assert_eq!(cursor.position(), 100);
        assert_eq!(cursor.read_u16().unwrap(), 0x0102);
        assert_eq!(cursor.read_i16().unwrap(), -3);
        assert_eq!(cursor.position(), 104);
        assert_eq!(cursor.remaining(), 1);
        cursor.seek(101).unwrap();
        assert_eq!(cursor.read_u8().unwrap(), 0x02);
    }

    #[test]
    fn test_read_past_end_is_out_of_bounds() {
        let mut cursor = BinaryCursor::with_base(vec![0u8; 3], 10);
        let err = cursor.read_u32().unwrap_err();
        assert!(matches!(
            err,
            Grib2Error::OutOfBounds { offset: 10, requested: 4, end: 13 }
        ));
        // a failed read does not move the cursor
        assert_eq!(cursor.position(), 10);
        assert!(cursor.seek(14).is_err());
        assert!(cursor.seek(9).is_err());
    }

    #[test]
    fn test_floats() {
        let mut bytes = 1.5f32.to_be_bytes().to_vec();
        bytes.extend_from_slice(&(-2.25f64).to_be_bytes());
        let mut cursor = BinaryCursor::new(bytes);
        assert_eq!(cursor.read_f32().unwrap(), 1.5);
        assert_eq!(cursor.read_f64().unwrap(), -2.25);
    }
}
