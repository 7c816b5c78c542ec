//! Field-layout descriptors and the generic decoder/encoder driven by them.
//!
//! A template is a static slice of [`Field`]s. Decoding walks the slice and
//! appends one named value per field; encoding walks the same slice and
//! writes the values back, so decode followed by encode reproduces the
//! original bytes.

use super::{FieldValue, Fields};
use crate::cursor::{to_sign_magnitude, BinaryCursor};
use crate::error::{Grib2Error, Result};
use std::borrow::Cow;

/// One entry of a section layout.
#[derive(Debug, Clone, Copy)]
pub enum Field {
    U8(&'static str),
    U16(&'static str),
    U32(&'static str),
    U64(&'static str),
    /// Sign-magnitude integers.
    I8(&'static str),
    I16(&'static str),
    I32(&'static str),
    /// IEEE 754 single precision.
    F32(&'static str),
    /// Fixed number of raw bytes.
    Bytes(&'static str, usize),
    /// `fields` repeated as many times as the value of the earlier field
    /// `count`; repeated names are stored as `name[i]`.
    Repeat {
        count: &'static str,
        fields: &'static [Field],
    },
    /// Everything up to the end of the section.
    Rest(&'static str),
}

impl Field {
    fn name(&self) -> &'static str {
        match *self {
            Field::U8(n)
            | Field::U16(n)
            | Field::U32(n)
            | Field::U64(n)
            | Field::I8(n)
            | Field::I16(n)
            | Field::I32(n)
            | Field::F32(n)
            | Field::Bytes(n, _)
            | Field::Rest(n) => n,
            Field::Repeat { count, .. } => count,
        }
    }
}

fn field_name(name: &'static str, index: Option<usize>) -> Cow<'static, str> {
    match index {
        Some(i) => Cow::Owned(format!("{name}[{i}]")),
        None => Cow::Borrowed(name),
    }
}

pub(crate) fn decode_fields(
    cursor: &mut BinaryCursor,
    layout: &[Field],
    out: &mut Fields,
) -> Result<()> {
    decode_into(cursor, layout, out, None)
}

fn decode_into(
    cursor: &mut BinaryCursor,
    layout: &[Field],
    out: &mut Fields,
    index: Option<usize>,
) -> Result<()> {
    for field in layout {
        let value = match *field {
            Field::Repeat { count, fields } => {
                let times = out
                    .get_uint(count)
                    .ok_or_else(|| Grib2Error::invalid_field(count, "repeat count not decoded"))?;
                for i in 0..times as usize {
                    decode_into(cursor, fields, out, Some(i))?;
                }
                continue;
            }
            Field::U8(_) => FieldValue::Unsigned(cursor.read_u8()? as u64),
            Field::U16(_) => FieldValue::Unsigned(cursor.read_u16()? as u64),
            Field::U32(_) => FieldValue::Unsigned(cursor.read_u32()? as u64),
            Field::U64(_) => FieldValue::Unsigned(cursor.read_u64()?),
            Field::I8(_) => FieldValue::Signed(cursor.read_int(1)?),
            Field::I16(_) => FieldValue::Signed(cursor.read_int(2)?),
            Field::I32(_) => FieldValue::Signed(cursor.read_int(4)?),
            Field::F32(_) => FieldValue::Float(cursor.read_f32()?),
            Field::Bytes(_, len) => FieldValue::Bytes(cursor.read_bytes(len)?),
            Field::Rest(_) => FieldValue::Bytes(cursor.read_bytes(cursor.remaining())?),
        };
        out.push(field_name(field.name(), index), value);
    }
    Ok(())
}

pub(crate) fn encode_fields(layout: &[Field], fields: &Fields, out: &mut Vec<u8>) -> Result<()> {
    encode_from(layout, fields, out, None)
}

fn encode_from(
    layout: &[Field],
    fields: &Fields,
    out: &mut Vec<u8>,
    index: Option<usize>,
) -> Result<()> {
    for field in layout {
        if let Field::Repeat { count, fields: inner } = *field {
            let times = fields
                .get_uint(count)
                .ok_or_else(|| Grib2Error::invalid_field(count, "repeat count missing"))?;
            for i in 0..times as usize {
                encode_from(inner, fields, out, Some(i))?;
            }
            continue;
        }

        let name = field_name(field.name(), index);
        let value = fields
            .get(&name)
            .ok_or_else(|| Grib2Error::invalid_field(name.as_ref(), "field missing"))?;

        match (*field, value) {
            (Field::U8(_), v) => write_uint(out, &name, unsigned(&name, v)?, 1)?,
            (Field::U16(_), v) => write_uint(out, &name, unsigned(&name, v)?, 2)?,
            (Field::U32(_), v) => write_uint(out, &name, unsigned(&name, v)?, 4)?,
            (Field::U64(_), v) => write_uint(out, &name, unsigned(&name, v)?, 8)?,
            (Field::I8(_), v) => write_int(out, &name, signed(&name, v)?, 1)?,
            (Field::I16(_), v) => write_int(out, &name, signed(&name, v)?, 2)?,
            (Field::I32(_), v) => write_int(out, &name, signed(&name, v)?, 4)?,
            (Field::F32(_), FieldValue::Float(f)) => out.extend_from_slice(&f.to_bits().to_be_bytes()),
            (Field::Bytes(_, len), FieldValue::Bytes(b)) if b.len() == len => out.extend_from_slice(b),
            (Field::Rest(_), FieldValue::Bytes(b)) => out.extend_from_slice(b),
            (_, other) => {
                return Err(Grib2Error::invalid_field(
                    name.as_ref(),
                    format!("value {other:?} does not fit the layout"),
                ))
            }
        }
    }
    Ok(())
}

fn unsigned(name: &str, value: &FieldValue) -> Result<u64> {
    match *value {
        FieldValue::Unsigned(v) => Ok(v),
        FieldValue::Signed(v) if v >= 0 => Ok(v as u64),
        _ => Err(Grib2Error::invalid_field(name, "expected an unsigned integer")),
    }
}

fn signed(name: &str, value: &FieldValue) -> Result<i64> {
    match *value {
        FieldValue::Signed(v) => Ok(v),
        FieldValue::Unsigned(v) => i64::try_from(v)
            .map_err(|_| Grib2Error::invalid_field(name, "value exceeds signed range")),
        _ => Err(Grib2Error::invalid_field(name, "expected a signed integer")),
    }
}

fn write_uint(out: &mut Vec<u8>, name: &str, value: u64, width: usize) -> Result<()> {
    if width < 8 && value >> (width * 8) != 0 {
        return Err(Grib2Error::invalid_field(
            name,
            format!("{value} does not fit in {width} bytes"),
        ));
    }
    out.extend_from_slice(&value.to_be_bytes()[8 - width..]);
    Ok(())
}

fn write_int(out: &mut Vec<u8>, name: &str, value: i64, width: usize) -> Result<()> {
    let bits = width as u32 * 8;
    if value.unsigned_abs() >= 1u64 << (bits - 1) {
        return Err(Grib2Error::invalid_field(
            name,
            format!("{value} does not fit in {width} sign-magnitude bytes"),
        ));
    }
    out.extend_from_slice(&to_sign_magnitude(value, bits).to_be_bytes()[8 - width..]);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const POINT: &[Field] = &[
        Field::U8("kind"),
        Field::I16("offset"),
        Field::U8("count"),
        Field::Repeat {
            count: "count",
            fields: &[Field::U16("value")],
        },
        Field::Rest("tail"),
    ];

    #[test]
    fn test_repeat_fields_are_indexed() {
        let bytes = vec![7u8, 0x80, 0x02, 2, 0, 10, 0, 20, 0xaa];
        let mut cursor = BinaryCursor::new(bytes.clone());
        let mut fields = Fields::default();
        decode_fields(&mut cursor, POINT, &mut fields).unwrap();

        assert_eq!(fields.get_uint("kind"), Some(7));
        assert_eq!(fields.get_int("offset"), Some(-2));
        assert_eq!(fields.get_uint("value[0]"), Some(10));
        assert_eq!(fields.get_uint("value[1]"), Some(20));
        assert_eq!(fields.get_bytes("tail").map(|b| b.to_vec()), Some(vec![0xaa]));

        let mut out = Vec::new();
        encode_fields(POINT, &fields, &mut out).unwrap();
        assert_eq!(out, bytes);
    }

    #[test]
    fn test_encode_rejects_overflow() {
        let mut fields = Fields::default();
        fields.push(Cow::Borrowed("kind"), FieldValue::Unsigned(300));
        let mut out = Vec::new();
        assert!(encode_fields(&[Field::U8("kind")], &fields, &mut out).is_err());
    }

    #[test]
    fn test_negative_zero_normalises() {
        let mut cursor = BinaryCursor::new(vec![0x80u8, 0x00]);
        let mut fields = Fields::default();
        decode_fields(&mut cursor, &[Field::I16("v")], &mut fields).unwrap();
        let mut out = Vec::new();
        encode_fields(&[Field::I16("v")], &fields, &mut out).unwrap();
        assert_eq!(out, vec![0x00, 0x00]);
    }
}
