//! GRIB2 section decoding.
//!
//! Each GRIB2 message is a sequence of sections: the 16-byte indicator,
//! then sections 1 to 7 (each starting with a 4-byte length and a 1-byte
//! section number), then the `7777` end marker. Sections 3, 4 and 5 carry a
//! template number selecting the layout of the rest of the section; the
//! layouts live in [`templates`].

pub mod layout;
pub mod templates;
pub mod views;

use crate::cursor::BinaryCursor;
use crate::error::{Grib2Error, Result};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

pub use layout::Field;
pub use templates::{lookup, template_name, TemplateLayout};
pub use views::{
    BitmapView, ComplexPacking, DataRepresentationView, GridDefinitionView, IdentificationView,
    IndicatorView, ProductDefinitionView, ScanMode, SimplePacking, SpatialDifferencing,
    SurfaceField, TimeRange,
};

/// Indicator (section 0) length in bytes.
pub const INDICATOR_LENGTH: usize = 16;

/// Marker closing every message.
pub const END_MARKER: &[u8; 4] = b"7777";

/// Section kinds, numbered as on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SectionKind {
    Indicator,
    Identification,
    LocalUse,
    GridDefinition,
    ProductDefinition,
    DataRepresentation,
    Bitmap,
    Data,
}

impl SectionKind {
    pub fn number(self) -> u8 {
        match self {
            SectionKind::Indicator => 0,
            SectionKind::Identification => 1,
            SectionKind::LocalUse => 2,
            SectionKind::GridDefinition => 3,
            SectionKind::ProductDefinition => 4,
            SectionKind::DataRepresentation => 5,
            SectionKind::Bitmap => 6,
            SectionKind::Data => 7,
        }
    }

    pub fn from_number(number: u8) -> Option<Self> {
        Some(match number {
            0 => SectionKind::Indicator,
            1 => SectionKind::Identification,
            2 => SectionKind::LocalUse,
            3 => SectionKind::GridDefinition,
            4 => SectionKind::ProductDefinition,
            5 => SectionKind::DataRepresentation,
            6 => SectionKind::Bitmap,
            7 => SectionKind::Data,
            _ => return None,
        })
    }

    pub fn has_template(self) -> bool {
        matches!(
            self,
            SectionKind::GridDefinition
                | SectionKind::ProductDefinition
                | SectionKind::DataRepresentation
        )
    }

    /// Short abbreviation used in reports (IS, IDS, LUS, GDS, PDS, DRS, BMS, DS).
    pub fn abbreviation(self) -> &'static str {
        match self {
            SectionKind::Indicator => "IS",
            SectionKind::Identification => "IDS",
            SectionKind::LocalUse => "LUS",
            SectionKind::GridDefinition => "GDS",
            SectionKind::ProductDefinition => "PDS",
            SectionKind::DataRepresentation => "DRS",
            SectionKind::Bitmap => "BMS",
            SectionKind::Data => "DS",
        }
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (section {})", self.abbreviation(), self.number())
    }
}

/// Absolute location of a section in its file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ByteSpan {
    pub offset: u64,
    pub length: u32,
}

impl ByteSpan {
    pub fn end(&self) -> u64 {
        self.offset + self.length as u64
    }
}

/// Decoded value of a single field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Unsigned(u64),
    Signed(i64),
    Float(f32),
    Bytes(Bytes),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Unsigned(v) => write!(f, "{v}"),
            FieldValue::Signed(v) => write!(f, "{v}"),
            FieldValue::Float(v) => write!(f, "{v}"),
            FieldValue::Bytes(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

/// Decoded fields in wire order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields {
    entries: Vec<(Cow<'static, str>, FieldValue)>,
}

impl Fields {
    pub(crate) fn push(&mut self, name: Cow<'static, str>, value: FieldValue) {
        self.entries.push((name, value));
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn get_uint(&self, name: &str) -> Option<u64> {
        match self.get(name)? {
            FieldValue::Unsigned(v) => Some(*v),
            FieldValue::Signed(v) if *v >= 0 => Some(*v as u64),
            _ => None,
        }
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        match self.get(name)? {
            FieldValue::Signed(v) => Some(*v),
            FieldValue::Unsigned(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn get_float(&self, name: &str) -> Option<f32> {
        match self.get(name)? {
            FieldValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn get_bytes(&self, name: &str) -> Option<&Bytes> {
        match self.get(name)? {
            FieldValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn uint(&self, name: &str) -> Result<u64> {
        self.get_uint(name)
            .ok_or_else(|| Grib2Error::invalid_field(name, "missing or not an unsigned integer"))
    }

    pub fn int(&self, name: &str) -> Result<i64> {
        self.get_int(name)
            .ok_or_else(|| Grib2Error::invalid_field(name, "missing or not an integer"))
    }

    pub fn float(&self, name: &str) -> Result<f32> {
        self.get_float(name)
            .ok_or_else(|| Grib2Error::invalid_field(name, "missing or not a float"))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.entries.iter().map(|(n, v)| (n.as_ref(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A decoded section. Immutable once decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    kind: SectionKind,
    template: Option<u16>,
    span: ByteSpan,
    fields: Fields,
    raw: Bytes,
}

impl Section {
    pub fn kind(&self) -> SectionKind {
        self.kind
    }

    /// Template number for sections 3, 4 and 5.
    pub fn template(&self) -> Option<u16> {
        self.template
    }

    pub fn span(&self) -> ByteSpan {
        self.span
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    /// The section bytes exactly as read, length prefix included.
    pub fn raw(&self) -> &Bytes {
        &self.raw
    }

    /// Decode a section from its raw bytes, as stored in an index.
    pub fn from_raw(kind: SectionKind, raw: Bytes, offset: u64) -> Result<Self> {
        let length = raw.len() as u64;
        let mut cursor = BinaryCursor::with_base(raw, offset);
        let section = decode_section(&mut cursor, kind)?;
        if section.span.length as u64 != length {
            return Err(Grib2Error::SectionLengthMismatch {
                kind,
                offset,
                declared: section.span.length as u64,
                consumed: length,
            });
        }
        Ok(section)
    }
}

/// Number of the section starting at the cursor, `None` at the end marker.
pub fn peek_section_number(cursor: &BinaryCursor) -> Result<Option<u8>> {
    if cursor.peek(4)? == END_MARKER {
        return Ok(None);
    }
    Ok(Some(cursor.peek(5)?[4]))
}

/// Decode the section of kind `expected` starting at the cursor and leave
/// the cursor at the end of the section.
pub fn decode_section(cursor: &mut BinaryCursor, expected: SectionKind) -> Result<Section> {
    if expected == SectionKind::Indicator {
        return decode_indicator(cursor);
    }

    let start = cursor.position();
    let header = cursor.peek(5)?;
    let declared = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as u64;
    let found = header[4];
    if found != expected.number() {
        return Err(Grib2Error::UnexpectedSection {
            expected,
            found,
            offset: start,
        });
    }
    if declared < 5 {
        return Err(Grib2Error::SectionLengthMismatch {
            kind: expected,
            offset: start,
            declared,
            consumed: 5,
        });
    }

    let raw = cursor.read_bytes(declared as usize)?;
    // Metadata sections are copied so they do not pin the message buffer;
    // the data section stays a view into it.
    let raw = if expected == SectionKind::Data {
        raw
    } else {
        Bytes::copy_from_slice(&raw)
    };

    let mut body = BinaryCursor::with_base(raw.clone(), start);
    body.skip(5)?;
    let mut fields = Fields::default();
    let template = decode_body(&mut body, expected, &mut fields).map_err(|e| match e {
        Grib2Error::OutOfBounds {
            offset, requested, ..
        } => Grib2Error::SectionLengthMismatch {
            kind: expected,
            offset: start,
            declared,
            consumed: offset + requested - start,
        },
        other => other,
    })?;

    let consumed = body.position() - start;
    if consumed != declared {
        return Err(Grib2Error::SectionLengthMismatch {
            kind: expected,
            offset: start,
            declared,
            consumed,
        });
    }

    Ok(Section {
        kind: expected,
        template,
        span: ByteSpan {
            offset: start,
            length: declared as u32,
        },
        fields,
        raw,
    })
}

fn decode_indicator(cursor: &mut BinaryCursor) -> Result<Section> {
    let start = cursor.position();
    let head = cursor.peek(8)?;
    if &head[..4] != b"GRIB" {
        return Err(Grib2Error::corrupt(start, "missing GRIB marker"));
    }
    // octet 8 holds the edition in every GRIB edition
    let edition = head[7];
    if edition != 2 {
        return Err(Grib2Error::UnsupportedEdition {
            offset: start,
            edition,
        });
    }

    let raw = Bytes::copy_from_slice(&cursor.read_bytes(INDICATOR_LENGTH)?);
    let mut body = BinaryCursor::with_base(raw.clone(), start);
    let mut fields = Fields::default();
    layout::decode_fields(&mut body, templates::INDICATOR, &mut fields)?;

    Ok(Section {
        kind: SectionKind::Indicator,
        template: None,
        span: ByteSpan {
            offset: start,
            length: INDICATOR_LENGTH as u32,
        },
        fields,
        raw,
    })
}

fn decode_body(
    body: &mut BinaryCursor,
    kind: SectionKind,
    fields: &mut Fields,
) -> Result<Option<u16>> {
    match kind {
        SectionKind::Indicator => Err(Grib2Error::invalid_field(
            "kind",
            "the indicator has no section header",
        )),
        SectionKind::Identification => {
            layout::decode_fields(body, templates::IDENTIFICATION, fields)?;
            if body.remaining() > 0 {
                layout::decode_fields(body, templates::IDENTIFICATION_RESERVED, fields)?;
            }
            Ok(None)
        }
        SectionKind::LocalUse => {
            layout::decode_fields(body, templates::LOCAL_USE, fields)?;
            Ok(None)
        }
        SectionKind::Bitmap => {
            layout::decode_fields(body, templates::BITMAP, fields)?;
            Ok(None)
        }
        SectionKind::Data => {
            layout::decode_fields(body, templates::DATA, fields)?;
            Ok(None)
        }
        SectionKind::GridDefinition
        | SectionKind::ProductDefinition
        | SectionKind::DataRepresentation => {
            layout::decode_fields(body, templates::header(kind), fields)?;
            let number = fields.uint("template")? as u16;
            let template = templates::lookup(kind, number).ok_or(
                Grib2Error::UnsupportedTemplate {
                    kind,
                    template: number,
                },
            )?;
            for part in template.parts {
                layout::decode_fields(body, part, fields)?;
            }
            let trailer = templates::trailer(kind, fields);
            layout::decode_fields(body, trailer, fields)?;
            Ok(Some(number))
        }
    }
}

/// Encode a section from its decoded fields through the same layout tables.
///
/// `decode_section` followed by `encode_section` reproduces the input bytes;
/// the only normalisation is that a sign-magnitude negative zero is written
/// back as positive zero.
pub fn encode_section(section: &Section) -> Result<Vec<u8>> {
    let fields = &section.fields;
    let mut out = Vec::with_capacity(section.raw.len());

    if section.kind == SectionKind::Indicator {
        layout::encode_fields(templates::INDICATOR, fields, &mut out)?;
        return Ok(out);
    }

    out.extend_from_slice(&[0, 0, 0, 0, section.kind.number()]);
    match section.kind {
        SectionKind::Identification => {
            layout::encode_fields(templates::IDENTIFICATION, fields, &mut out)?;
            if fields.get("reserved").is_some() {
                layout::encode_fields(templates::IDENTIFICATION_RESERVED, fields, &mut out)?;
            }
        }
        SectionKind::LocalUse => layout::encode_fields(templates::LOCAL_USE, fields, &mut out)?,
        SectionKind::Bitmap => layout::encode_fields(templates::BITMAP, fields, &mut out)?,
        SectionKind::Data => layout::encode_fields(templates::DATA, fields, &mut out)?,
        kind => {
            let number = fields.uint("template")? as u16;
            let template = templates::lookup(kind, number).ok_or(
                Grib2Error::UnsupportedTemplate {
                    kind,
                    template: number,
                },
            )?;
            layout::encode_fields(templates::header(kind), fields, &mut out)?;
            for part in template.parts {
                layout::encode_fields(part, fields, &mut out)?;
            }
            layout::encode_fields(templates::trailer(kind, fields), fields, &mut out)?;
        }
    }

    let length = u32::try_from(out.len())
        .map_err(|_| Grib2Error::invalid_field("length", "section exceeds 4 GiB"))?;
    out[..4].copy_from_slice(&length.to_be_bytes());
    Ok(out)
}
