//! Error types for GRIB2 decoding.

use crate::sections::SectionKind;
use thiserror::Error;

/// Errors raised while reading, decoding or unpacking GRIB2 data.
///
/// Every variant except `Io` is local to one message: a scanner that
/// reports one of them resumes with the next message.
#[derive(Debug, Error)]
pub enum Grib2Error {
    #[error("read of {requested} bytes at offset {offset} exceeds end of data at {end}")]
    OutOfBounds { offset: u64, requested: u64, end: u64 },

    #[error("{kind} section at offset {offset} declares {declared} bytes but its fields use {consumed}")]
    SectionLengthMismatch {
        kind: SectionKind,
        offset: u64,
        declared: u64,
        consumed: u64,
    },

    #[error("unsupported {kind} template {template}")]
    UnsupportedTemplate { kind: SectionKind, template: u16 },

    #[error("expected {expected} section at offset {offset}, found section number {found}")]
    UnexpectedSection {
        expected: SectionKind,
        found: u8,
        offset: u64,
    },

    #[error("corrupt record at offset {offset}: {reason}")]
    CorruptRecord { offset: u64, reason: String },

    #[error("unsupported GRIB edition {edition} at offset {offset}")]
    UnsupportedEdition { offset: u64, edition: u8 },

    #[error("unsupported packing width of {bits} bits")]
    UnsupportedPackingWidth { bits: u8 },

    #[error("packed data holds {available} bits, {needed} required")]
    TruncatedData { needed: u64, available: u64 },

    #[error("invalid field '{field}': {reason}")]
    InvalidField { field: String, reason: String },

    #[error("no {0} decoder configured")]
    CodecUnavailable(&'static str),

    #[error("{codec} decoding failed: {reason}")]
    Codec { codec: &'static str, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Grib2Error {
    pub fn corrupt(offset: u64, reason: impl Into<String>) -> Self {
        Self::CorruptRecord {
            offset,
            reason: reason.into(),
        }
    }

    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn codec(codec: &'static str, reason: impl Into<String>) -> Self {
        Self::Codec {
            codec,
            reason: reason.into(),
        }
    }

    /// True for failures of the underlying byte source rather than of one message.
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}

pub type Result<T> = std::result::Result<T, Grib2Error>;
