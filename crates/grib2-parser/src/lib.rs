//! GRIB2 parser implementation (WMO FM 92 GRIB Edition 2).
//!
//! Decoding is byte-addressed and template driven: [`sections`] decodes a
//! section through a static layout registry, [`scanner::RecordScanner`]
//! walks the messages of a file and yields one [`Record`] per product,
//! [`coordinates`] derives forecast times and levels, and [`unpacking`]
//! turns packed data into values on demand.

pub mod coordinates;
pub mod cursor;
pub mod error;
pub mod record;
pub mod scanner;
pub mod sections;
pub mod source;
pub mod tables;
pub mod unpacking;

pub use coordinates::{
    Anomaly, CoordinateExtractor, ExtractorOptions, Extracted, ForecastTime, LevelScalePolicy,
    TimeUnit, VerticalLevel,
};
pub use cursor::BinaryCursor;
pub use error::{Grib2Error, Result};
pub use record::{ProductRecord, Record};
pub use scanner::{is_valid_file, RecordScanner, ScanState, ScanStats};
pub use sections::{decode_section, encode_section, ByteSpan, Section, SectionKind};
pub use source::{ByteSource, FileSource, MemorySource};
pub use tables::Grib2Tables;
pub use unpacking::{unpack, ImageDecoder, UnpackOptions, UnpackedGrid};
