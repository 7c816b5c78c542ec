//! Lazy, forward-only scanner over the GRIB2 messages of a byte source.
//!
//! The scanner is an explicit state machine:
//!
//! ```text
//! Seeking --marker found--> Decoding --indicator ok--> Verifying --7777 ok--> Decoding sections
//!    ^                                                                          |
//!    +---------------------- records queued / error reported -------------------+
//! Seeking --source exhausted--> Done
//! ```
//!
//! A malformed message produces one error item and scanning resumes one
//! byte past the start of that message, so a damaged file still yields every
//! message that can be decoded.

use crate::cursor::BinaryCursor;
use crate::error::{Grib2Error, Result};
use crate::record::Record;
use crate::sections::{
    decode_section, BitmapView, IndicatorView, Section, SectionKind, END_MARKER,
    INDICATOR_LENGTH,
};
use crate::source::{ByteSource, FileSource};
use metrics::counter;
use std::collections::VecDeque;
use std::path::Path;
use tracing::{debug, warn};

const SEEK_CHUNK: usize = 64 * 1024;
const MARKER: &[u8; 4] = b"GRIB";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Seeking,
    Decoding,
    Verifying,
    Done,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub messages: u64,
    pub records: u64,
    pub errors: u64,
}

/// Iterator of records over one byte source.
pub struct RecordScanner<S> {
    source: S,
    file_index: u32,
    state: ScanState,
    offset: u64,
    pending: VecDeque<Record>,
    stats: ScanStats,
}

impl RecordScanner<FileSource> {
    /// Scan a file; the handle is released when the scanner is dropped.
    pub fn open(path: impl AsRef<Path>, file_index: u32) -> Result<Self> {
        Ok(Self::with_file_index(FileSource::open(path)?, file_index))
    }
}

impl<S: ByteSource> RecordScanner<S> {
    pub fn new(source: S) -> Self {
        Self::with_file_index(source, 0)
    }

    pub fn with_file_index(source: S, file_index: u32) -> Self {
        Self {
            source,
            file_index,
            state: ScanState::Seeking,
            offset: 0,
            pending: VecDeque::new(),
            stats: ScanStats::default(),
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn stats(&self) -> ScanStats {
        self.stats
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    fn seek_marker(&mut self) -> Result<Option<u64>> {
        let len = self.source.len();
        let mut offset = self.offset;
        while offset + 4 <= len {
            let chunk_len = (len - offset).min(SEEK_CHUNK as u64) as usize;
            let chunk = self.source.read_at(offset, chunk_len)?;
            if let Some(pos) = chunk.windows(4).position(|w| w == MARKER) {
                return Ok(Some(offset + pos as u64));
            }
            if offset + chunk_len as u64 >= len {
                break;
            }
            // keep three bytes of overlap so a marker split across chunks is found
            offset += (chunk_len - 3) as u64;
        }
        Ok(None)
    }

    fn read_message(&mut self, start: u64) -> Result<(Vec<Record>, u64)> {
        self.state = ScanState::Decoding;
        let len = self.source.len();
        let head_len = (len - start).min(INDICATOR_LENGTH as u64) as usize;
        let mut cursor = BinaryCursor::with_base(self.source.read_at(start, head_len)?, start);
        let indicator = decode_section(&mut cursor, SectionKind::Indicator)?;

        let total = IndicatorView::new(&indicator).total_length()?;
        if total < (INDICATOR_LENGTH + END_MARKER.len()) as u64 {
            return Err(Grib2Error::corrupt(
                start,
                format!("declared message length {total} is too small"),
            ));
        }
        if start.checked_add(total).map_or(true, |end| end > len) {
            return Err(Grib2Error::corrupt(
                start,
                format!("message length {total} runs past the end of the source ({len} bytes)"),
            ));
        }

        self.state = ScanState::Verifying;
        let end_marker = start + total - END_MARKER.len() as u64;
        if self.source.read_at(end_marker, END_MARKER.len())?.as_ref() != END_MARKER {
            return Err(Grib2Error::corrupt(
                start,
                format!("no 7777 end marker at offset {end_marker}"),
            ));
        }

        self.state = ScanState::Decoding;
        let body_start = start + INDICATOR_LENGTH as u64;
        let body = self
            .source
            .read_at(body_start, (end_marker - body_start) as usize)?;
        let mut cursor = BinaryCursor::with_base(body, body_start);
        let identification = decode_section(&mut cursor, SectionKind::Identification)?;

        let mut records = Vec::new();
        let mut local_use: Option<Section> = None;
        let mut grid: Option<Section> = None;
        let mut product: Option<Section> = None;
        let mut representation: Option<Section> = None;
        let mut bitmap: Option<Section> = None;
        let mut defined_bitmap: Option<Section> = None;
        let mut bitmap_indicator = 255u8;

        while cursor.remaining() > 0 {
            let offset = cursor.position();
            let number = cursor.peek(5)?[4];
            match SectionKind::from_number(number) {
                Some(SectionKind::LocalUse) => {
                    local_use = Some(decode_section(&mut cursor, SectionKind::LocalUse)?)
                }
                Some(SectionKind::GridDefinition) => {
                    grid = Some(decode_section(&mut cursor, SectionKind::GridDefinition)?)
                }
                Some(SectionKind::ProductDefinition) => {
                    product = Some(decode_section(&mut cursor, SectionKind::ProductDefinition)?)
                }
                Some(SectionKind::DataRepresentation) => {
                    representation =
                        Some(decode_section(&mut cursor, SectionKind::DataRepresentation)?)
                }
                Some(SectionKind::Bitmap) => {
                    let section = decode_section(&mut cursor, SectionKind::Bitmap)?;
                    bitmap_indicator = BitmapView::new(&section).indicator()?;
                    bitmap = match bitmap_indicator {
                        0 => {
                            defined_bitmap = Some(section.clone());
                            Some(section)
                        }
                        254 => Some(defined_bitmap.clone().ok_or_else(|| {
                            Grib2Error::corrupt(offset, "bitmap indicator 254 with no earlier bitmap")
                        })?),
                        255 => None,
                        _ => Some(section),
                    };
                }
                Some(SectionKind::Data) => {
                    let data = decode_section(&mut cursor, SectionKind::Data)?;
                    let (Some(grid), Some(product), Some(representation)) =
                        (&grid, &product, &representation)
                    else {
                        return Err(Grib2Error::corrupt(
                            offset,
                            "data section before its grid, product and data representation sections",
                        ));
                    };
                    records.push(Record {
                        file_index: self.file_index,
                        start_offset: start,
                        message_length: total,
                        repeat: records.len() as u32,
                        indicator: indicator.clone(),
                        identification: identification.clone(),
                        local_use: local_use.clone(),
                        grid_definition: grid.clone(),
                        product_definition: product.clone(),
                        data_representation: representation.clone(),
                        bitmap_indicator,
                        bitmap: bitmap.clone(),
                        data_span: data.span(),
                        data: data.raw().slice(5..),
                    });
                }
                _ => {
                    return Err(Grib2Error::corrupt(
                        offset,
                        format!("unexpected section number {number}"),
                    ))
                }
            }
        }

        if records.is_empty() {
            return Err(Grib2Error::corrupt(start, "message has no data section"));
        }
        Ok((records, total))
    }
}

impl<S: ByteSource> Iterator for RecordScanner<S> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.pending.pop_front() {
                return Some(Ok(record));
            }
            if self.state == ScanState::Done {
                return None;
            }

            self.state = ScanState::Seeking;
            let start = match self.seek_marker() {
                Ok(Some(start)) => start,
                Ok(None) => {
                    self.state = ScanState::Done;
                    return None;
                }
                Err(e) => {
                    self.state = ScanState::Done;
                    return Some(Err(e));
                }
            };

            match self.read_message(start) {
                Ok((records, length)) => {
                    debug!(
                        offset = start,
                        length,
                        records = records.len(),
                        "decoded GRIB2 message"
                    );
                    self.stats.messages += 1;
                    self.stats.records += records.len() as u64;
                    counter!("grib2_records_scanned_total").increment(records.len() as u64);
                    self.offset = start + length;
                    self.state = ScanState::Seeking;
                    self.pending.extend(records);
                }
                Err(e) => {
                    self.stats.errors += 1;
                    counter!("grib2_corrupt_messages_total").increment(1);
                    if e.is_io() {
                        self.state = ScanState::Done;
                    } else {
                        self.offset = start + 1;
                        self.state = ScanState::Seeking;
                    }
                    warn!(offset = start, error = %e, "skipping undecodable GRIB message");
                    return Some(Err(e));
                }
            }
        }
    }
}

/// Whether the first bytes of `source` contain a GRIB2 indicator.
pub fn is_valid_file<S: ByteSource>(source: &mut S) -> bool {
    let len = source.len().min(SEEK_CHUNK as u64) as usize;
    if len < INDICATOR_LENGTH {
        return false;
    }
    let Ok(head) = source.read_at(0, len) else {
        return false;
    };
    head.windows(8)
        .any(|w| &w[..4] == MARKER && w[7] == 2)
}
