//! Reading data of indexed records back from their files.

use crate::error::{IndexError, Result};
use crate::model::{FileIndex, IndexedRecord};
use grib2_parser::{unpacking, ByteSource, FileSource, Section, SectionKind, UnpackOptions, UnpackedGrid};
use rayon::prelude::*;
use tracing::debug;

const SECTION_HEADER: usize = 5;

/// Unpacks records through their index, reading only the bitmap and data
/// sections from disk.
#[derive(Debug, Clone, Default)]
pub struct DataReader {
    options: UnpackOptions,
}

impl DataReader {
    pub fn new(options: UnpackOptions) -> Self {
        Self { options }
    }

    pub fn read_grid(&self, file: &FileIndex, record: &IndexedRecord) -> Result<UnpackedGrid> {
        let path = &file.source.path;
        if !file.source.is_fresh() {
            return Err(IndexError::SourceChanged { path: path.clone() });
        }

        let mut source = FileSource::open(path).map_err(|e| IndexError::Scan {
            path: path.clone(),
            source: e,
        })?;

        let bitmap = match record.bitmap {
            Some(span) => {
                let raw = source.read_at(span.offset, span.length as usize)?;
                Some(Section::from_raw(SectionKind::Bitmap, raw, span.offset)?)
            }
            None => None,
        };

        let data = source.read_at(record.data.offset, record.data.length as usize)?;
        let body = data.get(SECTION_HEADER..).unwrap_or_default();

        debug!(
            path = %path.display(),
            offset = record.start_offset,
            repeat = record.repeat,
            bytes = body.len(),
            "unpacking record"
        );

        Ok(unpacking::unpack(
            &record.data_representation,
            bitmap.as_ref(),
            body,
            file.shape(record)?,
            &self.options,
        )?)
    }

    /// Unpack several records of one file in parallel, keeping their order.
    pub fn read_many(&self, file: &FileIndex, records: &[&IndexedRecord]) -> Result<Vec<UnpackedGrid>> {
        records
            .par_iter()
            .map(|record| self.read_grid(file, record))
            .collect()
    }
}
