//! In-memory index model.

use crate::error::{IndexError, Result};
use crate::hash::GdsHash;
use chrono::{DateTime, Utc};
use grib2_parser::sections::GridDefinitionView;
use grib2_parser::{ByteSpan, ProductRecord, Record, Section};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Identity of an indexed file; a file whose stat differs is stale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub path: PathBuf,
    pub length: u64,
    pub modified: DateTime<Utc>,
}

impl SourceFile {
    pub fn stat(path: &Path) -> Result<Self> {
        let metadata = std::fs::metadata(path).map_err(|e| IndexError::io(path, e))?;
        let modified = metadata.modified().map_err(|e| IndexError::io(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            length: metadata.len(),
            modified: modified.into(),
        })
    }

    /// Whether the file on disk still has the recorded length and mtime.
    pub fn is_fresh(&self) -> bool {
        Self::stat(&self.path).map_or(false, |now| now == *self)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStats {
    pub messages: u64,
    pub records: u64,
    /// Messages that could not be decoded.
    pub errors: u64,
}

/// One record of the index: metadata sections kept in memory, the bitmap
/// and data left in the file and addressed by span.
#[derive(Debug, Clone)]
pub struct IndexedRecord {
    pub start_offset: u64,
    pub message_length: u64,
    pub repeat: u32,
    pub gds_hash: GdsHash,
    pub indicator: Section,
    pub identification: Section,
    pub local_use: Option<Section>,
    pub product_definition: Section,
    pub data_representation: Section,
    pub bitmap_indicator: u8,
    /// Bitmap section that applies, after resolving indicator 254.
    pub bitmap: Option<ByteSpan>,
    pub data: ByteSpan,
}

impl IndexedRecord {
    pub(crate) fn from_record(record: Record, gds_hash: GdsHash) -> Self {
        Self {
            start_offset: record.start_offset,
            message_length: record.message_length,
            repeat: record.repeat,
            gds_hash,
            indicator: record.indicator,
            identification: record.identification,
            local_use: record.local_use,
            product_definition: record.product_definition,
            data_representation: record.data_representation,
            bitmap_indicator: record.bitmap_indicator,
            bitmap: record.bitmap.map(|b| b.span()),
            data: record.data_span,
        }
    }
}

impl ProductRecord for IndexedRecord {
    fn indicator(&self) -> &Section {
        &self.indicator
    }

    fn identification(&self) -> &Section {
        &self.identification
    }

    fn product_definition(&self) -> &Section {
        &self.product_definition
    }

    fn data_representation(&self) -> &Section {
        &self.data_representation
    }
}

/// Index of one file with its own grid definition table.
#[derive(Debug, Clone)]
pub struct FileIndex {
    pub source: SourceFile,
    pub stats: FileStats,
    pub grids: BTreeMap<GdsHash, Section>,
    pub records: Vec<IndexedRecord>,
}

impl FileIndex {
    pub fn grid(&self, hash: GdsHash) -> Option<&Section> {
        self.grids.get(&hash)
    }

    /// Number of grid definition sections in the file, repeats included.
    ///
    /// Records of one message share their GDS unless the message redefines it.
    pub fn gds_count(&self) -> usize {
        let mut count = 0;
        let mut previous: Option<(u64, GdsHash)> = None;
        for record in &self.records {
            let key = (record.start_offset, record.gds_hash);
            if previous != Some(key) {
                count += 1;
            }
            previous = Some(key);
        }
        count
    }

    pub fn shape(&self, record: &IndexedRecord) -> Result<(usize, usize)> {
        let grid = self
            .grid(record.gds_hash)
            .ok_or(IndexError::UnknownGrid {
                hash: record.gds_hash,
            })?;
        Ok(GridDefinitionView::new(grid).shape()?)
    }
}

/// Index of a collection of files sharing one grid definition arena.
#[derive(Debug, Clone, Default)]
pub struct CollectionIndex {
    files: Vec<Arc<FileIndex>>,
    grids: HashMap<GdsHash, Section>,
}

impl CollectionIndex {
    /// Merge per-file indexes, interning every grid definition by hash.
    pub fn from_files(files: Vec<Arc<FileIndex>>) -> Result<Self> {
        let mut grids: HashMap<GdsHash, Section> = HashMap::new();
        for file in &files {
            for (hash, section) in &file.grids {
                match grids.entry(*hash) {
                    Entry::Occupied(existing) => {
                        if existing.get().raw() != section.raw() {
                            return Err(IndexError::HashCollision { hash: *hash });
                        }
                    }
                    Entry::Vacant(slot) => {
                        slot.insert(section.clone());
                    }
                }
            }
        }
        Ok(Self { files, grids })
    }

    pub fn files(&self) -> &[Arc<FileIndex>] {
        &self.files
    }

    pub fn file(&self, path: &Path) -> Option<&Arc<FileIndex>> {
        self.files.iter().find(|f| f.source.path == path)
    }

    pub fn grid(&self, hash: GdsHash) -> Option<&Section> {
        self.grids.get(&hash)
    }

    /// Number of distinct grid definitions in the collection.
    pub fn unique_grid_count(&self) -> usize {
        self.grids.len()
    }

    pub fn record_count(&self) -> usize {
        self.files.iter().map(|f| f.records.len()).sum()
    }

    /// Every record together with the file it belongs to.
    pub fn records(&self) -> impl Iterator<Item = (&FileIndex, &IndexedRecord)> {
        self.files
            .iter()
            .flat_map(|f| f.records.iter().map(move |r| (f.as_ref(), r)))
    }
}
