//! JSON sidecar persistence.
//!
//! The sidecar holds, per source file, its stat, its grid definitions and
//! its records as raw section bytes (base64) with their offsets. Loading
//! re-decodes the sections, so a fresh sidecar never touches the data files.

use crate::error::{IndexError, Result};
use crate::hash::GdsHash;
use crate::model::{FileIndex, FileStats, IndexedRecord, SourceFile};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use grib2_parser::{ByteSpan, Section, SectionKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Bumped whenever the layout below changes; other versions are ignored.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Sidecar {
    version: u32,
    written: DateTime<Utc>,
    files: Vec<FileEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct FileEntry {
    source: SourceFile,
    stats: FileStats,
    grids: Vec<GridEntry>,
    records: Vec<RecordEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GridEntry {
    hash: GdsHash,
    section: RawSection,
}

#[derive(Debug, Serialize, Deserialize)]
struct RawSection {
    offset: u64,
    raw: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct RecordEntry {
    start_offset: u64,
    message_length: u64,
    repeat: u32,
    gds_hash: GdsHash,
    indicator: RawSection,
    identification: RawSection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    local_use: Option<RawSection>,
    product_definition: RawSection,
    data_representation: RawSection,
    bitmap_indicator: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    bitmap: Option<ByteSpan>,
    data: ByteSpan,
}

impl RawSection {
    fn encode(section: &Section) -> Self {
        Self {
            offset: section.span().offset,
            raw: STANDARD.encode(section.raw()),
        }
    }

    fn decode(&self, kind: SectionKind) -> Result<Section> {
        let raw = Bytes::from(STANDARD.decode(&self.raw)?);
        Ok(Section::from_raw(kind, raw, self.offset)?)
    }
}

impl RecordEntry {
    fn encode(record: &IndexedRecord) -> Self {
        Self {
            start_offset: record.start_offset,
            message_length: record.message_length,
            repeat: record.repeat,
            gds_hash: record.gds_hash,
            indicator: RawSection::encode(&record.indicator),
            identification: RawSection::encode(&record.identification),
            local_use: record.local_use.as_ref().map(RawSection::encode),
            product_definition: RawSection::encode(&record.product_definition),
            data_representation: RawSection::encode(&record.data_representation),
            bitmap_indicator: record.bitmap_indicator,
            bitmap: record.bitmap,
            data: record.data,
        }
    }

    fn decode(&self) -> Result<IndexedRecord> {
        Ok(IndexedRecord {
            start_offset: self.start_offset,
            message_length: self.message_length,
            repeat: self.repeat,
            gds_hash: self.gds_hash,
            indicator: self.indicator.decode(SectionKind::Indicator)?,
            identification: self.identification.decode(SectionKind::Identification)?,
            local_use: self
                .local_use
                .as_ref()
                .map(|s| s.decode(SectionKind::LocalUse))
                .transpose()?,
            product_definition: self.product_definition.decode(SectionKind::ProductDefinition)?,
            data_representation: self
                .data_representation
                .decode(SectionKind::DataRepresentation)?,
            bitmap_indicator: self.bitmap_indicator,
            bitmap: self.bitmap,
            data: self.data,
        })
    }
}

impl FileEntry {
    fn encode(file: &FileIndex) -> Self {
        Self {
            source: file.source.clone(),
            stats: file.stats,
            grids: file
                .grids
                .iter()
                .map(|(hash, section)| GridEntry {
                    hash: *hash,
                    section: RawSection::encode(section),
                })
                .collect(),
            records: file.records.iter().map(RecordEntry::encode).collect(),
        }
    }

    fn decode(&self) -> Result<FileIndex> {
        let mut grids = BTreeMap::new();
        for entry in &self.grids {
            let section = entry.section.decode(SectionKind::GridDefinition)?;
            if GdsHash::of(section.raw()) != entry.hash {
                return Err(IndexError::HashCollision { hash: entry.hash });
            }
            grids.insert(entry.hash, section);
        }
        let records = self
            .records
            .iter()
            .map(RecordEntry::decode)
            .collect::<Result<Vec<_>>>()?;
        Ok(FileIndex {
            source: self.source.clone(),
            stats: self.stats,
            grids,
            records,
        })
    }
}

/// Read a sidecar. A missing, unreadable or other-version sidecar is
/// reported as `None`.
pub fn load(path: &Path) -> Option<Vec<FileIndex>> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cannot read index sidecar");
            return None;
        }
    };

    let sidecar: Sidecar = match serde_json::from_str(&text) {
        Ok(sidecar) => sidecar,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring malformed index sidecar");
            return None;
        }
    };
    if sidecar.version != FORMAT_VERSION {
        warn!(
            path = %path.display(),
            version = sidecar.version,
            expected = FORMAT_VERSION,
            "ignoring index sidecar of another version"
        );
        return None;
    }

    match sidecar
        .files
        .iter()
        .map(FileEntry::decode)
        .collect::<Result<Vec<_>>>()
    {
        Ok(files) => Some(files),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring undecodable index sidecar");
            None
        }
    }
}

/// Write a sidecar through a temporary file renamed over `path`, so a
/// reader never sees a partial file and a failure leaves the old one.
pub fn save(path: &Path, files: &[Arc<FileIndex>]) -> Result<()> {
    let persist_error = |reason: String| IndexError::Persist {
        path: path.to_path_buf(),
        reason,
    };

    let sidecar = Sidecar {
        version: FORMAT_VERSION,
        written: Utc::now(),
        files: files.iter().map(|f| FileEntry::encode(f)).collect(),
    };
    let json = serde_json::to_vec_pretty(&sidecar)?;

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(|e| persist_error(e.to_string()))?;
    temp.write_all(&json)
        .and_then(|_| temp.as_file().sync_all())
        .map_err(|e| persist_error(e.to_string()))?;
    temp.persist(path)
        .map_err(|e| persist_error(e.error.to_string()))?;

    info!(path = %path.display(), files = files.len(), "wrote index sidecar");
    Ok(())
}
