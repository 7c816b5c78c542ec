//! Building indexes by scanning files.

use crate::error::{IndexError, Result};
use crate::hash::GdsHash;
use crate::model::{CollectionIndex, FileIndex, FileStats, IndexedRecord, SourceFile};
use grib2_parser::{RecordScanner, Section};
use rayon::prelude::*;
use std::collections::btree_map::{BTreeMap, Entry};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Scan one file into its own index.
///
/// Undecodable messages are counted and skipped; only an I/O failure stops
/// the scan.
pub fn index_file(path: &Path) -> Result<FileIndex> {
    let source = SourceFile::stat(path)?;
    let scanner = RecordScanner::open(path, 0).map_err(|e| IndexError::Scan {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut grids: BTreeMap<GdsHash, Section> = BTreeMap::new();
    let mut records = Vec::new();
    let mut errors = 0u64;
    let mut messages = 0u64;
    let mut last_message = None;

    for result in scanner {
        let record = match result {
            Ok(record) => record,
            Err(e) if e.is_io() => {
                return Err(IndexError::Scan {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
            Err(e) => {
                debug!(path = %path.display(), error = %e, "skipping message");
                errors += 1;
                continue;
            }
        };

        if last_message != Some(record.start_offset) {
            messages += 1;
            last_message = Some(record.start_offset);
        }

        let hash = GdsHash::of(record.grid_definition.raw());
        match grids.entry(hash) {
            Entry::Occupied(existing) => {
                if existing.get().raw() != record.grid_definition.raw() {
                    return Err(IndexError::HashCollision { hash });
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(record.grid_definition.clone());
            }
        }
        records.push(IndexedRecord::from_record(record, hash));
    }

    info!(
        path = %path.display(),
        records = records.len(),
        grids = grids.len(),
        errors,
        "indexed file"
    );

    Ok(FileIndex {
        source,
        stats: FileStats {
            messages,
            records: records.len() as u64,
            errors,
        },
        grids,
        records,
    })
}

/// Scan every file in parallel and merge the results.
pub fn build_index(paths: &[PathBuf]) -> Result<CollectionIndex> {
    let files = paths
        .par_iter()
        .map(|p| index_file(p).map(Arc::new))
        .collect::<Result<Vec<_>>>()?;
    CollectionIndex::from_files(files)
}
