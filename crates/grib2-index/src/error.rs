//! Error types for collection indexing.

use crate::hash::GdsHash;
use grib2_parser::Grib2Error;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexError {
    /// Scanning stopped on an I/O failure.
    #[error("failed to scan {path}: {source}")]
    Scan { path: PathBuf, source: Grib2Error },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The sidecar could not be written; the previous one is unchanged.
    #[error("failed to persist index to {path}: {reason}")]
    Persist { path: PathBuf, reason: String },

    #[error("rebuilding the stale index of {path} failed: {source}")]
    StaleIndexRebuildFailure {
        path: PathBuf,
        source: Box<IndexError>,
    },

    /// Two different grid definitions share a truncated hash.
    #[error("grid definition hash collision on {hash}")]
    HashCollision { hash: GdsHash },

    /// The data file no longer matches the index entry used to read it.
    #[error("{path} changed since it was indexed")]
    SourceChanged { path: PathBuf },

    #[error("record refers to unknown grid definition {hash}")]
    UnknownGrid { hash: GdsHash },

    #[error(transparent)]
    Decode(#[from] Grib2Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("base64 error: {0}")]
    Base64(#[from] base64::DecodeError),
}

impl IndexError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, IndexError>;
