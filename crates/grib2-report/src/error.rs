//! Error types for report generation.

use grib2_index::IndexError;
use grib2_parser::Grib2Error;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    /// The cancellation flag was raised; the partial report is discarded.
    #[error("report cancelled")]
    Cancelled,

    #[error("unknown report kind: {0}")]
    UnknownKind(String),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Decode(#[from] Grib2Error),

    #[error("failed to format report: {0}")]
    Format(#[from] std::fmt::Error),
}

pub type Result<T> = std::result::Result<T, ReportError>;
