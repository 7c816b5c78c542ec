//! Diagnostic reports over collections of GRIB2 files.
//!
//! [`ReportEngine::run`] visits each file through its index (or a fresh
//! scan), lets the pass for the requested [`ReportKind`] write text and
//! count into an explicit [`Counters`] accumulator, and returns both with
//! per-file error counts. A file that fails is noted and skipped; a raised
//! [`CancelFlag`] stops the run between records.

pub mod cancel;
pub mod counters;
pub mod engine;
pub mod error;
pub mod reports;

pub use cancel::CancelFlag;
pub use counters::{Counter, CounterKey, Counters};
pub use engine::{
    sidecar_path, FileOutcome, PackingConvention, Report, ReportEngine, ReportKind, ReportOptions,
    DEFAULT_INDEX_SUFFIX,
};
pub use error::{ReportError, Result};
