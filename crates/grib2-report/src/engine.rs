//! Report engine: runs one report pass over a list of files.

use crate::cancel::CancelFlag;
use crate::counters::Counters;
use crate::error::{ReportError, Result};
use crate::reports::{self, FileContext};
use grib2_index::{index_file, persist, DataReader, FileIndex, IndexOptions, Indexer};
use grib2_parser::{CoordinateExtractor, ExtractorOptions, Grib2Tables};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write as _};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Suffix appended to a data file name to form its index sidecar.
pub const DEFAULT_INDEX_SUFFIX: &str = ".idx.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReportKind {
    #[serde(rename = "gribIndex")]
    GribIndex,
    #[serde(rename = "uniqueTemplates")]
    UniqueTemplates,
    #[serde(rename = "duplicatePds")]
    DuplicatePds,
    #[serde(rename = "drsSummary")]
    DrsSummary,
    #[serde(rename = "gdsSummary")]
    GdsSummary,
    #[serde(rename = "pdsSummary")]
    PdsSummary,
    #[serde(rename = "pdsProblems")]
    PdsProblems,
    #[serde(rename = "idProblems")]
    IdProblems,
    #[serde(rename = "timeCoord")]
    TimeCoord,
    #[serde(rename = "localUseSection")]
    LocalUseSection,
    #[serde(rename = "checkTables")]
    CheckTables,
    #[serde(rename = "packingAnalysis")]
    PackingAnalysis,
}

impl ReportKind {
    pub const ALL: [ReportKind; 12] = [
        ReportKind::GribIndex,
        ReportKind::UniqueTemplates,
        ReportKind::DuplicatePds,
        ReportKind::DrsSummary,
        ReportKind::GdsSummary,
        ReportKind::PdsSummary,
        ReportKind::PdsProblems,
        ReportKind::IdProblems,
        ReportKind::TimeCoord,
        ReportKind::LocalUseSection,
        ReportKind::CheckTables,
        ReportKind::PackingAnalysis,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ReportKind::GribIndex => "gribIndex",
            ReportKind::UniqueTemplates => "uniqueTemplates",
            ReportKind::DuplicatePds => "duplicatePds",
            ReportKind::DrsSummary => "drsSummary",
            ReportKind::GdsSummary => "gdsSummary",
            ReportKind::PdsSummary => "pdsSummary",
            ReportKind::PdsProblems => "pdsProblems",
            ReportKind::IdProblems => "idProblems",
            ReportKind::TimeCoord => "timeCoord",
            ReportKind::LocalUseSection => "localUseSection",
            ReportKind::CheckTables => "checkTables",
            ReportKind::PackingAnalysis => "packingAnalysis",
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ReportKind {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ReportError::UnknownKind(s.to_string()))
    }
}

/// How the packing analysis derives netCDF-style `scale_factor` and
/// `add_offset` for an n-bit packed type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackingConvention {
    /// Signed packed values over the full range.
    Signed,
    /// Unsigned packed values over the full range.
    Unsigned,
    /// Signed, reserving the minimum packed value for missing data.
    SignedReserved,
    /// Unsigned, reserving 0 for missing data.
    #[default]
    UnsignedReserved,
}

impl PackingConvention {
    /// `(scale_factor, add_offset)` for data in `[min, max]` packed into
    /// `nbits` bits, or `None` when the convention leaves no usable range.
    pub fn scale_offset(self, min: f64, max: f64, nbits: u8) -> Option<(f64, f64)> {
        if nbits == 0 || nbits > 32 {
            return None;
        }
        let levels = 2f64.powi(nbits as i32);
        let divisor = match self {
            PackingConvention::Signed | PackingConvention::Unsigned => levels - 1.0,
            PackingConvention::SignedReserved | PackingConvention::UnsignedReserved => levels - 2.0,
        };
        if divisor <= 0.0 {
            return None;
        }
        let scale = (max - min) / divisor;
        let offset = match self {
            PackingConvention::Signed => min + (levels / 2.0) * scale,
            PackingConvention::Unsigned => min,
            PackingConvention::SignedReserved => (max + min) / 2.0,
            PackingConvention::UnsignedReserved => min - scale,
        };
        Some((scale, offset))
    }
}

impl FromStr for PackingConvention {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "signed" => Ok(Self::Signed),
            "unsigned" => Ok(Self::Unsigned),
            "signed_reserved" => Ok(Self::SignedReserved),
            "unsigned_reserved" => Ok(Self::UnsignedReserved),
            other => Err(format!("unknown packing convention '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportOptions {
    /// Read records through a per-file index sidecar instead of scanning.
    pub use_index: bool,
    /// Show and reset the counters after each file.
    pub each_file: bool,
    /// Include the more expensive or verbose checks.
    pub extra: bool,
    pub extractor: ExtractorOptions,
    pub packing: PackingConvention,
    pub index_suffix: String,
    #[serde(skip)]
    pub cancel: CancelFlag,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            use_index: true,
            each_file: false,
            extra: false,
            extractor: ExtractorOptions::default(),
            packing: PackingConvention::default(),
            index_suffix: DEFAULT_INDEX_SUFFIX.to_string(),
            cancel: CancelFlag::default(),
        }
    }
}

/// Result of one file within a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub records: usize,
    /// Undecodable messages plus records or passes that failed.
    pub errors: u64,
    /// Set when the file could not be processed at all.
    pub failure: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub kind: ReportKind,
    pub text: String,
    pub counters: Counters,
    pub files: Vec<FileOutcome>,
}

impl Report {
    pub fn error_count(&self) -> u64 {
        self.files.iter().map(|f| f.errors).sum()
    }
}

/// Runs report passes. Holds the indexer and its result cache, so one engine reused
/// across runs rescans a file only when it changed.
#[derive(Debug)]
pub struct ReportEngine {
    indexer: Indexer,
    reader: DataReader,
    tables: Grib2Tables,
}

impl Default for ReportEngine {
    fn default() -> Self {
        Self::new(IndexOptions::default())
    }
}

impl ReportEngine {
    pub fn new(index_options: IndexOptions) -> Self {
        Self {
            indexer: Indexer::new(index_options),
            reader: DataReader::default(),
            tables: Grib2Tables::standard(),
        }
    }

    pub fn with_reader(mut self, reader: DataReader) -> Self {
        self.reader = reader;
        self
    }

    pub fn with_tables(mut self, tables: Grib2Tables) -> Self {
        self.tables = tables;
        self
    }

    pub fn indexer(&self) -> &Indexer {
        &self.indexer
    }

    /// Run `kind` over `files`, accumulating into `counters`.
    ///
    /// A file that cannot be read or fails its pass is noted in the text and
    /// in its [`FileOutcome`]; the run continues with the next file. Only
    /// cancellation aborts the run.
    pub fn run(
        &self,
        kind: ReportKind,
        files: &[PathBuf],
        options: &ReportOptions,
        mut counters: Counters,
    ) -> Result<Report> {
        let extractor = CoordinateExtractor::new(options.extractor.clone());
        let mut pass = reports::pass_for(kind);
        pass.declare(&mut counters);

        let mut text = String::new();
        writeln!(text, "{}", pass.title())?;
        let mut outcomes = Vec::with_capacity(files.len());

        for path in files {
            options.cancel.check()?;
            writeln!(text, "------- {}", path.display())?;
            counter!("grib2_report_files_total").increment(1);

            let index = match self.load(path, options) {
                Ok(index) => index,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "cannot open file for report");
                    writeln!(text, "  **Cant open {}: {e}", path.display())?;
                    outcomes.push(FileOutcome {
                        path: path.clone(),
                        records: 0,
                        errors: 1,
                        failure: Some(e.to_string()),
                    });
                    continue;
                }
            };

            let mut ctx = FileContext::new(path, &index, options, &extractor, &self.reader, &self.tables);
            let result = pass.file(&mut ctx, &mut text, &mut counters);
            let mut outcome = FileOutcome {
                path: path.clone(),
                records: index.records.len(),
                errors: index.stats.errors + ctx.errors(),
                failure: None,
            };
            match result {
                Ok(()) => {}
                Err(ReportError::Cancelled) => return Err(ReportError::Cancelled),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "report pass failed");
                    writeln!(text, "  failed: {e}")?;
                    outcome.errors += 1;
                    outcome.failure = Some(e.to_string());
                }
            }
            if outcome.errors > 0 {
                writeln!(text, "  errors = {}", outcome.errors)?;
            }
            outcomes.push(outcome);

            if options.each_file {
                counters.show(&mut text)?;
                writeln!(text)?;
                counters.reset();
            }
        }

        pass.finish(&mut text, &mut counters)?;
        if !options.each_file {
            counters.show(&mut text)?;
        }

        let report = Report {
            kind,
            text,
            counters,
            files: outcomes,
        };
        info!(
            kind = %kind,
            files = files.len(),
            errors = report.error_count(),
            "report finished"
        );
        Ok(report)
    }

    fn load(&self, path: &Path, options: &ReportOptions) -> Result<Arc<FileIndex>> {
        if !options.use_index {
            return Ok(Arc::new(index_file(path)?));
        }

        let sidecar = sidecar_path(path, &options.index_suffix);
        let persisted = persist::load(&sidecar).and_then(|files| files.into_iter().next());
        let (index, rescanned) = self.indexer.refresh_file(path, persisted.as_ref())?;
        if rescanned || persisted.is_none() {
            persist::save(&sidecar, std::slice::from_ref(&index))?;
        } else {
            debug!(sidecar = %sidecar.display(), "using index sidecar");
        }
        Ok(index)
    }
}

/// Sidecar path of one data file: its name with `suffix` appended.
pub fn sidecar_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_round_trip() {
        for kind in ReportKind::ALL {
            assert_eq!(kind.name().parse::<ReportKind>().unwrap(), kind);
        }
        assert_eq!("DRSSUMMARY".parse::<ReportKind>().unwrap(), ReportKind::DrsSummary);
        assert!(matches!(
            "rename".parse::<ReportKind>(),
            Err(ReportError::UnknownKind(_))
        ));
    }

    #[test]
    fn test_scale_offset_conventions() {
        let (scale, offset) = PackingConvention::Unsigned.scale_offset(0.0, 255.0, 8).unwrap();
        assert_eq!((scale, offset), (1.0, 0.0));

        let (scale, offset) = PackingConvention::UnsignedReserved
            .scale_offset(0.0, 254.0, 8)
            .unwrap();
        assert_eq!((scale, offset), (1.0, -1.0));

        let (scale, offset) = PackingConvention::SignedReserved
            .scale_offset(-10.0, 10.0, 8)
            .unwrap();
        assert!((scale - 20.0 / 254.0).abs() < 1e-12);
        assert_eq!(offset, 0.0);

        let (_, offset) = PackingConvention::Signed.scale_offset(0.0, 255.0, 8).unwrap();
        assert_eq!(offset, 128.0);
    }

    #[test]
    fn test_scale_offset_degenerate_widths() {
        assert!(PackingConvention::Unsigned.scale_offset(0.0, 1.0, 0).is_none());
        assert!(PackingConvention::UnsignedReserved.scale_offset(0.0, 1.0, 1).is_none());
        assert!(PackingConvention::Signed.scale_offset(0.0, 1.0, 40).is_none());
    }

    #[test]
    fn test_sidecar_path_appends_suffix() {
        assert_eq!(
            sidecar_path(Path::new("/data/gfs.grib2"), DEFAULT_INDEX_SUFFIX),
            PathBuf::from("/data/gfs.grib2.idx.json")
        );
    }
}
