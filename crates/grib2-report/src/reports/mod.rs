//! One pass per report kind.
//!
//! A pass sees each file once through a [`FileContext`], writes its lines
//! to the report text and counts into the shared [`Counters`]. Passes that
//! summarise the whole collection print their tables from `finish`.

mod check_tables;
mod drs_summary;
mod duplicate_pds;
mod gds_summary;
mod grib_index;
mod id_problems;
mod local_use;
mod packing;
mod pds_problems;
mod pds_summary;
mod time_coord;
mod unique_templates;

use crate::counters::Counters;
use crate::engine::{ReportKind, ReportOptions};
use crate::error::Result;
use grib2_index::{DataReader, FileIndex, IndexedRecord};
use grib2_parser::{CoordinateExtractor, Grib2Tables, ProductRecord};
use std::fmt;
use std::path::Path;
use tracing::debug;

pub trait ReportPass {
    /// First line of the report text.
    fn title(&self) -> &'static str;

    /// Declare the counters this pass fills, so they show even when empty.
    fn declare(&self, _counters: &mut Counters) {}

    fn file(&mut self, ctx: &mut FileContext<'_>, out: &mut String, counters: &mut Counters) -> Result<()>;

    fn finish(&mut self, _out: &mut String, _counters: &mut Counters) -> Result<()> {
        Ok(())
    }
}

pub fn pass_for(kind: ReportKind) -> Box<dyn ReportPass> {
    match kind {
        ReportKind::GribIndex => Box::new(grib_index::GribIndexPass),
        ReportKind::UniqueTemplates => Box::<unique_templates::UniqueTemplatesPass>::default(),
        ReportKind::DuplicatePds => Box::<duplicate_pds::DuplicatePdsPass>::default(),
        ReportKind::DrsSummary => Box::new(drs_summary::DrsSummaryPass),
        ReportKind::GdsSummary => Box::new(gds_summary::GdsSummaryPass),
        ReportKind::PdsSummary => Box::new(pds_summary::PdsSummaryPass),
        ReportKind::PdsProblems => Box::<pds_problems::PdsProblemsPass>::default(),
        ReportKind::IdProblems => Box::new(id_problems::IdProblemsPass),
        ReportKind::TimeCoord => Box::<time_coord::TimeCoordPass>::default(),
        ReportKind::LocalUseSection => Box::new(local_use::LocalUsePass),
        ReportKind::CheckTables => Box::<check_tables::CheckTablesPass>::default(),
        ReportKind::PackingAnalysis => Box::<packing::PackingAnalysisPass>::default(),
    }
}

/// Everything a pass may use while visiting one file.
pub struct FileContext<'a> {
    pub path: &'a Path,
    pub index: &'a FileIndex,
    pub options: &'a ReportOptions,
    pub extractor: &'a CoordinateExtractor,
    pub reader: &'a DataReader,
    pub tables: &'a Grib2Tables,
    errors: u64,
}

impl<'a> FileContext<'a> {
    pub fn new(
        path: &'a Path,
        index: &'a FileIndex,
        options: &'a ReportOptions,
        extractor: &'a CoordinateExtractor,
        reader: &'a DataReader,
        tables: &'a Grib2Tables,
    ) -> Self {
        Self {
            path,
            index,
            options,
            extractor,
            reader,
            tables,
            errors: 0,
        }
    }

    /// Records of the file, with a cancellation check before each one.
    pub fn records(&self) -> impl Iterator<Item = Result<&'a IndexedRecord>> + 'a {
        let index: &'a FileIndex = self.index;
        let options: &'a ReportOptions = self.options;
        index.records.iter().map(move |record| {
            options.cancel.check()?;
            Ok(record)
        })
    }

    /// Note a record that could not be evaluated and carry on.
    pub fn record_error(&mut self, record: &IndexedRecord, error: impl fmt::Display) {
        debug!(
            path = %self.path.display(),
            offset = record.start_offset,
            repeat = record.repeat,
            error = %error,
            "record skipped in report"
        );
        self.errors += 1;
    }

    pub fn errors(&self) -> u64 {
        self.errors
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// `discipline-category-number` of a record's parameter.
pub(crate) fn record_id(record: &IndexedRecord) -> String {
    match record.parameter() {
        Ok((discipline, category, number)) => format!("{discipline}-{category}-{number}"),
        Err(_) => "?-?-?".to_string(),
    }
}
