//! Subcommand bodies. Each returns the text to print so it can be tested
//! without capturing stdout.

use anyhow::{bail, Context, Result};
use grib2_index::{index_file, DataReader, Indexer};
use grib2_parser::{
    CoordinateExtractor, ExtractorOptions, Grib2Tables, ProductRecord, Record, RecordScanner,
    UnpackOptions,
};
use grib2_report::{Counters, ReportEngine, ReportKind};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::InspectConfig;

/// One line per record of every file, followed by the scan totals.
pub fn scan(files: &[PathBuf], options: &ExtractorOptions) -> Result<String> {
    let extractor = CoordinateExtractor::new(options.clone());
    let tables = Grib2Tables::standard();
    let mut out = String::new();

    for (file_index, path) in files.iter().enumerate() {
        writeln!(out, "------- {}", path.display())?;
        let mut scanner = match RecordScanner::open(path, file_index as u32) {
            Ok(scanner) => scanner,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cannot open file");
                writeln!(out, "  **Cant open {}: {e}", path.display())?;
                continue;
            }
        };

        for item in scanner.by_ref() {
            match item {
                Ok(record) => writeln!(out, "{}", describe(&record, &extractor, &tables))?,
                Err(e) => writeln!(out, "  error: {e}")?,
            }
        }

        let stats = scanner.stats();
        writeln!(
            out,
            "  messages={} records={} errors={}",
            stats.messages, stats.records, stats.errors
        )?;
    }
    Ok(out)
}

fn describe(record: &Record, extractor: &CoordinateExtractor, tables: &Grib2Tables) -> String {
    let parameter = match record.parameter() {
        Ok((d, c, n)) => format!("{d}-{c}-{n} {}", tables.get_parameter_name(d, c, n)),
        Err(e) => format!("?-?-? ({e})"),
    };
    let level = match extractor.vertical_level(record) {
        Ok(level) => match level.value.value {
            Some(value) => tables.get_level_description(level.value.level_type, value),
            None => format!("level type {}", level.value.level_type),
        },
        Err(e) => format!("level ({e})"),
    };
    let time = match extractor.forecast_time(record) {
        Ok(time) => time.value.to_string(),
        Err(e) => format!("time ({e})"),
    };
    let gds = record.gds();
    let shape = gds
        .shape()
        .map(|(ny, nx)| format!("{ny}x{nx}"))
        .unwrap_or_else(|_| "?x?".to_string());

    format!(
        "{:>10} {:>2} {parameter} | {level} | {time} | {} {shape} | {}",
        record.start_offset,
        record.repeat,
        gds.template_name(),
        record.drs().template_name()
    )
}

/// Bring the collection sidecar up to date and summarize it.
pub fn index(files: &[PathBuf], sidecar: &Path, config: &InspectConfig) -> Result<String> {
    let indexer = Indexer::new(config.index.clone());
    let collection = indexer
        .load_or_rebuild(files, sidecar)
        .with_context(|| format!("Failed to index into {}", sidecar.display()))?;

    let mut out = String::new();
    for file in collection.files() {
        writeln!(
            out,
            "{}: messages={} records={} errors={} grids={}",
            file.source.path.display(),
            file.stats.messages,
            file.stats.records,
            file.stats.errors,
            file.gds_count()
        )?;
    }
    writeln!(
        out,
        "files={} records={} unique grids={} rescanned={}",
        collection.files().len(),
        collection.record_count(),
        collection.unique_grid_count(),
        indexer.rescans()
    )?;
    info!(sidecar = %sidecar.display(), rescans = indexer.rescans(), "Index written");
    Ok(out)
}

/// Run one diagnostic report over the collection.
pub fn report(kind: ReportKind, files: &[PathBuf], config: &InspectConfig) -> Result<String> {
    let engine = ReportEngine::new(config.index.clone());
    let report = engine.run(kind, files, &config.report, Counters::new())?;
    info!(
        kind = %kind,
        files = report.files.len(),
        errors = report.error_count(),
        "Report finished"
    );
    Ok(report.text)
}

/// Unpack record `number` of `path` and print its statistics and the first
/// `head` values.
pub fn unpack(path: &Path, number: usize, head: usize, config: &InspectConfig) -> Result<String> {
    let file = index_file(path).with_context(|| format!("Failed to scan {}", path.display()))?;
    let Some(record) = file.records.get(number) else {
        bail!(
            "record {number} out of range, {} has {} records",
            path.display(),
            file.records.len()
        );
    };

    let mut options = UnpackOptions::default();
    if let Some(missing) = config.missing_value {
        options.missing_value = missing;
    }
    let grid = DataReader::new(options).read_grid(&file, record)?;
    let stats = grid.stats();

    let mut out = String::new();
    let (d, c, n) = record.parameter()?;
    writeln!(
        out,
        "record {number} ({d}-{c}-{n}) at offset {} shape={}x{}",
        record.start_offset, grid.shape.0, grid.shape.1
    )?;
    writeln!(
        out,
        "valid={} missing={} min={} max={} mean={:.4}",
        stats.valid, stats.missing, stats.min, stats.max, stats.mean
    )?;
    let values: Vec<String> = grid.values.iter().take(head).map(|v| v.to_string()).collect();
    if !values.is_empty() {
        writeln!(out, "values: {}", values.join(" "))?;
    }
    Ok(out)
}
