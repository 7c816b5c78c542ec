//! grib-inspect configuration.
//!
//! Defaults, then an optional YAML file, then environment overrides.

use anyhow::{bail, Context, Result};
use grib2_index::IndexOptions;
use grib2_parser::LevelScalePolicy;
use grib2_report::{PackingConvention, ReportOptions};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InspectConfig {
    /// File extensions collected when a directory is given.
    pub extensions: Vec<String>,
    /// Descend into subdirectories.
    pub recursive: bool,
    /// Collection sidecar written by `index` when none is given.
    pub sidecar: String,
    /// Value written at points without data by `unpack`.
    pub missing_value: Option<f32>,
    pub log_format: LogFormat,
    pub index: IndexOptions,
    pub report: ReportOptions,
}

impl Default for InspectConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["grib2".into(), "grb2".into(), "grb".into()],
            recursive: true,
            sidecar: "collection.idx.json".into(),
            missing_value: None,
            log_format: LogFormat::Text,
            index: IndexOptions::default(),
            report: ReportOptions::default(),
        }
    }
}

impl InspectConfig {
    /// Load from `path` (YAML) if given, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config: {}", path.display()))?;
                serde_yaml::from_str(&content)
                    .with_context(|| format!("Failed to parse config: {}", path.display()))?
            }
            None => Self::default(),
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults with environment overrides.
    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(val) = std::env::var("GRIB_INSPECT_EXTENSIONS") {
            self.extensions = val
                .split(',')
                .map(|s| s.trim().trim_start_matches('.').to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Ok(val) = std::env::var("GRIB_INSPECT_RECURSIVE") {
            self.recursive = parse_bool(&val);
        }
        if let Ok(val) = std::env::var("GRIB_INSPECT_SIDECAR") {
            self.sidecar = val;
        }
        if let Ok(val) = std::env::var("GRIB_INSPECT_LOG_FORMAT") {
            self.log_format = val.parse().map_err(anyhow::Error::msg)?;
        }
        if let Ok(val) = std::env::var("GRIB_INDEX_FORCE") {
            self.index.force = parse_bool(&val);
        }
        if let Ok(val) = std::env::var("GRIB_INDEX_CACHE_CAPACITY") {
            self.index.cache_capacity = val
                .parse()
                .with_context(|| format!("Invalid GRIB_INDEX_CACHE_CAPACITY: {val}"))?;
        }
        if let Ok(val) = std::env::var("GRIB_REPORT_USE_INDEX") {
            self.report.use_index = parse_bool(&val);
        }
        if let Ok(val) = std::env::var("GRIB_LEVEL_SCALE_POLICY") {
            self.report.extractor.level_scale_policy = val
                .parse::<LevelScalePolicy>()
                .map_err(anyhow::Error::msg)?;
        }
        if let Ok(val) = std::env::var("GRIB_PACKING_CONVENTION") {
            self.report.packing = val
                .parse::<PackingConvention>()
                .map_err(anyhow::Error::msg)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.extensions.is_empty() {
            bail!("at least one file extension is required");
        }
        if self.sidecar.trim().is_empty() {
            bail!("sidecar path must not be empty");
        }
        if self.index.cache_capacity == 0 {
            bail!("index cache capacity must be at least 1");
        }
        if self.report.index_suffix.is_empty() {
            bail!("report index suffix must not be empty");
        }
        Ok(())
    }
}

fn parse_bool(val: &str) -> bool {
    val.eq_ignore_ascii_case("true") || val == "1"
}
