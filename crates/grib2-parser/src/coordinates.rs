//! Forecast time and vertical level extraction.
//!
//! Producers do not always follow the tables to the letter: interval time
//! ranges use a different unit than the nominal forecast unit, level scale
//! factors are written as two's complement bytes, stated interval ends do
//! not match the computed ones. The extractor reconciles these cases and
//! reports each one as an [`Anomaly`] next to the value it returns.

use crate::error::Result;
use crate::record::ProductRecord;
use crate::sections::{SurfaceField, TimeRange};
use chrono::{DateTime, Duration, Months, NaiveDateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

/// Time unit of code table 4.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimeUnit {
    Minute,
    Hour,
    Day,
    Month,
    Year,
    Decade,
    Normal,
    Century,
    Hours3,
    Hours6,
    Hours12,
    Second,
    Missing,
    Other(u8),
}

/// Length of a unit, either fixed or in calendar months.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnitSpan {
    Seconds(i64),
    Months(i64),
}

impl TimeUnit {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => TimeUnit::Minute,
            1 => TimeUnit::Hour,
            2 => TimeUnit::Day,
            3 => TimeUnit::Month,
            4 => TimeUnit::Year,
            5 => TimeUnit::Decade,
            6 => TimeUnit::Normal,
            7 => TimeUnit::Century,
            10 => TimeUnit::Hours3,
            11 => TimeUnit::Hours6,
            12 => TimeUnit::Hours12,
            13 => TimeUnit::Second,
            255 => TimeUnit::Missing,
            other => TimeUnit::Other(other),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            TimeUnit::Minute => 0,
            TimeUnit::Hour => 1,
            TimeUnit::Day => 2,
            TimeUnit::Month => 3,
            TimeUnit::Year => 4,
            TimeUnit::Decade => 5,
            TimeUnit::Normal => 6,
            TimeUnit::Century => 7,
            TimeUnit::Hours3 => 10,
            TimeUnit::Hours6 => 11,
            TimeUnit::Hours12 => 12,
            TimeUnit::Second => 13,
            TimeUnit::Missing => 255,
            TimeUnit::Other(code) => code,
        }
    }

    fn span(self) -> Option<UnitSpan> {
        Some(match self {
            TimeUnit::Second => UnitSpan::Seconds(1),
            TimeUnit::Minute => UnitSpan::Seconds(60),
            TimeUnit::Hour => UnitSpan::Seconds(3_600),
            TimeUnit::Hours3 => UnitSpan::Seconds(3 * 3_600),
            TimeUnit::Hours6 => UnitSpan::Seconds(6 * 3_600),
            TimeUnit::Hours12 => UnitSpan::Seconds(12 * 3_600),
            TimeUnit::Day => UnitSpan::Seconds(86_400),
            TimeUnit::Month => UnitSpan::Months(1),
            TimeUnit::Year => UnitSpan::Months(12),
            TimeUnit::Decade => UnitSpan::Months(120),
            TimeUnit::Normal => UnitSpan::Months(360),
            TimeUnit::Century => UnitSpan::Months(1_200),
            TimeUnit::Missing | TimeUnit::Other(_) => return None,
        })
    }

    /// Express `value` units of `self` in units of `target`. `None` when one
    /// of the units is a calendar unit and the other a fixed duration.
    pub fn convert(self, value: f64, target: TimeUnit) -> Option<f64> {
        match (self.span()?, target.span()?) {
            (UnitSpan::Seconds(from), UnitSpan::Seconds(to)) => Some(value * from as f64 / to as f64),
            (UnitSpan::Months(from), UnitSpan::Months(to)) => Some(value * from as f64 / to as f64),
            _ => None,
        }
    }

    /// Add `value` units to `time`, when the unit and value allow it.
    pub fn add_to(self, time: DateTime<Utc>, value: f64) -> Option<DateTime<Utc>> {
        match self.span()? {
            UnitSpan::Seconds(seconds) => {
                let total = value * seconds as f64;
                if !total.is_finite() || total.abs() > 1e12 {
                    return None;
                }
                time.checked_add_signed(Duration::milliseconds((total * 1000.0).round() as i64))
            }
            UnitSpan::Months(months) => {
                if value.fract() != 0.0 {
                    return None;
                }
                let total = value as i64 * months;
                if total >= 0 {
                    time.checked_add_months(Months::new(u32::try_from(total).ok()?))
                } else {
                    time.checked_sub_months(Months::new(u32::try_from(-total).ok()?))
                }
            }
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TimeUnit::Minute => "minute",
            TimeUnit::Hour => "hour",
            TimeUnit::Day => "day",
            TimeUnit::Month => "month",
            TimeUnit::Year => "year",
            TimeUnit::Decade => "decade",
            TimeUnit::Normal => "normal (30 years)",
            TimeUnit::Century => "century",
            TimeUnit::Hours3 => "3 hours",
            TimeUnit::Hours6 => "6 hours",
            TimeUnit::Hours12 => "12 hours",
            TimeUnit::Second => "second",
            TimeUnit::Missing => "missing",
            TimeUnit::Other(_) => "unknown",
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeUnit::Other(code) => write!(f, "unknown unit {code}"),
            unit => f.write_str(unit.name()),
        }
    }
}

/// Statistical process of code table 4.10.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatisticalProcess {
    Average,
    Accumulation,
    Maximum,
    Minimum,
    Difference,
    RootMeanSquare,
    StandardDeviation,
    Covariance,
    DifferenceReversed,
    Ratio,
    StandardizedAnomaly,
    Summation,
    Missing,
    Other(u8),
}

impl StatisticalProcess {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::Average,
            1 => Self::Accumulation,
            2 => Self::Maximum,
            3 => Self::Minimum,
            4 => Self::Difference,
            5 => Self::RootMeanSquare,
            6 => Self::StandardDeviation,
            7 => Self::Covariance,
            8 => Self::DifferenceReversed,
            9 => Self::Ratio,
            10 => Self::StandardizedAnomaly,
            11 => Self::Summation,
            255 => Self::Missing,
            other => Self::Other(other),
        }
    }
}

/// One interval of a statistically processed product, in the nominal unit.
#[derive(Debug, Clone, PartialEq)]
pub struct IntervalDetail {
    pub statistical_process: StatisticalProcess,
    pub increment_type: u8,
    pub range: f64,
    /// `None` when the increment is missing or zero (continuous processing).
    pub increment: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ForecastTime {
    Point {
        offset: f64,
        unit: TimeUnit,
    },
    Interval {
        start: f64,
        end: f64,
        unit: TimeUnit,
        statistical_process: StatisticalProcess,
        intervals: Vec<IntervalDetail>,
    },
}

impl ForecastTime {
    pub fn unit(&self) -> TimeUnit {
        match self {
            ForecastTime::Point { unit, .. } | ForecastTime::Interval { unit, .. } => *unit,
        }
    }

    /// Offset of the end of the product validity from the reference time.
    pub fn end(&self) -> f64 {
        match self {
            ForecastTime::Point { offset, .. } => *offset,
            ForecastTime::Interval { end, .. } => *end,
        }
    }

    pub fn is_interval(&self) -> bool {
        matches!(self, ForecastTime::Interval { .. })
    }
}

impl fmt::Display for ForecastTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForecastTime::Point { offset, unit } => write!(f, "{offset} {unit}"),
            ForecastTime::Interval {
                start, end, unit, ..
            } => write!(f, "[{start}, {end}] {unit}"),
        }
    }
}

/// A provider deviation found while extracting coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum Anomaly {
    /// A time range used another unit than the nominal one and was converted.
    TimeUnitMismatch {
        field: &'static str,
        from: TimeUnit,
        to: TimeUnit,
        raw: u32,
        converted: f64,
    },
    /// A time range unit cannot be expressed in the nominal unit; the raw
    /// value was kept.
    UnconvertibleTimeUnit {
        field: &'static str,
        from: TimeUnit,
        to: TimeUnit,
        raw: u32,
    },
    /// Stated end of interval differs from reference time plus interval end.
    IntervalEndMismatch {
        computed: NaiveDateTime,
        stated: NaiveDateTime,
    },
    ZeroLengthInterval,
    /// A level scale byte above the threshold was sign-corrected.
    LevelScaleAnomaly {
        surface: u8,
        raw_scale: u8,
        corrected: i32,
    },
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anomaly::TimeUnitMismatch {
                field,
                from,
                to,
                raw,
                converted,
            } => write!(f, "{field} {raw} {from} converted to {converted} {to}"),
            Anomaly::UnconvertibleTimeUnit {
                field,
                from,
                to,
                raw,
            } => write!(f, "{field} {raw} {from} cannot be expressed in {to}"),
            Anomaly::IntervalEndMismatch { computed, stated } => {
                write!(f, "interval end {stated} differs from computed {computed}")
            }
            Anomaly::ZeroLengthInterval => f.write_str("zero length interval"),
            Anomaly::LevelScaleAnomaly {
                surface,
                raw_scale,
                corrected,
            } => write!(f, "level {surface} scale byte {raw_scale} read as {corrected}"),
        }
    }
}

/// A value together with the anomalies found while deriving it.
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted<T> {
    pub value: T,
    pub anomalies: Vec<Anomaly>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VerticalLevel {
    pub level_type: u8,
    /// `None` for missing levels.
    pub value: Option<f64>,
    pub level_type2: Option<u8>,
    pub value2: Option<f64>,
}

/// How a level scale byte above the threshold is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelScalePolicy {
    /// Read the byte as a two's complement `i8` (what offending producers write).
    #[default]
    TwosComplement,
    /// Read the byte as a GRIB sign-magnitude integer.
    SignMagnitude,
    /// Use the byte as an unsigned scale.
    Raw,
}

impl std::str::FromStr for LevelScalePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "twos_complement" => Ok(Self::TwosComplement),
            "sign_magnitude" => Ok(Self::SignMagnitude),
            "raw" => Ok(Self::Raw),
            other => Err(format!("unknown level scale policy '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorOptions {
    /// Scale bytes strictly greater than this are sign-corrected.
    pub level_scale_threshold: u8,
    pub level_scale_policy: LevelScalePolicy,
    /// Compare stated interval ends with reference time plus interval end.
    pub check_interval_end: bool,
}

impl Default for ExtractorOptions {
    fn default() -> Self {
        Self {
            level_scale_threshold: 127,
            level_scale_policy: LevelScalePolicy::TwosComplement,
            check_interval_end: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CoordinateExtractor {
    options: ExtractorOptions,
}

impl CoordinateExtractor {
    pub fn new(options: ExtractorOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ExtractorOptions {
        &self.options
    }

    pub fn forecast_time<R: ProductRecord + ?Sized>(
        &self,
        record: &R,
    ) -> Result<Extracted<ForecastTime>> {
        let pds = record.pds();
        let unit = TimeUnit::from_code(pds.time_unit()?);
        let offset = pds.forecast_time()? as f64;

        if !pds.is_interval() {
            return Ok(Extracted {
                value: ForecastTime::Point { offset, unit },
                anomalies: Vec::new(),
            });
        }

        let ranges = pds.time_ranges()?;
        let mut anomalies = Vec::new();
        let mut intervals = Vec::with_capacity(ranges.len());
        for range in &ranges {
            intervals.push(self.interval_detail(range, unit, &mut anomalies));
        }

        // The outermost range (listed first) spans the whole product.
        let length = intervals.first().map(|d| d.range).unwrap_or(0.0);
        let start = offset;
        let end = start + length;
        let statistical_process = intervals
            .first()
            .map(|d| d.statistical_process)
            .unwrap_or(StatisticalProcess::Missing);

        if start == 0.0 && end == 0.0 {
            anomalies.push(Anomaly::ZeroLengthInterval);
        }

        if self.options.check_interval_end {
            if let Some(stated) = pds.interval_end() {
                match record.reference_time() {
                    Ok(reference) => {
                        if let Some(computed) = unit.add_to(reference, end) {
                            let computed = computed.naive_utc();
                            if computed != stated {
                                anomalies.push(Anomaly::IntervalEndMismatch { computed, stated });
                            }
                        }
                    }
                    Err(e) => debug!(error = %e, "reference time unavailable, interval end not checked"),
                }
            }
        }

        record_anomalies(&anomalies);
        Ok(Extracted {
            value: ForecastTime::Interval {
                start,
                end,
                unit,
                statistical_process,
                intervals,
            },
            anomalies,
        })
    }

    fn interval_detail(
        &self,
        range: &TimeRange,
        nominal: TimeUnit,
        anomalies: &mut Vec<Anomaly>,
    ) -> IntervalDetail {
        let length = to_nominal(
            "time_range_length",
            range.range_length,
            TimeUnit::from_code(range.range_unit),
            nominal,
            anomalies,
        );
        let increment = if range.increment == 0 || range.increment_unit == 255 {
            None
        } else {
            Some(to_nominal(
                "time_increment",
                range.increment,
                TimeUnit::from_code(range.increment_unit),
                nominal,
                anomalies,
            ))
        };
        IntervalDetail {
            statistical_process: StatisticalProcess::from_code(range.statistical_process),
            increment_type: range.increment_type,
            range: length,
            increment,
        }
    }

    pub fn vertical_level<R: ProductRecord + ?Sized>(
        &self,
        record: &R,
    ) -> Result<Extracted<VerticalLevel>> {
        let pds = record.pds();
        let mut anomalies = Vec::new();
        let first = pds.first_surface()?;
        let second = pds.second_surface()?;

        let value = self.surface_value(1, &first, &mut anomalies);
        let (level_type2, value2) = if second.surface_type == 255 {
            (None, None)
        } else {
            (
                Some(second.surface_type),
                self.surface_value(2, &second, &mut anomalies),
            )
        };

        record_anomalies(&anomalies);
        Ok(Extracted {
            value: VerticalLevel {
                level_type: first.surface_type,
                value,
                level_type2,
                value2,
            },
            anomalies,
        })
    }

    fn surface_value(
        &self,
        surface: u8,
        field: &SurfaceField,
        anomalies: &mut Vec<Anomaly>,
    ) -> Option<f64> {
        if field.surface_type == 255 || (field.scale == 255 && field.value == u32::MAX) {
            return None;
        }
        if field.scale == 255 {
            // scale missing: value is taken unscaled
            return Some(field.value as f64);
        }

        let scale = if field.scale > self.options.level_scale_threshold {
            let corrected = match self.options.level_scale_policy {
                LevelScalePolicy::TwosComplement => field.scale as i8 as i32,
                LevelScalePolicy::SignMagnitude => {
                    crate::cursor::from_sign_magnitude(field.scale as u64, 8) as i32
                }
                LevelScalePolicy::Raw => field.scale as i32,
            };
            anomalies.push(Anomaly::LevelScaleAnomaly {
                surface,
                raw_scale: field.scale,
                corrected,
            });
            corrected
        } else {
            field.scale as i32
        };
        Some(field.value as f64 * 10f64.powi(-scale))
    }
}

fn to_nominal(
    field: &'static str,
    raw: u32,
    unit: TimeUnit,
    nominal: TimeUnit,
    anomalies: &mut Vec<Anomaly>,
) -> f64 {
    if unit == nominal {
        return raw as f64;
    }
    match unit.convert(raw as f64, nominal) {
        Some(converted) => {
            anomalies.push(Anomaly::TimeUnitMismatch {
                field,
                from: unit,
                to: nominal,
                raw,
                converted,
            });
            converted
        }
        None => {
            anomalies.push(Anomaly::UnconvertibleTimeUnit {
                field,
                from: unit,
                to: nominal,
                raw,
            });
            raw as f64
        }
    }
}

fn record_anomalies(anomalies: &[Anomaly]) {
    for anomaly in anomalies {
        warn!(%anomaly, "coordinate anomaly");
    }
    if !anomalies.is_empty() {
        counter!("grib2_coordinate_anomalies_total").increment(anomalies.len() as u64);
    }
}
