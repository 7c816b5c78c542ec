use super::{record_id, FileContext, ReportPass};
use crate::counters::Counters;
use crate::error::Result;
use grib2_index::IndexedRecord;
use grib2_parser::{Anomaly, ForecastTime, ProductRecord, TimeUnit};
use std::fmt::Write as _;

/// Time coordinates of interval products: units that differ from the
/// nominal unit, interval counts and lengths, `[0,0]` intervals and stated
/// interval ends that disagree with the computed ones.
#[derive(Default)]
pub struct TimeCoordPass {
    records: usize,
}

fn check_interval(
    ctx: &FileContext<'_>,
    record: &IndexedRecord,
    out: &mut String,
    counters: &mut Counters,
) -> Result<()> {
    let pds = record.pds();
    let time_unit = pds.time_unit()?;
    let ranges = pds.time_ranges()?;

    for range in &ranges {
        counters.count("statType", range.statistical_process);
        let increment_differs = range.increment_unit != time_unit
            && range.increment_unit != 255
            && range.increment != 0;
        if range.range_unit != time_unit || increment_differs {
            counters.count("TimeIntervalsDiffer", range.range_unit);
            if ctx.options.extra {
                writeln!(
                    out,
                    "  TimeInterval has different units timeUnit={time_unit} rangeUnit={} incrementUnit={} {} file={}",
                    range.range_unit,
                    range.increment_unit,
                    record_id(record),
                    ctx.file_name()
                )?;
            }
        }
    }
    counters.count("NumberTimeIntervals", ranges.len());

    let extracted = ctx.extractor.forecast_time(record)?;
    if let ForecastTime::Interval { start, end, unit, .. } = extracted.value {
        let length = unit.convert(end - start, TimeUnit::Hour).unwrap_or(end - start);
        counters.count("TimeIntervalsLength", length.round() as i64);
        if start == 0.0 && end == 0.0 {
            writeln!(
                out,
                "  TimeInterval [0,0] = {} file={}",
                record_id(record),
                ctx.file_name()
            )?;
        }
    }

    let mut mismatch = 0u8;
    for anomaly in &extracted.anomalies {
        if let Anomaly::IntervalEndMismatch { computed, stated } = anomaly {
            mismatch = 1;
            writeln!(
                out,
                "  interval end {stated} != computed {computed} {} file={}",
                record_id(record),
                ctx.file_name()
            )?;
        }
    }
    counters.count("TimeIntervalEndDiffers", mismatch);
    Ok(())
}

impl ReportPass for TimeCoordPass {
    fn title(&self) -> &'static str {
        "Check time coordinates"
    }

    fn declare(&self, counters: &mut Counters) {
        for name in [
            "template",
            "timeUnit",
            "statType",
            "NumberTimeIntervals",
            "TimeIntervalsDiffer",
            "TimeIntervalsLength",
            "TimeIntervalEndDiffers",
        ] {
            counters.add(name);
        }
    }

    fn file(&mut self, ctx: &mut FileContext<'_>, out: &mut String, counters: &mut Counters) -> Result<()> {
        for record in ctx.records() {
            let record = record?;
            self.records += 1;
            let pds = record.pds();
            counters.count("template", pds.template());
            match pds.time_unit() {
                Ok(unit) => counters.count("timeUnit", unit),
                Err(e) => {
                    ctx.record_error(record, e);
                    continue;
                }
            }

            if pds.is_interval() {
                if let Err(e) = check_interval(ctx, record, out, counters) {
                    ctx.record_error(record, e);
                }
            }
        }
        Ok(())
    }

    fn finish(&mut self, out: &mut String, _counters: &mut Counters) -> Result<()> {
        writeln!(out, "total records = {}", self.records)?;
        Ok(())
    }
}
