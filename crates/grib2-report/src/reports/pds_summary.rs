use super::{record_id, FileContext, ReportPass};
use crate::counters::Counters;
use crate::error::Result;
use grib2_index::IndexedRecord;
use grib2_parser::{ForecastTime, ProductRecord};
use std::fmt::Write as _;

/// Level type of hybrid levels.
const HYBRID_LEVEL: u8 = 105;
/// Scale bytes above this are sign-corrected by the coordinate extractor.
const LEVEL_SCALE_LIMIT: u8 = 127;
const MISSING: u8 = 255;

pub struct PdsSummaryPass;

/// Lines already shown for the current file.
struct Shown {
    level: bool,
    coords: bool,
}

fn summarize(
    ctx: &FileContext<'_>,
    record: &IndexedRecord,
    shown: &mut Shown,
    out: &mut String,
    counters: &mut Counters,
) -> Result<()> {
    let pds = record.pds();
    counters.count("timeUnit", pds.time_unit()?);
    counters.count("timeOffset", pds.forecast_time()?);

    if pds.is_interval() {
        if let ForecastTime::Interval { start, end, .. } = ctx.extractor.forecast_time(record)?.value {
            counters.count("timeIntervalSize", (end - start).round() as i64);
        }
    }

    let surface = pds.first_surface()?;
    counters.count("levelType", surface.surface_type);
    if !shown.level && surface.surface_type == HYBRID_LEVEL {
        shown.level = true;
        writeln!(out, " level = {HYBRID_LEVEL} : {}", ctx.path.display())?;
    }

    let n = pds.coordinate_count()?;
    counters.count("nExtraCoords", n);
    if !shown.coords && n > 0 {
        shown.coords = true;
        writeln!(out, " ncoords > 0 : {}", ctx.path.display())?;
    }

    counters.count("genProcessType", pds.generating_process_type()?);
    counters.count("genProcessId", pds.generating_process_id()?);

    if surface.scale > LEVEL_SCALE_LIMIT && surface.scale != MISSING && surface.surface_type != MISSING {
        writeln!(
            out,
            " LevelScale > {LEVEL_SCALE_LIMIT}: {} {} == {}",
            ctx.path.display(),
            record_id(record),
            surface.scale
        )?;
        counters.count("levelScale", surface.scale);
    }
    Ok(())
}

impl ReportPass for PdsSummaryPass {
    fn title(&self) -> &'static str {
        "PDS summary"
    }

    fn declare(&self, counters: &mut Counters) {
        for name in [
            "template",
            "timeUnit",
            "timeOffset",
            "timeIntervalSize",
            "levelType",
            "genProcessType",
            "genProcessId",
            "levelScale",
            "nExtraCoords",
        ] {
            counters.add(name);
        }
    }

    fn file(&mut self, ctx: &mut FileContext<'_>, out: &mut String, counters: &mut Counters) -> Result<()> {
        let mut shown = Shown {
            level: false,
            coords: false,
        };

        for record in ctx.records() {
            let record = record?;
            counters.count("template", record.pds().template());
            if let Err(e) = summarize(ctx, record, &mut shown, out, counters) {
                ctx.record_error(record, e);
            }
        }
        Ok(())
    }
}
