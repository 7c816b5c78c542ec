use super::{FileContext, ReportPass};
use crate::counters::Counters;
use crate::error::Result;
use grib2_index::IndexError;
use grib2_parser::sections::GridDefinitionView;
use std::fmt::Write as _;

/// Directions the corner points imply, as disagreements with the scan mode
/// flags. `None` when the grid does not store a last point.
fn corner_mismatches(view: &GridDefinitionView<'_>) -> grib2_parser::Result<Option<Vec<String>>> {
    let Some((la2, lo2)) = view.last_point()? else {
        return Ok(None);
    };
    let (la1, lo1) = view.first_point()?;
    let mode = view.scan_mode()?;
    let mut mismatches = Vec::new();

    if la1 != la2 && (la2 > la1) != mode.j_positive() {
        mismatches.push(format!("la1={la1} la2={la2}"));
    }

    // walk nx - 1 increments each way; longitudes wrap, so compare modulo 360
    let (_, nx) = view.shape()?;
    if let Some(di) = view.i_increment().filter(|_| nx > 1) {
        let span = (nx - 1) as f64 * di;
        let forward = angle_gap(lo1 + span, lo2);
        let backward = angle_gap(lo1 - span, lo2);
        if (forward - backward).abs() > di / 2.0 && (backward < forward) != mode.i_negative() {
            mismatches.push(format!("lo1={lo1} lo2={lo2}"));
        }
    }
    Ok(Some(mismatches))
}

fn angle_gap(a: f64, b: f64) -> f64 {
    let gap = (a - b).rem_euclid(360.0);
    gap.min(360.0 - gap)
}

pub struct GdsSummaryPass;

impl ReportPass for GdsSummaryPass {
    fn title(&self) -> &'static str {
        "Show unique GDS templates"
    }

    fn declare(&self, counters: &mut Counters) {
        counters.add("template");
        counters.add("scanMode");
        counters.add("scanModeDifference");
        counters.add("scanModeCorners");
    }

    fn file(&mut self, ctx: &mut FileContext<'_>, out: &mut String, counters: &mut Counters) -> Result<()> {
        for grid in ctx.index.grids.values() {
            let view = GridDefinitionView::new(grid);
            match corner_mismatches(&view) {
                Ok(Some(mismatches)) if mismatches.is_empty() => {
                    counters.count("scanModeCorners", "ok");
                }
                Ok(Some(mismatches)) => {
                    counters.count("scanModeCorners", "mismatch");
                    writeln!(
                        out,
                        "    template {} scan mode {} disagrees with corners: {}",
                        view.template(),
                        view.scan_mode()?,
                        mismatches.join(" ")
                    )?;
                }
                Ok(None) => {}
                Err(e) => writeln!(out, "    template {} corners unreadable: {e}", view.template())?,
            }
            if ctx.options.extra && matches!(view.scan_mode(), Ok(mode) if mode.j_positive()) {
                writeln!(out, "    template {} with Ypos", view.template())?;
            }
        }

        // scan mode of the first grid in the file; later grids should agree
        let mut file_mode = None;
        for record in ctx.records() {
            let record = record?;
            let grid = ctx.index.grid(record.gds_hash).ok_or(IndexError::UnknownGrid {
                hash: record.gds_hash,
            })?;
            let view = GridDefinitionView::new(grid);
            counters.count("template", view.template());

            let mode = match view.scan_mode() {
                Ok(mode) => mode,
                Err(e) => {
                    ctx.record_error(record, e);
                    continue;
                }
            };
            counters.count("scanMode", mode.0);
            match file_mode {
                None => file_mode = Some(mode),
                Some(first) if first != mode => {
                    counters.count("scanModeDifference", ctx.file_name());
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}
