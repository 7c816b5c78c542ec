use super::{record_id, FileContext, ReportPass};
use crate::counters::Counters;
use crate::error::Result;
use grib2_parser::ProductRecord;
use std::collections::HashSet;
use std::fmt::Write as _;

/// Statistical processes that are hard to represent: standard deviation (7)
/// and ratio (9).
const PROBLEM_STATISTICS: [u8; 2] = [7, 9];
/// Derived ensemble forecasts beyond the common ones.
const DERIVED_LIMIT: u8 = 9;

/// Probability products, awkward statistical processes and unusual derived
/// ensemble types, one line per distinct variable.
#[derive(Default)]
pub struct PdsProblemsPass {
    problems: usize,
    total: usize,
}

impl ReportPass for PdsProblemsPass {
    fn title(&self) -> &'static str {
        "Check PDS probability and statistical variables"
    }

    fn declare(&self, counters: &mut Counters) {
        counters.add("problem");
    }

    fn file(&mut self, ctx: &mut FileContext<'_>, out: &mut String, counters: &mut Counters) -> Result<()> {
        let mut variables = HashSet::new();

        for record in ctx.records() {
            let record = record?;
            let pds = record.pds();
            let id = record_id(record);
            if !variables.insert((id.clone(), pds.template())) {
                continue;
            }
            self.total += 1;

            if pds.is_probability() {
                let kind = pds.probability_type().unwrap_or(255);
                writeln!(out, "  {id} (PROB type {kind}) template={}", pds.template())?;
                counters.count("problem", "probability");
                self.problems += 1;
            }

            match pds.time_ranges() {
                Ok(ranges) => {
                    if let Some(range) = ranges
                        .iter()
                        .find(|r| PROBLEM_STATISTICS.contains(&r.statistical_process))
                    {
                        writeln!(
                            out,
                            "  {id} (STAT type {}) template={}",
                            range.statistical_process,
                            pds.template()
                        )?;
                        counters.count("problem", "statistical");
                        self.problems += 1;
                    }
                }
                Err(e) => ctx.record_error(record, e),
            }

            if let Some(derived) = pds.derived_type().filter(|t| *t > DERIVED_LIMIT) {
                writeln!(out, "  {id} (DERIVED type {derived}) template={}", pds.template())?;
                counters.count("problem", "derived");
                self.problems += 1;
            }
        }
        Ok(())
    }

    fn finish(&mut self, out: &mut String, _counters: &mut Counters) -> Result<()> {
        writeln!(out, "problems = {}/{}", self.problems, self.total)?;
        Ok(())
    }
}
