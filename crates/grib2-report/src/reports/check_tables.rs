use super::{FileContext, ReportPass};
use crate::counters::Counters;
use crate::error::Result;
use grib2_parser::tables::is_local_parameter;
use grib2_parser::ProductRecord;
use std::collections::BTreeSet;
use std::fmt::Write as _;

/// Parameters in the local-use range and parameters missing from the tables.
#[derive(Default)]
pub struct CheckTablesPass {
    total: usize,
    local: usize,
    missing: usize,
}

impl ReportPass for CheckTablesPass {
    fn title(&self) -> &'static str {
        "Check GRIB2 parameter tables"
    }

    fn declare(&self, counters: &mut Counters) {
        counters.add("parameter");
    }

    fn file(&mut self, ctx: &mut FileContext<'_>, out: &mut String, counters: &mut Counters) -> Result<()> {
        let mut parameters = BTreeSet::new();
        for record in ctx.records() {
            let record = record?;
            match record.parameter() {
                Ok(parameter) => {
                    parameters.insert(parameter);
                }
                Err(e) => ctx.record_error(record, e),
            }
        }

        let (mut local, mut missing) = (0, 0);
        for &(discipline, category, number) in &parameters {
            let name = ctx.tables.get_parameter_name(discipline, category, number);
            if is_local_parameter(category, number) {
                writeln!(out, "  local parameter ({discipline} {category} {number}) = {name}")?;
                counters.count("parameter", "local");
                local += 1;
            } else if !ctx.tables.has_parameter(discipline, category, number) {
                writeln!(out, "  missing from table ({discipline} {category} {number}) = {name}")?;
                counters.count("parameter", "missing");
                missing += 1;
            } else {
                counters.count("parameter", "known");
            }
        }

        writeln!(
            out,
            "total parameters={} local = {local} missing = {missing}",
            parameters.len()
        )?;
        self.total += parameters.len();
        self.local += local;
        self.missing += missing;
        Ok(())
    }

    fn finish(&mut self, out: &mut String, _counters: &mut Counters) -> Result<()> {
        writeln!(
            out,
            "\nGrand total={} local = {} missing = {}",
            self.total, self.local, self.missing
        )?;
        Ok(())
    }
}
