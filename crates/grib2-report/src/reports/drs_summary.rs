use super::{FileContext, ReportPass};
use crate::counters::Counters;
use crate::error::Result;
use grib2_parser::ProductRecord;
use std::fmt::Write as _;

pub struct DrsSummaryPass;

impl ReportPass for DrsSummaryPass {
    fn title(&self) -> &'static str {
        "Show unique DRS templates"
    }

    fn declare(&self, counters: &mut Counters) {
        counters.add("DRS_template");
        counters.add("BMS indicator");
        counters.add("Number_of_Bits");
    }

    fn file(&mut self, ctx: &mut FileContext<'_>, out: &mut String, counters: &mut Counters) -> Result<()> {
        let mut message_sum = 0u64;
        let mut last_message = None;

        for record in ctx.records() {
            let record = record?;
            if last_message != Some(record.start_offset) {
                message_sum += record.message_length;
                last_message = Some(record.start_offset);
            }

            let drs = record.drs();
            counters.count("DRS_template", drs.template());
            counters.count("BMS indicator", record.bitmap_indicator);
            if let Some(bits) = drs.bits_per_value() {
                counters.count("Number_of_Bits", bits);
            }

            if ctx.options.extra {
                match drs.template() {
                    2 | 3 => match drs.complex() {
                        Ok(complex) => {
                            counters.count("Group_splitting", complex.group_splitting_method);
                            counters.count("Missing_management", complex.missing_value_management);
                        }
                        Err(e) => ctx.record_error(record, e),
                    },
                    _ => {}
                }
                if drs.template() == 3 {
                    match drs.spatial_differencing() {
                        Ok(sd) => counters.count("Spatial_differencing_order", sd.order),
                        Err(e) => ctx.record_error(record, e),
                    }
                }
            }
        }

        let length = ctx.index.source.length;
        let percent = if length == 0 {
            0.0
        } else {
            message_sum as f64 / length as f64
        };
        writeln!(
            out,
            "file length = {length}, messageSum = {message_sum}, percent = {percent:.6} nrecords = {}",
            ctx.index.records.len()
        )?;
        Ok(())
    }
}
