use super::{FileContext, ReportPass};
use crate::counters::Counters;
use crate::error::Result;
use std::fmt::Write as _;

/// Local use section bytes of every record, by data section offset.
pub struct LocalUsePass;

impl ReportPass for LocalUsePass {
    fn title(&self) -> &'static str {
        "Show local use section"
    }

    fn declare(&self, counters: &mut Counters) {
        counters.add("localUseLength");
    }

    fn file(&mut self, ctx: &mut FileContext<'_>, out: &mut String, counters: &mut Counters) -> Result<()> {
        writeln!(out, "File = {}", ctx.path.display())?;
        for record in ctx.records() {
            let record = record?;
            let offset = record.data.offset;
            match &record.local_use {
                None => {
                    counters.count("localUseLength", 0u32);
                    writeln!(out, " {offset:10} == none")?;
                }
                Some(section) => {
                    let bytes = section.raw().get(5..).unwrap_or_default();
                    counters.count("localUseLength", bytes.len());
                    writeln!(out, " {offset:10} == {bytes:?}")?;
                }
            }
        }
        Ok(())
    }
}
