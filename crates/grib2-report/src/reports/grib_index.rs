use super::{FileContext, ReportPass};
use crate::counters::Counters;
use crate::error::Result;
use std::fmt::Write as _;

/// Grid definition sections against distinct grid definitions per file.
pub struct GribIndexPass;

impl ReportPass for GribIndexPass {
    fn title(&self) -> &'static str {
        "GDS count vs unique GDS hashes"
    }

    fn declare(&self, counters: &mut Counters) {
        counters.add("GDS");
        counters.add("GDShashes");
    }

    fn file(&mut self, ctx: &mut FileContext<'_>, out: &mut String, counters: &mut Counters) -> Result<()> {
        let count = ctx.index.gds_count();
        let unique = ctx.index.grids.len();
        counters.count("GDS", count);
        counters.count("GDShashes", unique);
        if ctx.options.each_file {
            writeln!(out, "   count={count} countHash={unique}")?;
        }
        Ok(())
    }
}
