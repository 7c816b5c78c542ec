use super::{record_id, FileContext, ReportPass};
use crate::counters::Counters;
use crate::error::Result;
use std::collections::HashMap;
use std::fmt::Write as _;

/// Product definition sections whose bytes repeat within a file, keyed by
/// the CRC-32 of the raw section.
#[derive(Default)]
pub struct DuplicatePdsPass {
    duplicates: usize,
    total: usize,
}

impl ReportPass for DuplicatePdsPass {
    fn title(&self) -> &'static str {
        "Show duplicate PDS"
    }

    fn declare(&self, counters: &mut Counters) {
        counters.add("pdsDuplicates");
    }

    fn file(&mut self, ctx: &mut FileContext<'_>, out: &mut String, counters: &mut Counters) -> Result<()> {
        let mut seen: HashMap<u32, &[u8]> = HashMap::new();
        let mut duplicates = 0;
        let mut count = 0;

        for record in ctx.records() {
            let record = record?;
            let body: &[u8] = record.product_definition.raw();
            let crc = crc32fast::hash(body);
            count += 1;
            match seen.get(&crc) {
                Some(first) if *first == body => {
                    duplicates += 1;
                    counters.count("pdsDuplicates", ctx.file_name());
                    if ctx.options.extra {
                        writeln!(
                            out,
                            "  duplicate {} crc={crc:08x} at {}",
                            record_id(record),
                            record.data.offset
                        )?;
                    }
                }
                Some(_) => {}
                None => {
                    seen.insert(crc, body);
                }
            }
        }

        writeln!(
            out,
            "PDS duplicates = {duplicates} / {count} for {}",
            ctx.path.display()
        )?;
        self.duplicates += duplicates;
        self.total += count;
        Ok(())
    }

    fn finish(&mut self, out: &mut String, _counters: &mut Counters) -> Result<()> {
        writeln!(
            out,
            "Total PDS duplicates = {} / {}",
            self.duplicates, self.total
        )?;
        Ok(())
    }
}
