use super::{record_id, FileContext, ReportPass};
use crate::counters::Counters;
use crate::error::Result;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use grib2_parser::{ByteSource, FileSource, ProductRecord};
use std::fmt::Write as _;
use std::io::Write as _;

/// Bits per value, the netCDF-style packing each record would get under the
/// configured convention, and how well the message bytes deflate.
#[derive(Default)]
pub struct PackingAnalysisPass {
    original: u64,
    compressed: u64,
}

fn deflated_len(bytes: &[u8]) -> std::io::Result<u64> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes)?;
    Ok(encoder.finish()?.len() as u64)
}

fn ratio(compressed: u64, original: u64) -> f64 {
    if original == 0 {
        0.0
    } else {
        compressed as f64 / original as f64
    }
}

impl ReportPass for PackingAnalysisPass {
    fn title(&self) -> &'static str {
        "Packing analysis"
    }

    fn declare(&self, counters: &mut Counters) {
        counters.add("Nbits");
        counters.add("scaleOffset");
    }

    fn file(&mut self, ctx: &mut FileContext<'_>, out: &mut String, counters: &mut Counters) -> Result<()> {
        let mut source = FileSource::open(ctx.path)?;
        let mut original = 0u64;
        let mut compressed = 0u64;
        let mut last_message = None;

        for record in ctx.records() {
            let record = record?;

            if last_message != Some(record.start_offset) {
                last_message = Some(record.start_offset);
                let message = match source.read_at(record.start_offset, record.message_length as usize) {
                    Ok(message) => message,
                    Err(e) => {
                        ctx.record_error(record, e);
                        continue;
                    }
                };
                match deflated_len(&message) {
                    Ok(len) => {
                        original += message.len() as u64;
                        compressed += len;
                    }
                    Err(e) => ctx.record_error(record, e),
                }
            }

            let Some(nbits) = record.drs().bits_per_value() else {
                continue;
            };
            counters.count("Nbits", nbits);

            let grid = match ctx.reader.read_grid(ctx.index, record) {
                Ok(grid) => grid,
                Err(e) => {
                    ctx.record_error(record, e);
                    continue;
                }
            };
            let stats = grid.stats();
            if stats.valid == 0 {
                counters.count("scaleOffset", "no valid data");
                continue;
            }

            match ctx
                .options
                .packing
                .scale_offset(stats.min as f64, stats.max as f64, nbits)
            {
                Some((scale, offset)) => {
                    counters.count("scaleOffset", "ok");
                    if ctx.options.extra {
                        writeln!(
                            out,
                            "  {} nbits={nbits} min={} max={} scale_factor={scale} add_offset={offset}",
                            record_id(record),
                            stats.min,
                            stats.max
                        )?;
                    }
                }
                None => counters.count("scaleOffset", "unusable width"),
            }
        }

        writeln!(
            out,
            "  org={original} zip={compressed} ratio={:.6}",
            ratio(compressed, original)
        )?;
        self.original += original;
        self.compressed += compressed;
        Ok(())
    }

    fn finish(&mut self, out: &mut String, _counters: &mut Counters) -> Result<()> {
        writeln!(
            out,
            "total org={} zip={} ratio={:.6}",
            self.original,
            self.compressed,
            ratio(self.compressed, self.original)
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ReportOptions;
    use grib2_index::{index_file, DataReader};
    use grib2_parser::{CoordinateExtractor, ExtractorOptions, Grib2Tables, UnpackOptions};
    use test_utils::{temp_test_dir, write_test_file, Grib2Builder};

    #[test]
    fn test_unreadable_message_is_a_record_error() {
        let dir = temp_test_dir();
        let mut bytes = Grib2Builder::new_row(3).build();
        let first_len = bytes.len();
        bytes.extend(Grib2Builder::new_row(4).build());
        let path = write_test_file(dir.path(), "cut.grib2", &bytes);
        let index = index_file(&path).unwrap();
        assert_eq!(index.records.len(), 2);

        // the second message no longer fits in the file
        std::fs::write(&path, &bytes[..first_len + 16]).unwrap();

        let options = ReportOptions::default();
        let extractor = CoordinateExtractor::new(ExtractorOptions::default());
        let reader = DataReader::new(UnpackOptions::default());
        let tables = Grib2Tables::standard();
        let mut ctx = FileContext::new(&path, &index, &options, &extractor, &reader, &tables);

        let mut pass = PackingAnalysisPass::default();
        let mut counters = Counters::new();
        pass.declare(&mut counters);
        let mut out = String::new();
        pass.file(&mut ctx, &mut out, &mut counters).unwrap();

        // first record: message deflated, grid read refused as stale
        // second record: message read fails
        assert_eq!(ctx.errors(), 2);
        assert_eq!(pass.original, first_len as u64);
        assert!(out.contains(&format!("  org={first_len} ")));
        assert_eq!(counters.value("Nbits", 16u8), 1);
    }
}
