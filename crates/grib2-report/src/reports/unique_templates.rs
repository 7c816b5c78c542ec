use super::{FileContext, ReportPass};
use crate::counters::Counters;
use crate::error::Result;
use grib2_parser::sections::{template_name, GridDefinitionView};
use grib2_parser::{ProductRecord, SectionKind};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Files using each template, with their record counts.
type Usage = BTreeMap<u16, Vec<(PathBuf, usize)>>;

#[derive(Default)]
pub struct UniqueTemplatesPass {
    gds: Usage,
    pds: Usage,
    drs: Usage,
}

fn add_file(usage: &mut Usage, path: &Path, counts: BTreeMap<u16, usize>) {
    for (template, count) in counts {
        usage.entry(template).or_default().push((path.to_path_buf(), count));
    }
}

fn show(out: &mut String, kind: SectionKind, usage: &Usage) -> std::fmt::Result {
    for (template, files) in usage {
        writeln!(
            out,
            "\n{} {} template= {}",
            kind.abbreviation(),
            template_name(kind, *template),
            template
        )?;
        for (path, count) in files {
            writeln!(out, "  {count:5} {}", path.display())?;
        }
    }
    Ok(())
}

impl ReportPass for UniqueTemplatesPass {
    fn title(&self) -> &'static str {
        "Show unique GDS, PDS and DRS templates"
    }

    fn file(&mut self, ctx: &mut FileContext<'_>, _out: &mut String, _counters: &mut Counters) -> Result<()> {
        let mut gds = BTreeMap::new();
        let mut pds = BTreeMap::new();
        let mut drs = BTreeMap::new();

        for record in ctx.records() {
            let record = record?;
            if let Some(grid) = ctx.index.grid(record.gds_hash) {
                *gds.entry(GridDefinitionView::new(grid).template()).or_insert(0) += 1;
            }
            *pds.entry(record.pds().template()).or_insert(0) += 1;
            *drs.entry(record.drs().template()).or_insert(0) += 1;
        }

        add_file(&mut self.gds, ctx.path, gds);
        add_file(&mut self.pds, ctx.path, pds);
        add_file(&mut self.drs, ctx.path, drs);
        Ok(())
    }

    fn finish(&mut self, out: &mut String, _counters: &mut Counters) -> Result<()> {
        show(out, SectionKind::GridDefinition, &self.gds)?;
        writeln!(out, "\n===================================================")?;
        show(out, SectionKind::ProductDefinition, &self.pds)?;
        writeln!(out, "\n===================================================")?;
        show(out, SectionKind::DataRepresentation, &self.drs)?;
        Ok(())
    }
}
