use super::{record_id, FileContext, ReportPass};
use crate::counters::Counters;
use crate::error::Result;
use grib2_index::IndexedRecord;
use grib2_parser::sections::IdentificationView;
use grib2_parser::ProductRecord;
use std::fmt::Write as _;

/// Identification fields that should be constant within one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Identity {
    discipline: u8,
    center: u16,
    subcenter: u16,
    master: u8,
    local: u8,
    gen_process: u8,
    back_process: u8,
    sig_ref: u8,
}

impl Identity {
    fn of(record: &IndexedRecord) -> grib2_parser::Result<Self> {
        let id = IdentificationView::new(&record.identification);
        let pds = record.pds();
        Ok(Self {
            discipline: record.discipline()?,
            center: id.center()?,
            subcenter: id.subcenter()?,
            master: id.master_table_version()?,
            local: id.local_table_version()?,
            gen_process: pds.generating_process_id()?,
            back_process: pds.background_process_id()?,
            sig_ref: id.reference_significance()?,
        })
    }

    fn count(&self, counters: &mut Counters) {
        counters.count("discipline", self.discipline);
        counters.count("masterTable", self.master);
        counters.count("localTable", self.local);
        counters.count("centerId", self.center);
        counters.count("subcenterId", self.subcenter);
        counters.count("genProcess", self.gen_process);
        counters.count("backProcess", self.back_process);
        counters.count("significanceOfReference", self.sig_ref);
    }

    /// `(name, expected, found)` for every field that differs.
    fn differences(&self, other: &Self) -> Vec<(&'static str, u16, u16)> {
        let fields = [
            ("discipline", self.discipline as u16, other.discipline as u16),
            ("center", self.center, other.center),
            ("subcenter", self.subcenter, other.subcenter),
            ("master", self.master as u16, other.master as u16),
            ("local", self.local as u16, other.local as u16),
            ("genProcess", self.gen_process as u16, other.gen_process as u16),
            ("backProcess", self.back_process as u16, other.back_process as u16),
            ("sigRef", self.sig_ref as u16, other.sig_ref as u16),
        ];
        fields.into_iter().filter(|(_, a, b)| a != b).collect()
    }
}

pub struct IdProblemsPass;

impl ReportPass for IdProblemsPass {
    fn title(&self) -> &'static str {
        "Look for ID problems"
    }

    fn declare(&self, counters: &mut Counters) {
        for name in [
            "discipline",
            "masterTable",
            "localTable",
            "centerId",
            "subcenterId",
            "genProcess",
            "backProcess",
            "significanceOfReference",
        ] {
            counters.add(name);
        }
    }

    fn file(&mut self, ctx: &mut FileContext<'_>, out: &mut String, counters: &mut Counters) -> Result<()> {
        let mut first: Option<Identity> = None;

        for record in ctx.records() {
            let record = record?;
            let identity = match Identity::of(record) {
                Ok(identity) => identity,
                Err(e) => {
                    ctx.record_error(record, e);
                    continue;
                }
            };
            identity.count(counters);

            if identity.discipline == 255 {
                writeln!(out, "  bad discipline= {}", record_id(record))?;
            }
            match &first {
                None => first = Some(identity),
                Some(expected) => {
                    for (name, want, found) in expected.differences(&identity) {
                        writeln!(out, "  {name} {found} != {want} {}", record_id(record))?;
                    }
                }
            }
        }
        Ok(())
    }
}
