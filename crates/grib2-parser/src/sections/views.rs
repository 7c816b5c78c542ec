//! Typed accessors over decoded sections.
//!
//! Views borrow a [`Section`] and read named fields from it. They never
//! copy the section and fail with `InvalidField` when a field the template
//! should carry is absent.

use super::{Fields, Section, SectionKind};
use crate::error::{Grib2Error, Result};
use bytes::Bytes;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::fmt;

fn u8_field(fields: &Fields, name: &str) -> Result<u8> {
    Ok(fields.uint(name)? as u8)
}

fn check_kind(section: &Section, kind: SectionKind) {
    debug_assert_eq!(section.kind(), kind, "view over the wrong section kind");
}

/// Section 0.
#[derive(Debug, Clone, Copy)]
pub struct IndicatorView<'a>(&'a Section);

impl<'a> IndicatorView<'a> {
    pub fn new(section: &'a Section) -> Self {
        check_kind(section, SectionKind::Indicator);
        Self(section)
    }

    pub fn discipline(&self) -> Result<u8> {
        u8_field(self.0.fields(), "discipline")
    }

    pub fn edition(&self) -> Result<u8> {
        u8_field(self.0.fields(), "edition")
    }

    pub fn total_length(&self) -> Result<u64> {
        self.0.fields().uint("total_length")
    }
}

/// Section 1.
#[derive(Debug, Clone, Copy)]
pub struct IdentificationView<'a>(&'a Section);

impl<'a> IdentificationView<'a> {
    pub fn new(section: &'a Section) -> Self {
        check_kind(section, SectionKind::Identification);
        Self(section)
    }

    pub fn center(&self) -> Result<u16> {
        Ok(self.0.fields().uint("center")? as u16)
    }

    pub fn subcenter(&self) -> Result<u16> {
        Ok(self.0.fields().uint("subcenter")? as u16)
    }

    pub fn master_table_version(&self) -> Result<u8> {
        u8_field(self.0.fields(), "master_table_version")
    }

    pub fn local_table_version(&self) -> Result<u8> {
        u8_field(self.0.fields(), "local_table_version")
    }

    pub fn reference_significance(&self) -> Result<u8> {
        u8_field(self.0.fields(), "reference_significance")
    }

    pub fn production_status(&self) -> Result<u8> {
        u8_field(self.0.fields(), "production_status")
    }

    pub fn data_type(&self) -> Result<u8> {
        u8_field(self.0.fields(), "data_type")
    }

    pub fn reference_time(&self) -> Result<DateTime<Utc>> {
        let f = self.0.fields();
        naive_datetime(
            f.uint("year")? as i32,
            f.uint("month")? as u32,
            f.uint("day")? as u32,
            f.uint("hour")? as u32,
            f.uint("minute")? as u32,
            f.uint("second")? as u32,
        )
        .map(|t| t.and_utc())
        .ok_or_else(|| Grib2Error::invalid_field("reference_time", "not a valid date"))
    }
}

fn naive_datetime(
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
) -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)
}

/// Scanning mode flags (code table 3.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScanMode(pub u8);

impl ScanMode {
    pub const I_NEGATIVE: u8 = 0x80;
    pub const J_POSITIVE: u8 = 0x40;
    pub const J_CONSECUTIVE: u8 = 0x20;
    pub const BOUSTROPHEDON: u8 = 0x10;

    pub fn i_negative(self) -> bool {
        self.0 & Self::I_NEGATIVE != 0
    }

    pub fn j_positive(self) -> bool {
        self.0 & Self::J_POSITIVE != 0
    }

    pub fn j_consecutive(self) -> bool {
        self.0 & Self::J_CONSECUTIVE != 0
    }

    pub fn boustrophedon(self) -> bool {
        self.0 & Self::BOUSTROPHEDON != 0
    }
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:#04x} ({}i {}j {}{})",
            self.0,
            if self.i_negative() { "-" } else { "+" },
            if self.j_positive() { "+" } else { "-" },
            if self.j_consecutive() { "j-consecutive" } else { "i-consecutive" },
            if self.boustrophedon() { " boustrophedon" } else { "" },
        )
    }
}

/// Section 3.
#[derive(Debug, Clone, Copy)]
pub struct GridDefinitionView<'a>(&'a Section);

impl<'a> GridDefinitionView<'a> {
    pub fn new(section: &'a Section) -> Self {
        check_kind(section, SectionKind::GridDefinition);
        Self(section)
    }

    pub fn template(&self) -> u16 {
        self.0.template().unwrap_or_default()
    }

    pub fn template_name(&self) -> &'static str {
        super::template_name(SectionKind::GridDefinition, self.template())
    }

    pub fn data_point_count(&self) -> Result<u64> {
        self.0.fields().uint("data_point_count")
    }

    pub fn shape_of_earth(&self) -> Result<u8> {
        u8_field(self.0.fields(), "shape_of_earth")
    }

    /// Grid dimensions as `(ny, nx)`.
    pub fn shape(&self) -> Result<(usize, usize)> {
        let f = self.0.fields();
        let (nx, ny) = if f.get("ni").is_some() {
            (f.uint("ni")?, f.uint("nj")?)
        } else {
            (f.uint("nx")?, f.uint("ny")?)
        };
        Ok((ny as usize, nx as usize))
    }

    pub fn scan_mode(&self) -> Result<ScanMode> {
        Ok(ScanMode(u8_field(self.0.fields(), "scan_mode")?))
    }

    /// Latitude and longitude of the first grid point in degrees.
    pub fn first_point(&self) -> Result<(f64, f64)> {
        let f = self.0.fields();
        let unit = self.angle_unit();
        Ok((f.int("la1")? as f64 * unit, f.int("lo1")? as f64 * unit))
    }

    /// Latitude and longitude of the last grid point in degrees, for
    /// templates that store one.
    pub fn last_point(&self) -> Result<Option<(f64, f64)>> {
        let f = self.0.fields();
        if f.get("la2").is_none() {
            return Ok(None);
        }
        let unit = self.angle_unit();
        Ok(Some((f.int("la2")? as f64 * unit, f.int("lo2")? as f64 * unit)))
    }

    /// Longitude increment in degrees. Only the lat/lon family states it
    /// as an angle.
    pub fn i_increment(&self) -> Option<f64> {
        let f = self.0.fields();
        f.get("basic_angle")?;
        match f.get_uint("di")? {
            0 | 0xFFFF_FFFF => None,
            di => Some(di as f64 * self.angle_unit()),
        }
    }

    /// Degrees per stored angle unit: basic angle over subdivisions for the
    /// lat/lon family, micro-degrees otherwise or when either is 0 or missing.
    fn angle_unit(&self) -> f64 {
        let f = self.0.fields();
        match (
            f.get_uint("basic_angle"),
            f.get_uint("basic_angle_subdivisions"),
        ) {
            (Some(basic), Some(sub))
                if basic != 0 && sub != 0 && basic != 0xFFFF_FFFF && sub != 0xFFFF_FFFF =>
            {
                basic as f64 / sub as f64
            }
            _ => 1e-6,
        }
    }
}

/// One fixed surface (level) as stored: type, raw scale byte and raw value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceField {
    pub surface_type: u8,
    pub scale: u8,
    pub value: u32,
}

/// One statistical-processing time range of an interval template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub statistical_process: u8,
    pub increment_type: u8,
    pub range_unit: u8,
    pub range_length: u32,
    pub increment_unit: u8,
    pub increment: u32,
}

/// Section 4.
#[derive(Debug, Clone, Copy)]
pub struct ProductDefinitionView<'a>(&'a Section);

impl<'a> ProductDefinitionView<'a> {
    pub fn new(section: &'a Section) -> Self {
        check_kind(section, SectionKind::ProductDefinition);
        Self(section)
    }

    pub fn section(&self) -> &'a Section {
        self.0
    }

    pub fn template(&self) -> u16 {
        self.0.template().unwrap_or_default()
    }

    pub fn template_name(&self) -> &'static str {
        super::template_name(SectionKind::ProductDefinition, self.template())
    }

    pub fn parameter_category(&self) -> Result<u8> {
        u8_field(self.0.fields(), "parameter_category")
    }

    pub fn parameter_number(&self) -> Result<u8> {
        u8_field(self.0.fields(), "parameter_number")
    }

    pub fn generating_process_type(&self) -> Result<u8> {
        u8_field(self.0.fields(), "generating_process_type")
    }

    pub fn background_process_id(&self) -> Result<u8> {
        u8_field(self.0.fields(), "background_process_id")
    }

    pub fn generating_process_id(&self) -> Result<u8> {
        u8_field(self.0.fields(), "generating_process_id")
    }

    /// Raw code of the forecast time unit (code table 4.4).
    pub fn time_unit(&self) -> Result<u8> {
        u8_field(self.0.fields(), "time_unit")
    }

    pub fn forecast_time(&self) -> Result<i64> {
        self.0.fields().int("forecast_time")
    }

    pub fn first_surface(&self) -> Result<SurfaceField> {
        self.surface(1)
    }

    pub fn second_surface(&self) -> Result<SurfaceField> {
        self.surface(2)
    }

    fn surface(&self, n: u8) -> Result<SurfaceField> {
        let f = self.0.fields();
        Ok(SurfaceField {
            surface_type: f.uint(&format!("level_type{n}"))? as u8,
            scale: f.uint(&format!("level_scale{n}"))? as u8,
            value: f.uint(&format!("level_value{n}"))? as u32,
        })
    }

    /// Number of vertical coordinate values following the template.
    pub fn coordinate_count(&self) -> Result<u16> {
        Ok(self.0.fields().uint("coordinate_count")? as u16)
    }

    pub fn coordinates(&self) -> Result<Vec<f32>> {
        (0..self.coordinate_count()?)
            .map(|i| self.0.fields().float(&format!("coordinate[{i}]")))
            .collect()
    }

    pub fn is_interval(&self) -> bool {
        self.0.fields().get("time_range_count").is_some()
    }

    pub fn is_probability(&self) -> bool {
        self.0.fields().get("probability_type").is_some()
    }

    pub fn is_ensemble(&self) -> bool {
        self.0.fields().get("perturbation_number").is_some()
    }

    pub fn probability_type(&self) -> Option<u8> {
        self.0.fields().get_uint("probability_type").map(|v| v as u8)
    }

    pub fn derived_type(&self) -> Option<u8> {
        self.0.fields().get_uint("derived_type").map(|v| v as u8)
    }

    pub fn perturbation_number(&self) -> Option<u8> {
        self.0.fields().get_uint("perturbation_number").map(|v| v as u8)
    }

    /// Time ranges of an interval template, outermost first. Empty for
    /// point-in-time templates.
    pub fn time_ranges(&self) -> Result<Vec<TimeRange>> {
        let f = self.0.fields();
        let Some(count) = f.get_uint("time_range_count") else {
            return Ok(Vec::new());
        };
        (0..count)
            .map(|i| {
                Ok(TimeRange {
                    statistical_process: f.uint(&format!("statistical_process[{i}]"))? as u8,
                    increment_type: f.uint(&format!("time_increment_type[{i}]"))? as u8,
                    range_unit: f.uint(&format!("time_range_unit[{i}]"))? as u8,
                    range_length: f.uint(&format!("time_range_length[{i}]"))? as u32,
                    increment_unit: f.uint(&format!("time_increment_unit[{i}]"))? as u8,
                    increment: f.uint(&format!("time_increment[{i}]"))? as u32,
                })
            })
            .collect()
    }

    /// End of the overall time interval as stated in the section, if this is
    /// an interval template and the stated date is valid.
    pub fn interval_end(&self) -> Option<NaiveDateTime> {
        let f = self.0.fields();
        naive_datetime(
            f.get_uint("end_year")? as i32,
            f.get_uint("end_month")? as u32,
            f.get_uint("end_day")? as u32,
            f.get_uint("end_hour")? as u32,
            f.get_uint("end_minute")? as u32,
            f.get_uint("end_second")? as u32,
        )
    }
}

/// Simple packing parameters shared by templates 5.0, 5.2, 5.3, 5.40 and 5.41.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimplePacking {
    pub reference_value: f32,
    pub binary_scale_factor: i16,
    pub decimal_scale_factor: i16,
    pub bits_per_value: u8,
    pub original_field_type: u8,
}

/// Complex packing parameters (templates 5.2, 5.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComplexPacking {
    pub group_splitting_method: u8,
    pub missing_value_management: u8,
    pub primary_missing_substitute: u32,
    pub secondary_missing_substitute: u32,
    pub group_count: u32,
    pub group_width_reference: u8,
    pub group_width_bits: u8,
    pub group_length_reference: u32,
    pub group_length_increment: u8,
    pub last_group_length: u32,
    pub group_length_bits: u8,
}

/// Spatial differencing parameters (template 5.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpatialDifferencing {
    pub order: u8,
    pub extra_descriptor_octets: u8,
}

/// Section 5.
#[derive(Debug, Clone, Copy)]
pub struct DataRepresentationView<'a>(&'a Section);

impl<'a> DataRepresentationView<'a> {
    pub fn new(section: &'a Section) -> Self {
        check_kind(section, SectionKind::DataRepresentation);
        Self(section)
    }

    pub fn template(&self) -> u16 {
        self.0.template().unwrap_or_default()
    }

    pub fn template_name(&self) -> &'static str {
        super::template_name(SectionKind::DataRepresentation, self.template())
    }

    /// Number of values packed in the data section.
    pub fn data_point_count(&self) -> Result<u64> {
        self.0.fields().uint("data_point_count")
    }

    pub fn simple(&self) -> Result<SimplePacking> {
        let f = self.0.fields();
        Ok(SimplePacking {
            reference_value: f.float("reference_value")?,
            binary_scale_factor: f.int("binary_scale_factor")? as i16,
            decimal_scale_factor: f.int("decimal_scale_factor")? as i16,
            bits_per_value: f.uint("bits_per_value")? as u8,
            original_field_type: f.uint("original_field_type")? as u8,
        })
    }

    pub fn complex(&self) -> Result<ComplexPacking> {
        let f = self.0.fields();
        Ok(ComplexPacking {
            group_splitting_method: u8_field(f, "group_splitting_method")?,
            missing_value_management: u8_field(f, "missing_value_management")?,
            primary_missing_substitute: f.uint("primary_missing_substitute")? as u32,
            secondary_missing_substitute: f.uint("secondary_missing_substitute")? as u32,
            group_count: f.uint("group_count")? as u32,
            group_width_reference: u8_field(f, "group_width_reference")?,
            group_width_bits: u8_field(f, "group_width_bits")?,
            group_length_reference: f.uint("group_length_reference")? as u32,
            group_length_increment: u8_field(f, "group_length_increment")?,
            last_group_length: f.uint("last_group_length")? as u32,
            group_length_bits: u8_field(f, "group_length_bits")?,
        })
    }

    pub fn spatial_differencing(&self) -> Result<SpatialDifferencing> {
        let f = self.0.fields();
        Ok(SpatialDifferencing {
            order: u8_field(f, "spatial_difference_order")?,
            extra_descriptor_octets: u8_field(f, "extra_descriptor_octets")?,
        })
    }

    /// IEEE precision code (1 = 32-bit, 2 = 64-bit, 3 = 128-bit).
    pub fn ieee_precision(&self) -> Result<u8> {
        u8_field(self.0.fields(), "precision")
    }

    /// Bits used per packed value, when the template states one.
    pub fn bits_per_value(&self) -> Option<u8> {
        let f = self.0.fields();
        match f.get_uint("precision") {
            Some(1) => Some(32),
            Some(2) => Some(64),
            Some(3) => Some(128),
            Some(_) => None,
            None => f.get_uint("bits_per_value").map(|b| b as u8),
        }
    }
}

/// Section 6.
#[derive(Debug, Clone, Copy)]
pub struct BitmapView<'a>(&'a Section);

impl<'a> BitmapView<'a> {
    pub fn new(section: &'a Section) -> Self {
        check_kind(section, SectionKind::Bitmap);
        Self(section)
    }

    /// 0 = bitmap follows, 254 = previous bitmap applies, 255 = no bitmap.
    pub fn indicator(&self) -> Result<u8> {
        u8_field(self.0.fields(), "bitmap_indicator")
    }

    pub fn bits(&self) -> Bytes {
        self.0
            .fields()
            .get_bytes("bitmap")
            .cloned()
            .unwrap_or_default()
    }

    /// Whether point `index` carries a value.
    pub fn is_set(bits: &[u8], index: usize) -> bool {
        bits.get(index / 8)
            .map(|byte| byte & (0x80 >> (index % 8)) != 0)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_mode_flags() {
        let mode = ScanMode(0x40);
        assert!(!mode.i_negative());
        assert!(mode.j_positive());
        assert!(!mode.j_consecutive());
        assert_eq!(mode.to_string(), "0x40 (+i +j i-consecutive)");
        assert!(ScanMode(0x90).boustrophedon());
    }

    #[test]
    fn test_bitmap_bits() {
        let bits = [0b1010_0000u8];
        assert!(BitmapView::is_set(&bits, 0));
        assert!(!BitmapView::is_set(&bits, 1));
        assert!(BitmapView::is_set(&bits, 2));
        assert!(!BitmapView::is_set(&bits, 9));
    }
}
