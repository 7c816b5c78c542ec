//! Static layout tables for the supported section templates.
//!
//! Adding a template means adding one [`TemplateLayout`] entry to the
//! matching registry; nothing else dispatches on template numbers while
//! decoding or encoding.

use super::layout::Field::{self, *};
use super::{Fields, SectionKind};

/// Layout of one template body, stored as a sequence of shared blocks.
#[derive(Debug)]
pub struct TemplateLayout {
    pub kind: SectionKind,
    pub number: u16,
    pub name: &'static str,
    pub parts: &'static [&'static [Field]],
}

// Section 0 and 1 -------------------------------------------------------------

pub(crate) const INDICATOR: &[Field] = &[
    Bytes("marker", 4),
    U16("reserved"),
    U8("discipline"),
    U8("edition"),
    U64("total_length"),
];

pub(crate) const IDENTIFICATION: &[Field] = &[
    U16("center"),
    U16("subcenter"),
    U8("master_table_version"),
    U8("local_table_version"),
    U8("reference_significance"),
    U16("year"),
    U8("month"),
    U8("day"),
    U8("hour"),
    U8("minute"),
    U8("second"),
    U8("production_status"),
    U8("data_type"),
];

pub(crate) const IDENTIFICATION_RESERVED: &[Field] = &[Rest("reserved")];
pub(crate) const LOCAL_USE: &[Field] = &[Rest("local_use")];
pub(crate) const BITMAP: &[Field] = &[U8("bitmap_indicator"), Rest("bitmap")];
pub(crate) const DATA: &[Field] = &[Rest("data")];

// Section 3 -------------------------------------------------------------------

pub(crate) const GRID_HEADER: &[Field] = &[
    U8("source"),
    U32("data_point_count"),
    U8("optional_list_octets"),
    U8("optional_list_interpretation"),
    U16("template"),
];

const GRID_OPTIONAL_LIST: &[Field] = &[Rest("optional_list")];

const EARTH_SHAPE: &[Field] = &[
    U8("shape_of_earth"),
    U8("earth_radius_scale"),
    U32("earth_radius_value"),
    U8("major_axis_scale"),
    U32("major_axis_value"),
    U8("minor_axis_scale"),
    U32("minor_axis_value"),
];

const LAT_LON: &[Field] = &[
    U32("ni"),
    U32("nj"),
    U32("basic_angle"),
    U32("basic_angle_subdivisions"),
    I32("la1"),
    I32("lo1"),
    U8("resolution_flags"),
    I32("la2"),
    I32("lo2"),
    U32("di"),
    U32("dj"),
    U8("scan_mode"),
];

const ROTATION: &[Field] = &[
    I32("south_pole_lat"),
    I32("south_pole_lon"),
    F32("rotation_angle"),
];

const MERCATOR: &[Field] = &[
    U32("ni"),
    U32("nj"),
    I32("la1"),
    I32("lo1"),
    U8("resolution_flags"),
    I32("lad"),
    I32("la2"),
    I32("lo2"),
    U8("scan_mode"),
    U32("orientation"),
    U32("di"),
    U32("dj"),
];

const POLAR_STEREOGRAPHIC: &[Field] = &[
    U32("nx"),
    U32("ny"),
    I32("la1"),
    I32("lo1"),
    U8("resolution_flags"),
    I32("lad"),
    I32("lov"),
    U32("dx"),
    U32("dy"),
    U8("projection_centre"),
    U8("scan_mode"),
];

const LAMBERT_SECANTS: &[Field] = &[
    I32("latin1"),
    I32("latin2"),
    I32("south_pole_lat"),
    I32("south_pole_lon"),
];

const GAUSSIAN: &[Field] = &[
    U32("ni"),
    U32("nj"),
    U32("basic_angle"),
    U32("basic_angle_subdivisions"),
    I32("la1"),
    I32("lo1"),
    U8("resolution_flags"),
    I32("la2"),
    I32("lo2"),
    U32("di"),
    U32("n_parallels"),
    U8("scan_mode"),
];

static GRID_TEMPLATES: &[TemplateLayout] = &[
    TemplateLayout {
        kind: SectionKind::GridDefinition,
        number: 0,
        name: "Latitude/longitude",
        parts: &[EARTH_SHAPE, LAT_LON],
    },
    TemplateLayout {
        kind: SectionKind::GridDefinition,
        number: 1,
        name: "Rotated latitude/longitude",
        parts: &[EARTH_SHAPE, LAT_LON, ROTATION],
    },
    TemplateLayout {
        kind: SectionKind::GridDefinition,
        number: 10,
        name: "Mercator",
        parts: &[EARTH_SHAPE, MERCATOR],
    },
    TemplateLayout {
        kind: SectionKind::GridDefinition,
        number: 20,
        name: "Polar stereographic",
        parts: &[EARTH_SHAPE, POLAR_STEREOGRAPHIC],
    },
    TemplateLayout {
        kind: SectionKind::GridDefinition,
        number: 30,
        name: "Lambert conformal",
        parts: &[EARTH_SHAPE, POLAR_STEREOGRAPHIC, LAMBERT_SECANTS],
    },
    TemplateLayout {
        kind: SectionKind::GridDefinition,
        number: 40,
        name: "Gaussian latitude/longitude",
        parts: &[EARTH_SHAPE, GAUSSIAN],
    },
];

// Section 4 -------------------------------------------------------------------

pub(crate) const PRODUCT_HEADER: &[Field] = &[U16("coordinate_count"), U16("template")];

const PRODUCT_COORDINATES: &[Field] = &[Repeat {
    count: "coordinate_count",
    fields: &[F32("coordinate")],
}];

const POINT_IN_TIME: &[Field] = &[
    U8("parameter_category"),
    U8("parameter_number"),
    U8("generating_process_type"),
    U8("background_process_id"),
    U8("generating_process_id"),
    U16("cutoff_hours"),
    U8("cutoff_minutes"),
    U8("time_unit"),
    I32("forecast_time"),
    U8("level_type1"),
    U8("level_scale1"),
    U32("level_value1"),
    U8("level_type2"),
    U8("level_scale2"),
    U32("level_value2"),
];

const ENSEMBLE: &[Field] = &[
    U8("ensemble_type"),
    U8("perturbation_number"),
    U8("ensemble_size"),
];

const DERIVED: &[Field] = &[U8("derived_type"), U8("ensemble_size")];

const PROBABILITY: &[Field] = &[
    U8("probability_number"),
    U8("probability_count"),
    U8("probability_type"),
    I8("lower_limit_scale"),
    I32("lower_limit_value"),
    I8("upper_limit_scale"),
    I32("upper_limit_value"),
];

const TIME_RANGE: &[Field] = &[
    U8("statistical_process"),
    U8("time_increment_type"),
    U8("time_range_unit"),
    U32("time_range_length"),
    U8("time_increment_unit"),
    U32("time_increment"),
];

const INTERVAL: &[Field] = &[
    U16("end_year"),
    U8("end_month"),
    U8("end_day"),
    U8("end_hour"),
    U8("end_minute"),
    U8("end_second"),
    U8("time_range_count"),
    U32("missing_in_statistics"),
    Repeat {
        count: "time_range_count",
        fields: TIME_RANGE,
    },
];

static PRODUCT_TEMPLATES: &[TemplateLayout] = &[
    TemplateLayout {
        kind: SectionKind::ProductDefinition,
        number: 0,
        name: "Analysis or forecast at a point in time",
        parts: &[POINT_IN_TIME],
    },
    TemplateLayout {
        kind: SectionKind::ProductDefinition,
        number: 1,
        name: "Individual ensemble forecast",
        parts: &[POINT_IN_TIME, ENSEMBLE],
    },
    TemplateLayout {
        kind: SectionKind::ProductDefinition,
        number: 2,
        name: "Derived forecast from all ensemble members",
        parts: &[POINT_IN_TIME, DERIVED],
    },
    TemplateLayout {
        kind: SectionKind::ProductDefinition,
        number: 5,
        name: "Probability forecast",
        parts: &[POINT_IN_TIME, PROBABILITY],
    },
    TemplateLayout {
        kind: SectionKind::ProductDefinition,
        number: 8,
        name: "Average, accumulation or extreme over a time interval",
        parts: &[POINT_IN_TIME, INTERVAL],
    },
    TemplateLayout {
        kind: SectionKind::ProductDefinition,
        number: 9,
        name: "Probability forecast over a time interval",
        parts: &[POINT_IN_TIME, PROBABILITY, INTERVAL],
    },
    TemplateLayout {
        kind: SectionKind::ProductDefinition,
        number: 11,
        name: "Individual ensemble forecast over a time interval",
        parts: &[POINT_IN_TIME, ENSEMBLE, INTERVAL],
    },
    TemplateLayout {
        kind: SectionKind::ProductDefinition,
        number: 12,
        name: "Derived ensemble forecast over a time interval",
        parts: &[POINT_IN_TIME, DERIVED, INTERVAL],
    },
];

// Section 5 -------------------------------------------------------------------

pub(crate) const DATA_HEADER: &[Field] = &[U32("data_point_count"), U16("template")];

const SIMPLE: &[Field] = &[
    F32("reference_value"),
    I16("binary_scale_factor"),
    I16("decimal_scale_factor"),
    U8("bits_per_value"),
    U8("original_field_type"),
];

const COMPLEX: &[Field] = &[
    U8("group_splitting_method"),
    U8("missing_value_management"),
    U32("primary_missing_substitute"),
    U32("secondary_missing_substitute"),
    U32("group_count"),
    U8("group_width_reference"),
    U8("group_width_bits"),
    U32("group_length_reference"),
    U8("group_length_increment"),
    U32("last_group_length"),
    U8("group_length_bits"),
];

const SPATIAL_DIFFERENCING: &[Field] = &[
    U8("spatial_difference_order"),
    U8("extra_descriptor_octets"),
];

const IEEE: &[Field] = &[U8("precision")];

const JPEG2000: &[Field] = &[U8("compression_type"), U8("compression_ratio")];

static DATA_TEMPLATES: &[TemplateLayout] = &[
    TemplateLayout {
        kind: SectionKind::DataRepresentation,
        number: 0,
        name: "Grid point data - simple packing",
        parts: &[SIMPLE],
    },
    TemplateLayout {
        kind: SectionKind::DataRepresentation,
        number: 2,
        name: "Grid point data - complex packing",
        parts: &[SIMPLE, COMPLEX],
    },
    TemplateLayout {
        kind: SectionKind::DataRepresentation,
        number: 3,
        name: "Grid point data - complex packing and spatial differencing",
        parts: &[SIMPLE, COMPLEX, SPATIAL_DIFFERENCING],
    },
    TemplateLayout {
        kind: SectionKind::DataRepresentation,
        number: 4,
        name: "Grid point data - IEEE floating point",
        parts: &[IEEE],
    },
    TemplateLayout {
        kind: SectionKind::DataRepresentation,
        number: 40,
        name: "Grid point data - JPEG 2000 code stream",
        parts: &[SIMPLE, JPEG2000],
    },
    TemplateLayout {
        kind: SectionKind::DataRepresentation,
        number: 41,
        name: "Grid point data - PNG",
        parts: &[SIMPLE],
    },
];

/// All templates known for a section kind (empty for kinds without templates).
pub fn registry(kind: SectionKind) -> &'static [TemplateLayout] {
    match kind {
        SectionKind::GridDefinition => GRID_TEMPLATES,
        SectionKind::ProductDefinition => PRODUCT_TEMPLATES,
        SectionKind::DataRepresentation => DATA_TEMPLATES,
        _ => &[],
    }
}

pub fn lookup(kind: SectionKind, number: u16) -> Option<&'static TemplateLayout> {
    registry(kind).iter().find(|t| t.number == number)
}

/// Fixed fields preceding the template body, `template` included.
pub(crate) fn header(kind: SectionKind) -> &'static [Field] {
    match kind {
        SectionKind::GridDefinition => GRID_HEADER,
        SectionKind::ProductDefinition => PRODUCT_HEADER,
        SectionKind::DataRepresentation => DATA_HEADER,
        _ => &[],
    }
}

/// Variable-length fields following the template body.
pub(crate) fn trailer(kind: SectionKind, header: &Fields) -> &'static [Field] {
    match kind {
        SectionKind::GridDefinition
            if header.get_uint("optional_list_octets").unwrap_or(0) != 0 =>
        {
            GRID_OPTIONAL_LIST
        }
        SectionKind::ProductDefinition => PRODUCT_COORDINATES,
        _ => &[],
    }
}

/// Name of a template, or a generic label for unknown numbers.
pub fn template_name(kind: SectionKind, number: u16) -> &'static str {
    lookup(kind, number).map(|t| t.name).unwrap_or("unknown template")
}
