//! GRIB2 parameter and level lookup tables.
//!
//! Translates numeric codes into short names and level descriptions. The
//! built-in [`Grib2Tables::standard`] table covers the common WMO entries;
//! callers can add their own (centre-local) entries on top.

use std::collections::HashMap;

/// Lookup key for parameter: (discipline, category, number)
pub type ParamKey = (u8, u8, u8);

/// Category and number values from 192 up are reserved for local use.
pub const LOCAL_USE_START: u8 = 192;

/// Whether a parameter code falls in the locally defined range.
pub fn is_local_parameter(category: u8, number: u8) -> bool {
    category >= LOCAL_USE_START || number >= LOCAL_USE_START
}

/// Level description - either static text or a template with {value} placeholder
#[derive(Debug, Clone)]
pub enum LevelDescription {
    /// Static description (e.g., "surface", "mean sea level")
    Static(String),
    /// Template with {value} placeholder (e.g., "{value} m above ground")
    Template(String),
}

impl LevelDescription {
    /// Format the level description, substituting placeholders if it's a template.
    ///
    /// Supported placeholders:
    /// - `{value}` - Level value as extracted (e.g., 50000 for 500 mb in Pa)
    /// - `{value_mb}` - Value converted from Pa to mb (divided by 100)
    pub fn format(&self, value: f64) -> String {
        match self {
            LevelDescription::Static(s) => s.clone(),
            LevelDescription::Template(t) => t
                .replace("{value}", &value.to_string())
                .replace("{value_mb}", &(value / 100.0).to_string()),
        }
    }
}

const STANDARD_PARAMETERS: &[(ParamKey, &str)] = &[
    ((0, 0, 0), "TMP"),
    ((0, 0, 1), "VTMP"),
    ((0, 0, 2), "POT"),
    ((0, 0, 4), "TMAX"),
    ((0, 0, 5), "TMIN"),
    ((0, 0, 6), "DPT"),
    ((0, 1, 0), "SPFH"),
    ((0, 1, 1), "RH"),
    ((0, 1, 3), "PWAT"),
    ((0, 1, 7), "PRATE"),
    ((0, 1, 8), "APCP"),
    ((0, 1, 9), "NCPCP"),
    ((0, 1, 10), "ACPCP"),
    ((0, 1, 11), "SNOD"),
    ((0, 2, 0), "WDIR"),
    ((0, 2, 1), "WIND"),
    ((0, 2, 2), "UGRD"),
    ((0, 2, 3), "VGRD"),
    ((0, 2, 8), "VVEL"),
    ((0, 2, 10), "ABSV"),
    ((0, 2, 22), "GUST"),
    ((0, 3, 0), "PRES"),
    ((0, 3, 1), "PRMSL"),
    ((0, 3, 5), "HGT"),
    ((0, 6, 1), "TCDC"),
    ((0, 6, 3), "LCDC"),
    ((0, 6, 4), "MCDC"),
    ((0, 6, 5), "HCDC"),
    ((0, 6, 6), "CWAT"),
    ((0, 7, 6), "CAPE"),
    ((0, 7, 7), "CIN"),
    ((0, 7, 8), "HLCY"),
    ((0, 19, 0), "VIS"),
    ((0, 19, 2), "TSTM"),
    ((0, 19, 11), "TKE"),
    ((2, 0, 0), "LAND"),
    ((10, 0, 3), "HTSGW"),
    ((10, 3, 0), "WTMP"),
];

const STANDARD_LEVELS: &[(u8, &str)] = &[
    (1, "surface"),
    (2, "cloud base"),
    (3, "cloud top"),
    (4, "0C isotherm"),
    (5, "adiabatic condensation level"),
    (6, "max wind"),
    (7, "tropopause"),
    (8, "top of atmosphere"),
    (10, "entire atmosphere"),
    (100, "{value_mb} mb"),
    (101, "mean sea level"),
    (102, "{value} m above mean sea level"),
    (103, "{value} m above ground"),
    (104, "sigma level {value}"),
    (105, "hybrid level {value}"),
    (106, "{value} m below land surface"),
    (107, "isentropic level {value} K"),
    (108, "{value_mb} mb above ground"),
    (109, "potential vorticity level {value}"),
    (160, "{value} m below sea level"),
    (200, "entire atmosphere"),
];

/// GRIB2 parameter and level lookup tables.
#[derive(Debug, Clone, Default)]
pub struct Grib2Tables {
    /// (discipline, category, number) -> parameter short name (e.g., "TMP", "UGRD")
    parameters: HashMap<ParamKey, String>,
    /// level_type -> description pattern
    levels: HashMap<u8, LevelDescription>,
}

impl Grib2Tables {
    /// Create empty tables
    pub fn new() -> Self {
        Self::default()
    }

    /// Tables with the common WMO parameters and fixed surface types.
    pub fn standard() -> Self {
        let mut tables = Self::new();
        for &((discipline, category, number), name) in STANDARD_PARAMETERS {
            tables.add_parameter(discipline, category, number, name.to_string());
        }
        for &(level_type, pattern) in STANDARD_LEVELS {
            let description = if pattern.contains('{') {
                LevelDescription::Template(pattern.to_string())
            } else {
                LevelDescription::Static(pattern.to_string())
            };
            tables.add_level(level_type, description);
        }
        tables
    }

    /// Add a parameter mapping
    pub fn add_parameter(&mut self, discipline: u8, category: u8, number: u8, name: String) {
        self.parameters.insert((discipline, category, number), name);
    }

    /// Add a level description mapping
    pub fn add_level(&mut self, level_type: u8, description: LevelDescription) {
        self.levels.insert(level_type, description);
    }

    pub fn has_parameter(&self, discipline: u8, category: u8, number: u8) -> bool {
        self.parameters.contains_key(&(discipline, category, number))
    }

    /// Look up parameter short name by GRIB2 codes.
    ///
    /// Returns "P{discipline}_{category}_{number}" if not found.
    pub fn get_parameter_name(&self, discipline: u8, category: u8, number: u8) -> String {
        self.parameters
            .get(&(discipline, category, number))
            .cloned()
            .unwrap_or_else(|| format!("P{}_{}_{}", discipline, category, number))
    }

    /// Look up level description by type code and value.
    ///
    /// Returns "Level type {type} value {value}" if not found.
    pub fn get_level_description(&self, level_type: u8, level_value: f64) -> String {
        match self.levels.get(&level_type) {
            Some(desc) => desc.format(level_value),
            None => format!("Level type {} value {}", level_type, level_value),
        }
    }

    /// Get the number of parameters in the table
    pub fn parameter_count(&self) -> usize {
        self.parameters.len()
    }

    /// Get the number of level types in the table
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Check if the tables are empty
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty() && self.levels.is_empty()
    }
}
