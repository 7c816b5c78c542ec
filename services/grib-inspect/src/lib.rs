//! Library half of the `grib-inspect` command, kept separate so the
//! subcommands can be tested directly.

pub mod commands;
pub mod config;
pub mod files;

pub use config::{InspectConfig, LogFormat};
