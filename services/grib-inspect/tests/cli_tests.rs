//! End-to-end tests of the grib-inspect subcommands over synthetic files.

use grib2_report::ReportKind;
use grib_inspect::commands;
use grib_inspect::files::collect_files;
use grib_inspect::InspectConfig;
use std::path::PathBuf;
use test_utils::{temp_test_dir, write_test_file, Grib2Builder};

fn collection(dir: &std::path::Path) -> Vec<PathBuf> {
    write_test_file(dir, "a.grib2", &Grib2Builder::new_gfs().build());
    write_test_file(
        dir,
        "b.grib2",
        &Grib2Builder::new_row(4).with_data(vec![1.0, 2.0, 3.0, 4.0]).build(),
    );
    write_test_file(dir, "readme.txt", b"not grib");
    collect_files(&[dir.to_path_buf()], &InspectConfig::default().extensions, true).unwrap()
}

#[test]
fn test_index_writes_sidecar_then_reuses_it() {
    let dir = temp_test_dir();
    let files = collection(dir.path());
    assert_eq!(files.len(), 2);
    let sidecar = dir.path().join("collection.idx.json");
    let config = InspectConfig::default();

    let first = commands::index(&files, &sidecar, &config).unwrap();
    assert!(sidecar.exists());
    assert!(first.contains("files=2 records=2 unique grids=2 rescanned=2"));

    let second = commands::index(&files, &sidecar, &config).unwrap();
    assert!(second.contains("rescanned=0"));
}

#[test]
fn test_forced_index_rescans() {
    let dir = temp_test_dir();
    let files = collection(dir.path());
    let sidecar = dir.path().join("collection.idx.json");
    let mut config = InspectConfig::default();
    commands::index(&files, &sidecar, &config).unwrap();

    config.index.force = true;
    let text = commands::index(&files, &sidecar, &config).unwrap();
    assert!(text.contains("rescanned=2"));
}

#[test]
fn test_report_over_collection() {
    let dir = temp_test_dir();
    let files = collection(dir.path());
    let mut config = InspectConfig::default();
    config.report.use_index = false;

    let text = commands::report(ReportKind::GribIndex, &files, &config).unwrap();
    assert!(text.contains("a.grib2"));
    assert!(text.contains("b.grib2"));
    assert!(text.contains("GDS"));
}

#[test]
fn test_report_kind_parses_case_insensitively() {
    assert_eq!(
        "uniquetemplates".parse::<ReportKind>().unwrap(),
        ReportKind::UniqueTemplates
    );
    assert!("bogus".parse::<ReportKind>().is_err());
}

#[test]
fn test_unpack_prints_stats_and_values() {
    let dir = temp_test_dir();
    let path = write_test_file(
        dir.path(),
        "row.grib2",
        &Grib2Builder::new_row(4).with_data(vec![1.0, 2.0, 3.0, 4.0]).build(),
    );

    let text = commands::unpack(&path, 0, 2, &InspectConfig::default()).unwrap();
    assert!(text.contains("shape=1x4"));
    assert!(text.contains("valid=4 missing=0 min=1 max=4"));
    assert!(text.contains("values: 1 2"));
}

#[test]
fn test_config_file_loaded() {
    let dir = temp_test_dir();
    let path = write_test_file(
        dir.path(),
        "inspect.yaml",
        b"extensions: [grb2]\nrecursive: false\nreport:\n  each_file: true\n",
    );

    let config = InspectConfig::load(Some(&path)).unwrap();
    assert_eq!(config.extensions, vec!["grb2".to_string()]);
    assert!(!config.recursive);
    assert!(config.report.each_file);
}

#[test]
fn test_config_file_errors_name_the_file() {
    let dir = temp_test_dir();
    let path = write_test_file(dir.path(), "bad.yaml", b"recursive: [not a bool\n");
    let err = InspectConfig::load(Some(&path)).unwrap_err();
    assert!(format!("{err:#}").contains("bad.yaml"));
}
