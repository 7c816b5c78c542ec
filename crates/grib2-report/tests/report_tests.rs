//! Report engine tests over synthetic GRIB2 collections.

use grib2_report::{
    sidecar_path, CancelFlag, Counters, Report, ReportEngine, ReportError, ReportKind,
    ReportOptions, DEFAULT_INDEX_SUFFIX,
};
use std::path::{Path, PathBuf};
use test_utils::{
    temp_test_dir, write_test_file, Grib2Builder, IntervalSpec, Packing, TimeRangeSpec,
};

fn scan_options() -> ReportOptions {
    ReportOptions {
        use_index: false,
        ..Default::default()
    }
}

fn run(kind: ReportKind, files: &[PathBuf], options: &ReportOptions) -> Report {
    ReportEngine::default()
        .run(kind, files, options, Counters::new())
        .unwrap()
}

fn accumulation(statistical_process: u8, length: u32, end_hour: u8) -> IntervalSpec {
    IntervalSpec {
        end: (2025, 12, 10, end_hour, 0, 0),
        ranges: vec![TimeRangeSpec {
            statistical_process,
            increment_type: 2,
            range_unit: 1,
            range_length: length,
            increment_unit: 255,
            increment: 0,
        }],
    }
}

fn concat(messages: &[Grib2Builder]) -> Vec<u8> {
    messages.iter().flat_map(|m| m.build()).collect()
}

fn file(dir: &Path, name: &str, messages: &[Grib2Builder]) -> PathBuf {
    write_test_file(dir, name, &concat(messages))
}

#[test]
fn test_grib_index_counts_gds() {
    let dir = temp_test_dir();
    let files = vec![
        file(dir.path(), "a.grib2", &[Grib2Builder::new_gfs(), Grib2Builder::new_gfs()]),
        file(dir.path(), "b.grib2", &[Grib2Builder::new_row(5)]),
    ];
    let options = ReportOptions {
        each_file: true,
        ..scan_options()
    };

    let report = run(ReportKind::GribIndex, &files, &options);
    assert!(report.text.starts_with("GDS count vs unique GDS hashes\n"));
    assert!(report.text.contains("   count=2 countHash=1\n"));
    assert!(report.text.contains("   count=1 countHash=1\n"));
    // each-file mode resets after every file
    assert!(report.counters.is_empty());
}

#[test]
fn test_unique_templates_lists_files() {
    let dir = temp_test_dir();
    let files = vec![
        file(
            dir.path(),
            "a.grib2",
            &[
                Grib2Builder::new_gfs(),
                Grib2Builder::new_gfs().with_interval(accumulation(1, 6, 18)),
            ],
        ),
        file(dir.path(), "b.grib2", &[Grib2Builder::new_gfs()]),
    ];

    let report = run(ReportKind::UniqueTemplates, &files, &scan_options());
    let pds8 = report.text.find("template= 8").unwrap();
    let after = &report.text[pds8..];
    assert!(after.contains(&format!("      1 {}", files[0].display())));
    assert!(report.text.contains(&format!("      1 {}", files[1].display())));
    assert!(report.text.contains("DRS"));
}

#[test]
fn test_duplicate_pds() {
    let dir = temp_test_dir();
    let files = vec![file(
        dir.path(),
        "dup.grib2",
        &[
            Grib2Builder::new_gfs(),
            Grib2Builder::new_gfs().with_gradient(0.0, 1.0),
            Grib2Builder::new_gfs().with_parameter(2, 2),
        ],
    )];

    let report = run(ReportKind::DuplicatePds, &files, &scan_options());
    assert!(report.text.contains("PDS duplicates = 1 / 3 for"));
    assert!(report.text.contains("Total PDS duplicates = 1 / 3"));
    assert_eq!(report.counters.value("pdsDuplicates", "dup.grib2"), 1);
}

#[test]
fn test_drs_summary() {
    let dir = temp_test_dir();
    let files = vec![file(
        dir.path(),
        "drs.grib2",
        &[
            Grib2Builder::new_row(4).with_data(vec![1.0, 2.0, 3.0, 4.0]),
            Grib2Builder::new_row(4).with_packing(Packing::Ieee(vec![1.0, 2.0, 3.0, 4.0])),
        ],
    )];

    let report = run(ReportKind::DrsSummary, &files, &scan_options());
    let c = &report.counters;
    assert_eq!(c.value("DRS_template", 0u16), 1);
    assert_eq!(c.value("DRS_template", 4u16), 1);
    assert_eq!(c.value("BMS indicator", 255u8), 2);
    assert_eq!(c.value("Number_of_Bits", 16u8), 1);
    assert_eq!(c.value("Number_of_Bits", 32u8), 1);
    assert!(report.text.contains("percent = 1.000000 nrecords = 2"));
}

#[test]
fn test_gds_summary_scan_modes() {
    let dir = temp_test_dir();
    let files = vec![file(
        dir.path(),
        "modes.grib2",
        &[
            Grib2Builder::new_gfs(),
            Grib2Builder::new_gfs().with_scanning_mode(0x40),
        ],
    )];
    let options = ReportOptions {
        extra: true,
        ..scan_options()
    };

    let report = run(ReportKind::GdsSummary, &files, &options);
    assert!(report.text.contains("    template 0 with Ypos\n"));
    assert_eq!(report.counters.value("template", 0u16), 2);
    assert_eq!(report.counters.value("scanMode", 0u8), 1);
    assert_eq!(report.counters.value("scanMode", 0x40u8), 1);
    assert_eq!(report.counters.value("scanModeDifference", "modes.grib2"), 1);
}

#[test]
fn test_gds_summary_checks_corners_against_scan_mode() {
    let dir = temp_test_dir();
    let files = vec![file(
        dir.path(),
        "corners.grib2",
        &[
            // north to south, west to east: matches mode 0
            Grib2Builder::new_gfs(),
            // j positive but la2 < la1
            Grib2Builder::new_gfs().with_scanning_mode(0x40),
            // i negative but lo2 east of lo1
            Grib2Builder::new_gfs().with_scanning_mode(0x80),
        ],
    )];

    let report = run(ReportKind::GdsSummary, &files, &scan_options());
    assert_eq!(report.counters.value("scanModeCorners", "ok"), 1);
    assert_eq!(report.counters.value("scanModeCorners", "mismatch"), 2);
    assert!(report.text.contains("scan mode 0x40"));
    assert!(report.text.contains("disagrees with corners: la1="));
    assert!(report.text.contains("disagrees with corners: lo1="));
    assert_eq!(report.error_count(), 0);
}

#[test]
fn test_pds_summary() {
    let dir = temp_test_dir();
    let files = vec![file(
        dir.path(),
        "pds.grib2",
        &[
            Grib2Builder::new_gfs().with_forecast(1, 6),
            Grib2Builder::new_gfs().with_interval(accumulation(1, 6, 18)),
            Grib2Builder::new_gfs().with_level(105, 0, 3),
            Grib2Builder::new_gfs().with_level(100, 200, 500),
        ],
    )];

    let report = run(ReportKind::PdsSummary, &files, &scan_options());
    let c = &report.counters;
    assert_eq!(c.value("template", 0u16), 3);
    assert_eq!(c.value("template", 8u16), 1);
    assert_eq!(c.value("timeOffset", 6i64), 1);
    assert_eq!(c.value("timeIntervalSize", 6i64), 1);
    assert_eq!(c.value("levelType", 105u8), 1);
    assert_eq!(c.value("levelScale", 200u8), 1);
    assert!(report.text.contains(" level = 105 : "));
    assert!(report.text.contains(" LevelScale > 127: "));
    assert!(report.text.contains("0-0-0 == 200"));
}

#[test]
fn test_pds_problems() {
    let dir = temp_test_dir();
    let files = vec![file(
        dir.path(),
        "stats.grib2",
        &[
            Grib2Builder::new_gfs(),
            Grib2Builder::new_gfs()
                .with_parameter(1, 8)
                .with_interval(accumulation(7, 6, 18)),
            // same variable again is reported once
            Grib2Builder::new_gfs()
                .with_parameter(1, 8)
                .with_interval(accumulation(7, 6, 18)),
        ],
    )];

    let report = run(ReportKind::PdsProblems, &files, &scan_options());
    assert!(report.text.contains("  0-1-8 (STAT type 7) template=8\n"));
    assert!(report.text.contains("problems = 1/2\n"));
}

#[test]
fn test_id_problems() {
    let dir = temp_test_dir();
    let files = vec![file(
        dir.path(),
        "ids.grib2",
        &[
            Grib2Builder::new_gfs(),
            Grib2Builder::new_gfs().with_center(8),
        ],
    )];

    let report = run(ReportKind::IdProblems, &files, &scan_options());
    assert!(report.text.contains("  center 8 != 7 0-0-0\n"));
    assert_eq!(report.counters.value("centerId", 7u16), 1);
    assert_eq!(report.counters.value("centerId", 8u16), 1);
}

#[test]
fn test_time_coord() {
    let dir = temp_test_dir();
    let mut minutes = accumulation(1, 360, 18);
    minutes.ranges[0].range_unit = 0;
    let files = vec![file(
        dir.path(),
        "time.grib2",
        &[
            Grib2Builder::new_gfs().with_interval(accumulation(1, 6, 18)),
            Grib2Builder::new_gfs().with_interval(accumulation(1, 6, 19)),
            Grib2Builder::new_gfs().with_interval(accumulation(1, 0, 12)),
            Grib2Builder::new_gfs().with_interval(minutes),
            Grib2Builder::new_gfs(),
        ],
    )];

    let report = run(ReportKind::TimeCoord, &files, &scan_options());
    let c = &report.counters;
    assert_eq!(c.value("NumberTimeIntervals", 1usize), 4);
    assert_eq!(c.value("TimeIntervalsDiffer", 0u8), 1);
    assert_eq!(c.value("TimeIntervalsLength", 6i64), 3);
    assert_eq!(c.value("TimeIntervalEndDiffers", 1u8), 1);
    assert!(report.text.contains("  TimeInterval [0,0] = 0-0-0 file=time.grib2\n"));
    assert!(report.text.contains("interval end 2025-12-10 19:00:00 != computed 2025-12-10 18:00:00"));
    assert!(report.text.contains("total records = 5\n"));
}

#[test]
fn test_local_use_section() {
    let dir = temp_test_dir();
    let files = vec![file(
        dir.path(),
        "local.grib2",
        &[
            Grib2Builder::new_row(2).with_local_use(vec![1, 2, 3]),
            Grib2Builder::new_row(2),
        ],
    )];

    let report = run(ReportKind::LocalUseSection, &files, &scan_options());
    assert!(report.text.contains(" == [1, 2, 3]\n"));
    assert!(report.text.contains(" == none\n"));
    assert_eq!(report.counters.value("localUseLength", 3usize), 1);
}

#[test]
fn test_check_tables() {
    let dir = temp_test_dir();
    let files = vec![file(
        dir.path(),
        "params.grib2",
        &[
            Grib2Builder::new_row(2),
            Grib2Builder::new_row(2).with_parameter(1, 200),
            Grib2Builder::new_row(2).with_parameter(5, 5),
        ],
    )];

    let report = run(ReportKind::CheckTables, &files, &scan_options());
    assert!(report.text.contains("  local parameter (0 1 200) = P0_1_200\n"));
    assert!(report.text.contains("  missing from table (0 5 5) = P0_5_5\n"));
    assert!(report.text.contains("total parameters=3 local = 1 missing = 1\n"));
    assert!(report.text.contains("Grand total=3 local = 1 missing = 1\n"));
    assert_eq!(report.counters.value("parameter", "known"), 1);
}

#[test]
fn test_packing_analysis() {
    let dir = temp_test_dir();
    let files = vec![file(
        dir.path(),
        "pack.grib2",
        &[
            Grib2Builder::new_gfs().with_gradient(250.0, 300.0),
            Grib2Builder::new_row(3).with_packing(Packing::Simple {
                reference: 5.0,
                binary_scale: 0,
                decimal_scale: 0,
                bits: 0,
                values: vec![0, 0, 0],
            }),
        ],
    )];
    let options = ReportOptions {
        extra: true,
        ..scan_options()
    };

    let report = run(ReportKind::PackingAnalysis, &files, &options);
    let c = &report.counters;
    assert_eq!(c.value("Nbits", 16u8), 1);
    assert_eq!(c.value("Nbits", 0u8), 1);
    assert_eq!(c.value("scaleOffset", "ok"), 1);
    assert_eq!(c.value("scaleOffset", "unusable width"), 1);
    assert!(report.text.contains("0-0-0 nbits=16 min="));
    assert!(report.text.contains("  org="));
    assert!(report.text.contains("total org="));
    assert_eq!(report.error_count(), 0);
}

#[test]
fn test_failures_are_reported_and_skipped() {
    let dir = temp_test_dir();
    let mut corrupt = Grib2Builder::new_gfs().build();
    corrupt.extend_from_slice(b"GRIB\0\0\0\x02broken");
    let files = vec![
        dir.path().join("absent.grib2"),
        write_test_file(dir.path(), "corrupt.grib2", &corrupt),
        file(dir.path(), "ok.grib2", &[Grib2Builder::new_gfs()]),
    ];

    let report = run(ReportKind::DrsSummary, &files, &scan_options());
    assert_eq!(report.files.len(), 3);
    assert!(report.files[0].failure.is_some());
    assert_eq!(report.files[0].errors, 1);
    assert_eq!(report.files[1].records, 1);
    assert_eq!(report.files[1].errors, 1);
    assert_eq!(report.files[2].errors, 0);
    assert_eq!(report.error_count(), 2);
    assert!(report.text.contains("**Cant open"));
    assert_eq!(report.counters.value("DRS_template", 0u16), 2);
}

#[test]
fn test_cancelled_run() {
    let dir = temp_test_dir();
    let files = vec![file(dir.path(), "a.grib2", &[Grib2Builder::new_gfs()])];
    let cancel = CancelFlag::new();
    let options = ReportOptions {
        cancel: cancel.clone(),
        ..scan_options()
    };
    cancel.cancel();

    let result = ReportEngine::default().run(ReportKind::PdsSummary, &files, &options, Counters::new());
    assert!(matches!(result, Err(ReportError::Cancelled)));
}

#[test]
fn test_counters_accumulate_across_runs() {
    let dir = temp_test_dir();
    let files = vec![file(dir.path(), "a.grib2", &[Grib2Builder::new_gfs()])];
    let engine = ReportEngine::default();
    let options = scan_options();

    let first = engine
        .run(ReportKind::DrsSummary, &files, &options, Counters::new())
        .unwrap();
    let second = engine
        .run(ReportKind::DrsSummary, &files, &options, first.counters)
        .unwrap();
    assert_eq!(second.counters.value("DRS_template", 0u16), 2);
}

#[test]
fn test_index_sidecar_reused() {
    let dir = temp_test_dir();
    let files = vec![file(dir.path(), "a.grib2", &[Grib2Builder::new_gfs()])];
    let options = ReportOptions::default();
    assert!(options.use_index);

    let first = ReportEngine::default();
    first
        .run(ReportKind::GribIndex, &files, &options, Counters::new())
        .unwrap();
    assert_eq!(first.indexer().rescans(), 1);
    assert!(sidecar_path(&files[0], DEFAULT_INDEX_SUFFIX).exists());

    let second = ReportEngine::default();
    let report = second
        .run(ReportKind::GribIndex, &files, &options, Counters::new())
        .unwrap();
    assert_eq!(second.indexer().rescans(), 0);
    assert_eq!(report.counters.value("GDS", 1usize), 1);
}
