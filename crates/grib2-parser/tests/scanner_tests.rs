//! Record scanner behaviour over synthetic files.

use grib2_parser::{
    Grib2Error, MemorySource, ProductRecord, Record, RecordScanner, ScanState, UnpackOptions,
};
use test_utils::{BitmapSpec, Grib2Builder, Packing, ProductSpec};

fn scan(bytes: Vec<u8>) -> Vec<Result<Record, Grib2Error>> {
    RecordScanner::new(MemorySource::new(bytes)).collect()
}

fn simple_values(values: Vec<u32>) -> Packing {
    Packing::Simple {
        reference: 0.0,
        binary_scale: 0,
        decimal_scale: 0,
        bits: 8,
        values,
    }
}

#[test]
fn test_three_messages() {
    let mut file = Vec::new();
    for category in 0..3 {
        file.extend(Grib2Builder::new_row(4).with_parameter(category, 0).build());
    }

    let records: Vec<Record> = scan(file).into_iter().map(|r| r.unwrap()).collect();
    assert_eq!(records.len(), 3);
    for (i, record) in records.iter().enumerate() {
        assert_eq!(record.parameter().unwrap(), (0, i as u8, 0));
        assert_eq!(record.repeat, 0);
        assert_eq!(record.gds().shape().unwrap(), (1, 4));
    }
    assert_eq!(records[1].start_offset, records[0].message_length);
}

#[test]
fn test_grid_corners_and_increment() {
    let record = scan(Grib2Builder::new_gfs().build()).remove(0).unwrap();
    let gds = record.gds();
    let (la1, lo1) = gds.first_point().unwrap();
    let (la2, lo2) = gds.last_point().unwrap().expect("lat/lon grid has a last point");
    assert!((la1 - 45.0).abs() < 1e-9 && (lo1 - 230.0).abs() < 1e-9);
    assert!((la2 - 35.0).abs() < 1e-9 && (lo2 - 239.0).abs() < 1e-9);
    assert!((gds.i_increment().unwrap() - 1.0).abs() < 1e-9);
}

#[test]
fn test_truncated_record_is_skipped() {
    let message = |number| {
        Grib2Builder::new_row(4)
            .with_parameter(0, number)
            .with_packing(simple_values(vec![1, 2, 3, 4]))
            .build()
    };
    let first = message(1);
    let mut second = message(2);
    let third = message(3);

    // drop the packed values, leaving every declared length intact
    let len = second.len();
    second.drain(len - 8..len - 4);

    let second_start = first.len() as u64;
    let mut file = first;
    file.extend(second);
    file.extend(third);

    let mut scanner = RecordScanner::new(MemorySource::new(file));
    let first = scanner.next().unwrap().unwrap();
    assert_eq!(first.parameter().unwrap(), (0, 0, 1));

    match scanner.next().unwrap() {
        Err(Grib2Error::CorruptRecord { offset, .. }) => assert_eq!(offset, second_start),
        other => panic!("expected a corrupt record, got {other:?}"),
    }

    let third = scanner.next().unwrap().unwrap();
    assert_eq!(third.parameter().unwrap(), (0, 0, 3));
    assert!(scanner.next().is_none());
    assert_eq!(scanner.state(), ScanState::Done);

    let stats = scanner.stats();
    assert_eq!(stats.messages, 2);
    assert_eq!(stats.records, 2);
    assert_eq!(stats.errors, 1);
}

#[test]
fn test_leading_garbage() {
    let mut file = b"not a grib file, but it ends with GRI".to_vec();
    file.extend(Grib2Builder::new_row(2).build());
    let results = scan(file);
    assert_eq!(results.len(), 1);
    assert!(results[0].is_ok());
}

#[test]
fn test_grib1_message_is_reported() {
    let mut file = b"GRIB".to_vec();
    file.extend_from_slice(&[0, 0, 40, 1]);
    file.extend_from_slice(&[0u8; 32]);
    file.extend_from_slice(b"7777");
    let grib2_start = file.len() as u64;
    file.extend(Grib2Builder::new_row(2).build());

    let results = scan(file);
    assert_eq!(results.len(), 2);
    assert!(matches!(
        results[0],
        Err(Grib2Error::UnsupportedEdition { offset: 0, edition: 1 })
    ));
    assert_eq!(results[1].as_ref().unwrap().start_offset, grib2_start);
}

#[test]
fn test_repeated_products_share_message() {
    let message = Grib2Builder::new_row(3)
        .with_parameter(0, 0)
        .with_product(ProductSpec {
            number: 2,
            category: 2,
            ..ProductSpec::temperature(vec![1.0, 2.0, 3.0])
        })
        .build();
    let records: Vec<Record> = scan(message).into_iter().map(|r| r.unwrap()).collect();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].repeat, 0);
    assert_eq!(records[1].repeat, 1);
    assert_eq!(records[0].start_offset, records[1].start_offset);
    assert_eq!(records[1].parameter().unwrap(), (0, 2, 2));
    assert_eq!(
        records[0].grid_definition.raw(),
        records[1].grid_definition.raw()
    );
    assert!(records[0].data_span.offset < records[1].data_span.offset);
}

#[test]
fn test_previous_bitmap_is_resolved() {
    let message = Grib2Builder::new_row(3)
        .with_packing(simple_values(vec![10, 20]))
        .with_bitmap(BitmapSpec::Bits(vec![true, false, true]))
        .with_product(ProductSpec {
            packing: simple_values(vec![30, 40]),
            bitmap: BitmapSpec::Previous,
            ..ProductSpec::temperature(Vec::new())
        })
        .build();
    let records: Vec<Record> = scan(message).into_iter().map(|r| r.unwrap()).collect();

    assert_eq!(records[0].bitmap_indicator, 0);
    assert_eq!(records[1].bitmap_indicator, 254);
    assert_eq!(
        records[1].bitmap.as_ref().unwrap().raw(),
        records[0].bitmap.as_ref().unwrap().raw()
    );

    let grid = records[1].unpack(&UnpackOptions::default()).unwrap();
    assert_eq!(grid.values[0], 30.0);
    assert!(grid.values[1].is_nan());
    assert_eq!(grid.values[2], 40.0);
}

#[test]
fn test_previous_bitmap_without_definition() {
    let message = Grib2Builder::new_row(3)
        .with_bitmap(BitmapSpec::Previous)
        .build();
    let results = scan(message);
    assert!(matches!(results[0], Err(Grib2Error::CorruptRecord { .. })));
}

#[test]
fn test_local_use_section_is_kept() {
    let message = Grib2Builder::new_row(2)
        .with_local_use(vec![1, 2, 3, 4])
        .build();
    let record = scan(message).remove(0).unwrap();
    let local = record.local_use.expect("local use section");
    assert_eq!(
        local.fields().get_bytes("local_use").unwrap().as_ref(),
        &[1, 2, 3, 4]
    );
}

#[test]
fn test_data_is_section_body() {
    let message = Grib2Builder::new_row(2)
        .with_packing(simple_values(vec![7, 9]))
        .build();
    let record = scan(message.clone()).remove(0).unwrap();
    assert_eq!(record.data.as_ref(), &[7, 9]);
    let span = record.data_span;
    assert_eq!(
        &message[span.offset as usize + 5..span.end() as usize],
        record.data.as_ref()
    );
    assert_eq!(record.end_marker_offset(), message.len() as u64 - 4);
}

#[test]
fn test_scan_file() {
    let dir = test_utils::temp_test_dir();
    let path = test_utils::write_test_file(
        dir.path(),
        "two.grib2",
        &[
            Grib2Builder::new_row(2).build(),
            Grib2Builder::new_row(2).build(),
        ]
        .concat(),
    );
    let scanner = RecordScanner::open(&path, 7).unwrap();
    let records: Vec<Record> = scanner.map(|r| r.unwrap()).collect();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.file_index == 7));
}

/// Scan a real GFS file when one is available (`TEST_DATA_DIR`).
#[test]
fn test_scan_gfs_sample() {
    let path = test_utils::require_test_file!("gfs_sample.grib2");

    let mut scanner = RecordScanner::open(&path, 0).unwrap();
    let mut count = 0;
    for record in scanner.by_ref() {
        let record = record.unwrap();
        assert!(record.parameter().is_ok());
        assert!(record.gds().shape().is_ok());
        count += 1;
    }
    assert!(count > 0);
    assert_eq!(scanner.stats().errors, 0);
    assert_eq!(scanner.state(), ScanState::Done);
}
