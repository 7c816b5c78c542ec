//! Collection index tests over synthetic GRIB2 files.

use grib2_index::{
    build_index, index_file, persist, DataReader, IndexError, IndexOptions, Indexer,
};
use grib2_parser::{RecordScanner, UnpackOptions};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use test_utils::{temp_test_dir, write_test_file, Grib2Builder, ProductSpec};

fn two_message_file() -> Vec<u8> {
    let mut bytes = Grib2Builder::new_gfs().with_gradient(250.0, 300.0).build();
    bytes.extend(
        Grib2Builder::new_gfs()
            .with_parameter(2, 2)
            .with_level(103, 0, 10)
            .build(),
    );
    bytes
}

fn append(path: &Path, bytes: &[u8]) {
    let mut file = OpenOptions::new().append(true).open(path).unwrap();
    file.write_all(bytes).unwrap();
}

fn collection(dir: &Path) -> Vec<PathBuf> {
    vec![
        write_test_file(dir, "a.grib2", &two_message_file()),
        write_test_file(dir, "b.grib2", &Grib2Builder::new_gfs().build()),
        write_test_file(dir, "c.grib2", &Grib2Builder::new_row(8).build()),
    ]
}

#[test]
fn test_index_file_counts() {
    let dir = temp_test_dir();
    let mut bytes = two_message_file();
    bytes.extend_from_slice(b"GRIB\0\0\0\x02garbage");
    let path = write_test_file(dir.path(), "a.grib2", &bytes);

    let index = index_file(&path).unwrap();
    assert_eq!(index.stats.messages, 2);
    assert_eq!(index.stats.records, 2);
    assert_eq!(index.stats.errors, 1);
    assert_eq!(index.grids.len(), 1);
    assert_eq!(index.gds_count(), 2);
    assert_eq!(index.shape(&index.records[0]).unwrap(), (10, 10));
}

#[test]
fn test_repeated_products_share_one_gds() {
    let dir = temp_test_dir();
    let bytes = Grib2Builder::new_gfs()
        .with_product(ProductSpec::temperature(vec![280.0; 100]))
        .with_product(ProductSpec::temperature(vec![270.0; 100]))
        .build();
    let path = write_test_file(dir.path(), "multi.grib2", &bytes);

    let index = index_file(&path).unwrap();
    assert_eq!(index.stats.messages, 1);
    assert_eq!(index.records.len(), 3);
    assert_eq!(index.gds_count(), 1);
    let repeats: Vec<u32> = index.records.iter().map(|r| r.repeat).collect();
    assert_eq!(repeats, vec![0, 1, 2]);
}

#[test]
fn test_identical_grids_dedupe_across_files() {
    let dir = temp_test_dir();
    let paths = collection(dir.path());

    let index = build_index(&paths).unwrap();
    assert_eq!(index.files().len(), 3);
    assert_eq!(index.record_count(), 4);
    // a and b share the 10x10 grid, c has its own
    assert_eq!(index.unique_grid_count(), 2);

    for (file, record) in index.records() {
        assert!(file.grid(record.gds_hash).is_some());
        assert!(index.grid(record.gds_hash).is_some());
    }
}

#[test]
fn test_fresh_sidecar_is_reused() {
    let dir = temp_test_dir();
    let paths = collection(dir.path());
    let sidecar = dir.path().join("collection.idx.json");

    let first = Indexer::default();
    let built = first.load_or_rebuild(&paths, &sidecar).unwrap();
    assert_eq!(first.rescans(), 3);
    let written = std::fs::read(&sidecar).unwrap();

    let second = Indexer::default();
    let loaded = second.load_or_rebuild(&paths, &sidecar).unwrap();
    assert_eq!(second.rescans(), 0);
    assert_eq!(loaded.record_count(), built.record_count());
    assert_eq!(loaded.unique_grid_count(), built.unique_grid_count());
    assert_eq!(std::fs::read(&sidecar).unwrap(), written);
}

#[test]
fn test_only_modified_file_is_rescanned() {
    let dir = temp_test_dir();
    let paths = collection(dir.path());
    let sidecar = dir.path().join("collection.idx.json");
    Indexer::default().load_or_rebuild(&paths, &sidecar).unwrap();

    append(&paths[1], &Grib2Builder::new_gfs().with_parameter(1, 8).build());

    let indexer = Indexer::default();
    let index = indexer.load_or_rebuild(&paths, &sidecar).unwrap();
    assert_eq!(indexer.rescans(), 1);
    assert_eq!(index.file(&paths[1]).unwrap().records.len(), 2);
    assert_eq!(index.record_count(), 5);

    // The rewritten sidecar now covers the change.
    let again = Indexer::default();
    again.load_or_rebuild(&paths, &sidecar).unwrap();
    assert_eq!(again.rescans(), 0);
}

#[test]
fn test_concurrent_refresh_rescans_once() {
    let dir = temp_test_dir();
    let path = write_test_file(dir.path(), "shared.grib2", &two_message_file());
    let indexer = Arc::new(Indexer::default());

    let results: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let indexer = indexer.clone();
                let path = path.clone();
                scope.spawn(move || indexer.refresh_file(&path, None).unwrap())
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(indexer.rescans(), 1);
    assert_eq!(results.iter().filter(|(_, rescanned)| *rescanned).count(), 1);
    for (index, _) in &results {
        assert!(Arc::ptr_eq(index, &results[0].0));
    }
}

#[test]
fn test_concurrent_load_or_rebuild_of_stale_sidecar() {
    let dir = temp_test_dir();
    let paths = collection(dir.path());
    let sidecar = dir.path().join("collection.idx.json");
    Indexer::default().load_or_rebuild(&paths, &sidecar).unwrap();

    append(&paths[0], &Grib2Builder::new_row(8).build());
    let indexer = Arc::new(Indexer::default());

    let counts: Vec<usize> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let indexer = indexer.clone();
                let (paths, sidecar) = (&paths, &sidecar);
                scope.spawn(move || indexer.load_or_rebuild(paths, sidecar).unwrap().record_count())
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(indexer.rescans(), 1);
    assert!(counts.iter().all(|&n| n == 5));

    let persisted = persist::load(&sidecar).expect("sidecar loads after concurrent rebuilds");
    assert_eq!(persisted.len(), 3);
    let fresh = Indexer::default();
    assert_eq!(fresh.load_or_rebuild(&paths, &sidecar).unwrap().record_count(), 5);
    assert_eq!(fresh.rescans(), 0);
}

#[test]
fn test_gates_released_and_cache_bounded() {
    let dir = temp_test_dir();
    let paths = collection(dir.path());
    let indexer = Indexer::new(IndexOptions {
        cache_capacity: 2,
        ..Default::default()
    });

    for path in &paths {
        indexer.refresh_file(path, None).unwrap();
    }
    assert_eq!(indexer.gate_count(), 0);
    assert_eq!(indexer.cached_count(), 2);
    assert_eq!(indexer.rescans(), 3);

    // The most recent results are still served from memory.
    let (_, rescanned) = indexer.refresh_file(&paths[2], None).unwrap();
    assert!(!rescanned);
    // The least recent one was evicted.
    let (_, rescanned) = indexer.refresh_file(&paths[0], None).unwrap();
    assert!(rescanned);

    indexer.clear();
    assert_eq!(indexer.cached_count(), 0);
}

#[test]
fn test_deleted_file_fails_and_keeps_sidecar() {
    let dir = temp_test_dir();
    let paths = collection(dir.path());
    let sidecar = dir.path().join("collection.idx.json");
    Indexer::default().load_or_rebuild(&paths, &sidecar).unwrap();
    let before = std::fs::read(&sidecar).unwrap();

    std::fs::remove_file(&paths[2]).unwrap();

    let err = Indexer::default()
        .load_or_rebuild(&paths, &sidecar)
        .unwrap_err();
    match err {
        IndexError::StaleIndexRebuildFailure { path, .. } => assert_eq!(path, paths[2]),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(std::fs::read(&sidecar).unwrap(), before);
}

#[test]
fn test_force_rescans_everything() {
    let dir = temp_test_dir();
    let paths = collection(dir.path());
    let sidecar = dir.path().join("collection.idx.json");
    Indexer::default().load_or_rebuild(&paths, &sidecar).unwrap();

    let indexer = Indexer::new(IndexOptions {
        force: true,
        ..Default::default()
    });
    indexer.load_or_rebuild(&paths, &sidecar).unwrap();
    assert_eq!(indexer.rescans(), 3);
}

#[test]
fn test_unusable_sidecar_is_ignored() {
    let dir = temp_test_dir();
    let paths = collection(dir.path());
    let sidecar = dir.path().join("collection.idx.json");

    std::fs::write(&sidecar, b"{ not json").unwrap();
    let indexer = Indexer::default();
    indexer.load_or_rebuild(&paths, &sidecar).unwrap();
    assert_eq!(indexer.rescans(), 3);
    assert!(persist::load(&sidecar).is_some());

    let text = std::fs::read_to_string(&sidecar).unwrap();
    let bumped = text.replacen(
        &format!("\"version\": {}", persist::FORMAT_VERSION),
        "\"version\": 999",
        1,
    );
    std::fs::write(&sidecar, bumped).unwrap();
    assert!(persist::load(&sidecar).is_none());

    let indexer = Indexer::default();
    indexer.load_or_rebuild(&paths, &sidecar).unwrap();
    assert_eq!(indexer.rescans(), 3);
}

#[test]
fn test_sidecar_round_trip() {
    let dir = temp_test_dir();
    let paths = collection(dir.path());
    let sidecar = dir.path().join("collection.idx.json");
    let index = build_index(&paths).unwrap();

    persist::save(&sidecar, index.files()).unwrap();
    let loaded = persist::load(&sidecar).unwrap();

    assert_eq!(loaded.len(), index.files().len());
    for (original, restored) in index.files().iter().zip(&loaded) {
        assert_eq!(restored.source, original.source);
        assert_eq!(restored.stats, original.stats);
        assert_eq!(restored.grids.len(), original.grids.len());
        for (a, b) in original.records.iter().zip(&restored.records) {
            assert_eq!(a.gds_hash, b.gds_hash);
            assert_eq!(a.data, b.data);
            assert_eq!(a.bitmap, b.bitmap);
            assert_eq!(a.product_definition.raw(), b.product_definition.raw());
            assert_eq!(a.data_representation.raw(), b.data_representation.raw());
        }
    }
}

#[test]
fn test_missing_sidecar_loads_as_none() {
    let dir = temp_test_dir();
    assert!(persist::load(&dir.path().join("absent.json")).is_none());
}

#[test]
fn test_reader_matches_scanner() {
    let dir = temp_test_dir();
    let bytes = Grib2Builder::new_row(6)
        .with_data(vec![1.0, 2.5, 4.0, 8.0, 16.0, 32.0])
        .build();
    let path = write_test_file(dir.path(), "row.grib2", &bytes);

    let scanned = RecordScanner::open(&path, 0)
        .unwrap()
        .next()
        .unwrap()
        .unwrap()
        .unpack(&UnpackOptions::default())
        .unwrap();

    let index = index_file(&path).unwrap();
    let reader = DataReader::default();
    let grid = reader.read_grid(&index, &index.records[0]).unwrap();
    assert_eq!(grid, scanned);
    assert_eq!(grid.shape, (1, 6));

    let many = reader
        .read_many(&index, &[&index.records[0], &index.records[0]])
        .unwrap();
    assert_eq!(many.len(), 2);
    assert_eq!(many[1], scanned);
}

#[test]
fn test_reader_detects_changed_source() {
    let dir = temp_test_dir();
    let path = write_test_file(dir.path(), "row.grib2", &Grib2Builder::new_row(4).build());
    let index = index_file(&path).unwrap();

    append(&path, &Grib2Builder::new_row(4).build());

    let err = DataReader::default()
        .read_grid(&index, &index.records[0])
        .unwrap_err();
    assert!(matches!(err, IndexError::SourceChanged { .. }));
}

#[test]
fn test_options_from_env() {
    std::env::set_var("GRIB_INDEX_FORCE", "true");
    assert!(IndexOptions::from_env().force);
    std::env::remove_var("GRIB_INDEX_FORCE");
    assert!(!IndexOptions::from_env().force);
}
