//! Benchmarks for record scanning and data unpacking.
//!
//! Run with: cargo bench --package grib2-parser --bench unpack_benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use grib2_parser::{MemorySource, Record, RecordScanner, UnpackOptions};
use test_utils::{BitmapSpec, Grib2Builder, Packing};

/// Smooth temperature-like field (Kelvin) over an `ni` x `nj` grid.
fn generate_temperature_grid(ni: u32, nj: u32) -> Vec<f32> {
    let mut data = Vec::with_capacity((ni * nj) as usize);
    for y in 0..nj {
        for x in 0..ni {
            let lat_factor = (y as f32 / nj as f32 - 0.5) * 60.0;
            let lon_factor = ((x as f32 / ni as f32) * std::f32::consts::PI * 4.0).sin() * 5.0;
            data.push(273.15 + lat_factor + lon_factor);
        }
    }
    data
}

fn first_record(bytes: Vec<u8>) -> Record {
    RecordScanner::new(MemorySource::new(bytes))
        .next()
        .expect("one record")
        .expect("record decodes")
}

// =============================================================================
// SCANNING BENCHMARKS
// =============================================================================

fn bench_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan");

    for messages in [10usize, 100, 1000] {
        let message = Grib2Builder::new_gfs().build();
        let file: Vec<u8> = std::iter::repeat(message).take(messages).flatten().collect();

        group.throughput(Throughput::Elements(messages as u64));
        group.bench_with_input(BenchmarkId::new("records", messages), &file, |b, file| {
            b.iter(|| {
                RecordScanner::new(MemorySource::new(black_box(file.clone()))).count()
            });
        });
    }

    group.finish();
}

// =============================================================================
// UNPACKING BENCHMARKS
// =============================================================================

fn bench_unpack(c: &mut Criterion) {
    let mut group = c.benchmark_group("unpack");
    let options = UnpackOptions::default();

    let sizes = [
        // (ni, nj, name)
        (360, 181, "1deg_global"),
        (1440, 721, "GFS_quarter_deg"),
    ];

    for (ni, nj, name) in sizes {
        let data = generate_temperature_grid(ni, nj);
        group.throughput(Throughput::Elements((ni * nj) as u64));

        let simple = first_record(
            Grib2Builder::new_gfs()
                .with_grid(ni, nj)
                .with_data(data.clone())
                .build(),
        );
        group.bench_with_input(BenchmarkId::new(name, "simple"), &simple, |b, record| {
            b.iter(|| record.unpack(black_box(&options)).unwrap());
        });

        let ieee = first_record(
            Grib2Builder::new_gfs()
                .with_grid(ni, nj)
                .with_packing(Packing::Ieee(data.clone()))
                .build(),
        );
        group.bench_with_input(BenchmarkId::new(name, "ieee"), &ieee, |b, record| {
            b.iter(|| record.unpack(black_box(&options)).unwrap());
        });

        let values: Vec<u32> = data.iter().map(|v| ((v - 200.0) * 100.0) as u32).collect();
        let png = first_record(
            Grib2Builder::new_gfs()
                .with_grid(ni, nj)
                .with_packing(Packing::Png {
                    reference: 200.0,
                    binary_scale: 0,
                    decimal_scale: 2,
                    bits: 16,
                    values,
                })
                .build(),
        );
        group.bench_with_input(BenchmarkId::new(name, "png"), &png, |b, record| {
            b.iter(|| record.unpack(black_box(&options)).unwrap());
        });
    }

    group.finish();
}

fn bench_bitmap(c: &mut Criterion) {
    let mut group = c.benchmark_group("bitmap");
    let (ni, nj) = (1440u32, 721u32);
    let mask: Vec<bool> = (0..ni * nj).map(|i| i % 3 != 0).collect();
    let present = mask.iter().filter(|b| **b).count();

    let record = first_record(
        Grib2Builder::new_gfs()
            .with_grid(ni, nj)
            .with_data(vec![280.0; present])
            .with_bitmap(BitmapSpec::Bits(mask))
            .build(),
    );

    group.throughput(Throughput::Elements((ni * nj) as u64));
    group.bench_function("expand_two_thirds", |b| {
        b.iter(|| record.unpack(black_box(&UnpackOptions::default())).unwrap());
    });

    group.finish();
}

criterion_group!(benches, bench_scan, bench_unpack, bench_bitmap);
criterion_main!(benches);
