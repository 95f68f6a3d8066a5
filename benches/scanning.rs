//! Benchmarks for sector-drill scanning
//!
//! Run: cargo bench
//! Run specific: cargo bench -- process_block
//! Compare: cargo bench -- --save-baseline v1 && cargo bench -- --baseline v1

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::io::Cursor;
use tempfile::tempdir;

use sector_drill::carve::{
    CarveOptions, Carver, Recoverer, SectorScanner, SignatureRegistry, TypeFilter, BLOCK_SIZE,
    DEFAULT_MAX_UNTERMINATED_SIZE,
};

// ============================================================================
// Header Matching
// ============================================================================

fn benchmark_first_match(c: &mut Criterion) {
    let registry = SignatureRegistry::builtin();
    let miss = vec![0xA5u8; BLOCK_SIZE];
    let mut late = vec![0u8; BLOCK_SIZE];
    late[..6].copy_from_slice(&[0x78, 0x01, 0x73, 0x0D, 0x62, 0x62]);

    c.bench_function("first_match_miss", |b| {
        b.iter(|| black_box(registry.first_match(black_box(&miss))))
    });
    c.bench_function("first_match_last_entry", |b| {
        b.iter(|| black_box(registry.first_match(black_box(&late))))
    });
}

// ============================================================================
// Scanner State Machine (no I/O)
// ============================================================================

fn benchmark_process_block(c: &mut Criterion) {
    let registry = SignatureRegistry::builtin();
    let mut group = c.benchmark_group("process_block");

    // Idle: every block is checked against every header
    let noise: Vec<u8> = (0..BLOCK_SIZE * 2048).map(|i| (i * 31 % 251) as u8).collect();
    group.throughput(Throughput::Bytes(noise.len() as u64));
    group.bench_function("idle_1mib", |b| {
        b.iter(|| {
            let mut scanner =
                SectorScanner::new(registry.select(&TypeFilter::All), DEFAULT_MAX_UNTERMINATED_SIZE);
            for (i, block) in noise.chunks(BLOCK_SIZE).enumerate() {
                black_box(scanner.process_block(i as u64, block));
            }
        })
    });

    // Detecting: footer search on every block
    let mut pdf = vec![0x20u8; BLOCK_SIZE * 2048];
    pdf[..4].copy_from_slice(b"%PDF");
    group.bench_function("detecting_1mib", |b| {
        b.iter(|| {
            let mut scanner = SectorScanner::new(
                registry.select(&TypeFilter::parse("pdf")),
                DEFAULT_MAX_UNTERMINATED_SIZE,
            );
            for (i, block) in pdf.chunks(BLOCK_SIZE).enumerate() {
                black_box(scanner.process_block(i as u64, block));
            }
            black_box(scanner.finish())
        })
    });

    group.finish();
}

// ============================================================================
// End-to-end Carve (in-memory source, dry run)
// ============================================================================

fn benchmark_carve_reader(c: &mut Criterion) {
    let registry = SignatureRegistry::builtin();
    let carver = Carver::new(&registry, CarveOptions::default());
    let dir = tempdir().unwrap();
    let mut group = c.benchmark_group("carve_reader");

    for mib in [1usize, 8, 32].iter() {
        let mut image = vec![0u8; mib * 1024 * 1024];
        // A small jpg every 64 KiB
        for start in (0..image.len()).step_by(64 * 1024) {
            image[start..start + 4].copy_from_slice(&[0xFF, 0xD8, 0xFF, 0xE0]);
            image[start + 4096..start + 4098].copy_from_slice(&[0xFF, 0xD9]);
        }

        group.throughput(Throughput::Bytes(image.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(format!("{}mib", mib)), &image, |b, image| {
            b.iter(|| {
                let mut recoverer = Recoverer::new(dir.path(), "bench").dry_run(true);
                let result = carver.carve_reader(
                    Cursor::new(black_box(image.as_slice())),
                    Some(image.len() as u64),
                    &mut recoverer,
                    |_| {},
                );
                black_box(result)
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_first_match,
    benchmark_process_block,
    benchmark_carve_reader,
);

criterion_main!(benches);
