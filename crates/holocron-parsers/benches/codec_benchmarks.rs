//! Benchmarks for holocron codecs
//!
//! Run with: cargo bench

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use holocron_core::{Tag, Vec3};
use holocron_parsers::{floor, iff, lookup, ChunkNode, FloorMesh, MeshVersion, SortedLookupTable, Triangle};

/// A wide container tree with `forms` sub-forms of `leaves` leaves each
fn sample_tree(forms: usize, leaves: usize) -> ChunkNode {
    let children = (0..forms)
        .map(|f| {
            let leaves = (0..leaves)
                .map(|l| ChunkNode::leaf(Tag::new(*b"DATA"), vec![(f + l) as u8; 64]))
                .collect();
            ChunkNode::form(Tag::new(*b"0001"), leaves)
        })
        .collect();
    ChunkNode::form(Tag::new(*b"TEST"), children)
}

/// Benchmark container encode and decode
fn bench_container(c: &mut Criterion) {
    let mut group = c.benchmark_group("container");

    for forms in [10, 100, 1000] {
        let tree = sample_tree(forms, 8);
        let bytes = iff::serialize_container(&tree).unwrap();
        group.throughput(Throughput::Bytes(bytes.len() as u64));

        group.bench_with_input(BenchmarkId::new("parse", forms), &bytes, |b, bytes| {
            b.iter(|| iff::parse_container(black_box(bytes)))
        });
        group.bench_with_input(BenchmarkId::new("serialize", forms), &tree, |b, tree| {
            b.iter(|| iff::serialize_container(black_box(tree)))
        });
    }

    group.finish();
}

/// Benchmark CRC table building and lookup
fn bench_lookup_table(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup_table");

    let paths: Vec<String> = (0..10_000)
        .map(|i| format!("object/tangible/item_{i}.iff"))
        .collect();

    group.bench_function("add_entries", |b| {
        b.iter(|| {
            let mut table = SortedLookupTable::new();
            for path in &paths {
                let _ = table.add_entry(black_box(path));
            }
            table
        })
    });

    let mut table = SortedLookupTable::new();
    for path in &paths {
        let _ = table.add_entry(path);
    }
    let bytes = lookup::serialize_table(&table).unwrap();

    group.bench_function("parse", |b| b.iter(|| lookup::parse_table(black_box(&bytes))));
    group.bench_function("lookup", |b| {
        let crcs: Vec<u32> = table.iter().map(|e| e.crc).collect();
        b.iter(|| crcs.iter().filter(|&&crc| table.lookup(black_box(crc)).is_some()).count())
    });

    group.finish();
}

/// Benchmark floor mesh decoding
fn bench_floor_mesh(c: &mut Criterion) {
    let mut mesh = FloorMesh::new(MeshVersion::V0006);
    mesh.vertices = (0..3000)
        .map(|i| Vec3::new((i % 100) as f32, 0.0, (i / 100) as f32))
        .collect();
    mesh.triangles = (0..2000).map(|i| Triangle::new([i, i + 1, i + 2], i)).collect();
    let bytes = floor::serialize_mesh(&mesh).unwrap();

    c.bench_function("floor_mesh_parse", |b| b.iter(|| floor::parse_mesh(black_box(&bytes))));
}

criterion_group!(benches, bench_container, bench_lookup_table, bench_floor_mesh);
criterion_main!(benches);
