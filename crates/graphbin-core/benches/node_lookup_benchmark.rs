//! Point-lookup and posting-list benchmarks
//!
//! Measures the read path over stores of increasing size:
//! - `GraphReader::node_by_id` for present and absent ids
//! - Full iteration of one label posting list

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use graphbin_core::{EdgeRow, GraphReader, InMemoryRows, IngestConfig, NodeRow, ingest};
use tempfile::TempDir;

/// Build a store with `node_count` nodes in a ring of KNOWS edges
fn build_store(node_count: usize) -> (TempDir, GraphReader) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let nodes = (0..node_count)
        .map(|i| {
            NodeRow::new(format!("n{}", i), if i % 5 == 0 { "Company" } else { "Person" })
                .with_property("name", format!("Name{}", i))
                .with_property("age", format!("{}", 20 + i % 50))
        })
        .collect();
    let edges = (0..node_count)
        .map(|i| EdgeRow::new(format!("n{}", i), "KNOWS", format!("n{}", (i + 1) % node_count)))
        .collect();

    let out = dir.path().join("store");
    let config = IngestConfig {
        temp_dir: Some(dir.path().to_path_buf()),
        ..Default::default()
    };
    ingest(&InMemoryRows::new(nodes, edges), &out, &config).expect("Failed to ingest");
    let reader = GraphReader::open(&out).expect("Failed to open store");
    (dir, reader)
}

fn benchmark_node_by_id(c: &mut Criterion) {
    let mut group = c.benchmark_group("node_by_id");

    for scale in [1_000, 10_000, 100_000] {
        let (_dir, reader) = build_store(scale);
        let present = format!("n{}", scale / 2);

        group.bench_with_input(BenchmarkId::new("present", scale), &present, |b, id| {
            b.iter(|| black_box(reader.node_by_id(black_box(id))))
        });
        group.bench_with_input(BenchmarkId::new("absent", scale), &"missing", |b, id| {
            b.iter(|| black_box(reader.node_by_id(black_box(id))))
        });
    }
    group.finish();
}

fn benchmark_edges_by_label(c: &mut Criterion) {
    let mut group = c.benchmark_group("edges_by_label");
    group.sample_size(20);

    for scale in [1_000, 10_000] {
        let (_dir, reader) = build_store(scale);
        group.bench_with_input(BenchmarkId::new("iterate", scale), &scale, |b, _| {
            b.iter(|| {
                let count = reader
                    .edges_by_label("KNOWS")
                    .map(|cursor| cursor.filter_map(|ordinal| ordinal.ok()).count());
                black_box(count)
            })
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_node_by_id, benchmark_edges_by_label);

criterion_main!(benches);
