//! Criterion benchmarks for the record-store, string-interning, and
//! graph overlay operations.
//!
//! Run with: `cargo bench`

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use metallgraph::coordination::LocalComm;
use metallgraph::graph::where_clause::WhereClause;
use metallgraph::graph::OpenMode;
use metallgraph::record_store::RecordStore;
use metallgraph::strings::StringStore;
use metallgraph::Graph;

fn new_store() -> RecordStore {
    RecordStore::new(Rc::new(RefCell::new(StringStore::new())))
}

// ---------------------------------------------------------------------------
// Record store: insert / scan / typed lookup
// ---------------------------------------------------------------------------

fn bench_record_store_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("record_store_insert");

    for count in [100, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &n| {
            b.iter(|| {
                let mut store = new_store();
                store.add_series::<i64>("age").unwrap();
                for i in 0..n {
                    let id = store.add_record();
                    store.set::<i64>("age", id, i).unwrap();
                }
                black_box(store.num_records())
            });
        });
    }
    group.finish();
}

fn bench_record_store_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("record_store_scan");

    for count in [100, 1_000, 10_000] {
        let mut store = new_store();
        store.add_series::<i64>("age").unwrap();
        for i in 0..count {
            let id = store.add_record();
            store.set::<i64>("age", id, i).unwrap();
        }

        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| {
                let mut sum = 0i64;
                store.for_all_rows(|id| {
                    sum += store.get::<i64>("age", id).unwrap().unwrap_or(0);
                });
                black_box(sum)
            });
        });
    }
    group.finish();
}

fn bench_record_store_point_lookup(c: &mut Criterion) {
    let mut store = new_store();
    store.add_series::<i64>("age").unwrap();
    let mut ids = Vec::new();
    for i in 0..1_000 {
        let id = store.add_record();
        store.set::<i64>("age", id, i).unwrap();
        ids.push(id);
    }

    c.bench_function("record_store_point_lookup_1k", |b| {
        let mut idx = 0usize;
        b.iter(|| {
            let id = ids[idx % ids.len()];
            idx += 1;
            black_box(store.get::<i64>("age", id).unwrap())
        });
    });
}

// ---------------------------------------------------------------------------
// String interning
// ---------------------------------------------------------------------------

fn bench_string_intern_fresh(c: &mut Criterion) {
    let mut group = c.benchmark_group("string_intern_fresh");

    for count in [100, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &n| {
            b.iter(|| {
                let mut store = StringStore::new();
                for i in 0..n {
                    black_box(store.intern(format!("key-{i}").as_bytes()).unwrap());
                }
            });
        });
    }
    group.finish();
}

fn bench_string_intern_dedup(c: &mut Criterion) {
    let mut store = StringStore::new();
    for i in 0..1_000 {
        store.intern(format!("key-{i}").as_bytes()).unwrap();
    }

    c.bench_function("string_intern_dedup_repeat_1k", |b| {
        let mut i = 0;
        b.iter(|| {
            let key = format!("key-{}", i % 1_000);
            i += 1;
            black_box(store.intern(key.as_bytes()).unwrap())
        });
    });
}

// ---------------------------------------------------------------------------
// Graph: degrees, n-hop BFS, sampling
// ---------------------------------------------------------------------------

fn build_ring_graph(n: usize) -> Graph {
    let dir = tempfile::tempdir().unwrap();
    let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
    let mut graph = Graph::open(
        Arc::new(LocalComm::solo()),
        dir.path().join("ring"),
        OpenMode::CreateOnly,
        true,
    )
    .unwrap();

    for i in 0..n {
        graph.ensure_local_node(&format!("n{i}")).unwrap();
    }
    rt.block_on(async {
        // Edges are seeded through the Parquet ingest path, the only
        // public way to populate edges without a predicate/assign round
        // trip per row.
        let edges_dir = tempfile::tempdir().unwrap();
        let edges_path = edges_dir.path().join("edges.parquet");
        write_ring_parquet(&edges_path, n);
        graph
            .ingest_parquet_edges(&edges_path, false, "u", "v", true, &[])
            .await
            .unwrap();
    });
    drop(dir);
    graph
}

fn write_ring_parquet(path: &std::path::Path, n: usize) {
    use arrow::array::StringArray;
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::RecordBatch;
    use parquet::arrow::ArrowWriter;
    use std::fs::File;
    use std::sync::Arc as StdArc;

    let us: Vec<String> = (0..n).map(|i| format!("n{i}")).collect();
    let vs: Vec<String> = (0..n).map(|i| format!("n{}", (i + 1) % n)).collect();
    let schema = StdArc::new(Schema::new(vec![
        Field::new("u", DataType::Utf8, false),
        Field::new("v", DataType::Utf8, false),
    ]));
    let batch = RecordBatch::try_new(
        schema,
        vec![
            StdArc::new(StringArray::from(us)),
            StdArc::new(StringArray::from(vs)),
        ],
    )
    .unwrap();

    let file = File::create(path).unwrap();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();
}

fn bench_graph_degrees(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph_degrees");

    for count in [100, 1_000, 5_000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &n| {
            b.iter(|| {
                let mut graph = build_ring_graph(n);
                graph.degrees().unwrap();
                black_box(())
            });
        });
    }
    group.finish();
}

fn bench_graph_nhops(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
    let mut group = c.benchmark_group("graph_nhops");

    for count in [100, 1_000, 5_000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &n| {
            b.iter(|| {
                let mut graph = build_ring_graph(n);
                rt.block_on(graph.nhops(
                    "node.reach",
                    5,
                    &["n0".to_string()],
                    &WhereClause::always_true(),
                ))
                .unwrap();
                black_box(())
            });
        });
    }
    group.finish();
}

fn bench_graph_sample_edges(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
    let mut graph = build_ring_graph(5_000);

    c.bench_function("graph_sample_edges_100_of_5000", |b| {
        b.iter(|| {
            rt.block_on(graph.sample_edges(
                "edge.picked",
                100,
                Some(7),
                &WhereClause::always_true(),
            ))
            .unwrap();
            black_box(())
        });
    });
}

criterion_group!(
    record_store_benches,
    bench_record_store_insert,
    bench_record_store_scan,
    bench_record_store_point_lookup,
);

criterion_group!(
    string_store_benches,
    bench_string_intern_fresh,
    bench_string_intern_dedup,
);

criterion_group!(
    graph_benches,
    bench_graph_degrees,
    bench_graph_nhops,
    bench_graph_sample_edges,
);

criterion_main!(record_store_benches, string_store_benches, graph_benches);
