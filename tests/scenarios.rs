//! End-to-end scenario tests S1-S6, exercised against the public API
//! the way a caller outside this crate would use it.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use metallgraph::coordination::LocalComm;
use metallgraph::graph::where_clause::WhereClause;
use metallgraph::graph::OpenMode;
use metallgraph::predicate::{self, Rule};
use metallgraph::record_store::RecordStore;
use metallgraph::strings::StringStore;
use metallgraph::CoreError;
use metallgraph::Graph;

fn new_store() -> RecordStore {
    RecordStore::new(Rc::new(RefCell::new(StringStore::new())))
}

/// S1. Series round trip: add a series, populate it, remove a record,
/// confirm tombstoning and the dense scan both behave.
#[test]
fn s1_series_round_trip() {
    let mut store = new_store();
    store.add_series::<i64>("age").unwrap();
    for i in 0..5i64 {
        let id = store.add_record();
        store.set::<i64>("age", id, 10 * i).unwrap();
    }

    assert_eq!(store.num_records(), 5);
    assert_eq!(store.get::<i64>("age", 3).unwrap(), Some(30));

    store.remove_record(2).unwrap();

    let mut seen = Vec::new();
    store.for_all_rows(|id| seen.push(id));
    assert_eq!(seen, vec![0, 1, 3, 4]);
    assert!(matches!(
        store.get::<i64>("age", 2),
        Err(CoreError::RecordNotAllocated(2))
    ));
}

/// S2. String interning: repeated interning of equal bytes dedups to one
/// locator, distinct strings never collide.
#[test]
fn s2_string_interning() {
    let mut strings = StringStore::new();
    let l1 = strings.intern(b"hello").unwrap();
    let l2 = strings.intern(b"world").unwrap();
    let l3 = strings.intern(b"hello").unwrap();

    assert_eq!(l1, l3);
    assert_ne!(l1, l2);
    assert_eq!(strings.get(l1), Some(&b"hello"[..]));
    assert_eq!(strings.size(), 2);
}

/// S3. Predicate on two columns: `a > b` selects exactly the rows where
/// that holds.
#[test]
fn s3_predicate_on_two_columns() {
    let mut store = new_store();
    store.add_series::<i64>("a").unwrap();
    store.add_series::<i64>("b").unwrap();
    let rows = [(1, 2), (3, 3), (5, 1)];
    let mut ids = Vec::new();
    for (a, b) in rows {
        let id = store.add_record();
        store.set::<i64>("a", id, a).unwrap();
        store.set::<i64>("b", id, b).unwrap();
        ids.push(id);
    }

    let rule = Rule::parse(&serde_json::json!({">": [{"var": "a"}, {"var": "b"}]})).unwrap();
    let compiled = predicate::compile(&rule);

    let mut matched = Vec::new();
    for &id in &ids {
        let strings = store.strings();
        let strings = strings.borrow();
        let mut row = HashMap::new();
        for name in ["a", "b"] {
            if let Ok(Some(cell)) = store.get_dynamic(name, id) {
                row.insert(name.to_string(), predicate::cell_to_eval(&cell, &strings));
            }
        }
        if compiled.eval(&row) {
            matched.push(id);
        }
    }
    assert_eq!(matched, vec![2]);
}

fn fresh_graph(dir: &tempfile::TempDir, name: &str) -> Graph {
    Graph::open(
        Arc::new(LocalComm::solo()),
        dir.path().join(name),
        OpenMode::CreateOnly,
        true,
    )
    .unwrap()
}

fn write_edges_parquet(path: &std::path::Path, edges: &[(&str, &str)], scores: Option<&[f64]>) {
    use arrow::array::{ArrayRef, Float64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::RecordBatch;
    use parquet::arrow::ArrowWriter;
    use std::fs::File;
    use std::sync::Arc as StdArc;

    let us: Vec<&str> = edges.iter().map(|(u, _)| *u).collect();
    let vs: Vec<&str> = edges.iter().map(|(_, v)| *v).collect();

    let mut fields = vec![
        Field::new("u", DataType::Utf8, false),
        Field::new("v", DataType::Utf8, false),
    ];
    let mut columns: Vec<ArrayRef> = vec![
        StdArc::new(StringArray::from(us)),
        StdArc::new(StringArray::from(vs)),
    ];
    if let Some(scores) = scores {
        fields.push(Field::new("score", DataType::Float64, false));
        columns.push(StdArc::new(Float64Array::from(scores.to_vec())));
    }

    let schema = StdArc::new(Schema::new(fields));
    let batch = RecordBatch::try_new(schema, columns).unwrap();

    let file = File::create(path).unwrap();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();
}

/// S4. Graph n-hops: a small directed path plus a shortcut, BFS distance
/// from the root matches hand-computed hop counts, and an unreachable
/// node is left untouched.
#[tokio::test]
async fn s4_graph_nhops() {
    let dir = tempfile::tempdir().unwrap();
    let mut graph = fresh_graph(&dir, "s4");

    let edges_dir = tempfile::tempdir().unwrap();
    let edges_path = edges_dir.path().join("edges.parquet");
    write_edges_parquet(
        &edges_path,
        &[("A", "B"), ("B", "C"), ("C", "D"), ("A", "E")],
        None,
    );
    graph
        .ingest_parquet_edges(&edges_path, false, "u", "v", true, &[])
        .await
        .unwrap();

    graph
        .nhops(
            "node.reach",
            2,
            &["A".to_string()],
            &WhereClause::always_true(),
        )
        .await
        .unwrap();

    let rows = graph
        .select_sample_nodes(
            1_000,
            &["id".to_string(), "reach".to_string()],
            Some(1),
            &WhereClause::always_true(),
        )
        .await
        .unwrap();

    let mut reach: HashMap<String, Option<u64>> = HashMap::new();
    for row in rows {
        let id = row.get("id").and_then(|v| v.as_str()).unwrap().to_string();
        let hop = row.get("reach").and_then(|v| v.as_u64());
        reach.insert(id, hop);
    }

    assert_eq!(reach.get("A").copied().flatten(), Some(0));
    assert_eq!(reach.get("B").copied().flatten(), Some(1));
    assert_eq!(reach.get("E").copied().flatten(), Some(1));
    assert_eq!(reach.get("C").copied().flatten(), Some(2));
    // D is three hops from A, outside the k=2 horizon.
    assert_eq!(reach.get("D").copied().flatten(), None);
}

/// S5. Deterministic sampling: the same seed draws the same edge subset
/// twice, and the subset size matches the requested count.
#[tokio::test]
async fn s5_deterministic_sampling() {
    let dir = tempfile::tempdir().unwrap();
    let mut graph = fresh_graph(&dir, "s5");

    let mut pairs = Vec::new();
    for i in 0..100 {
        pairs.push((format!("n{i}"), format!("n{}", (i + 1) % 100)));
    }
    let pair_refs: Vec<(&str, &str)> =
        pairs.iter().map(|(u, v)| (u.as_str(), v.as_str())).collect();
    let edges_dir = tempfile::tempdir().unwrap();
    let edges_path = edges_dir.path().join("edges.parquet");
    write_edges_parquet(&edges_path, &pair_refs, None);
    graph
        .ingest_parquet_edges(&edges_path, false, "u", "v", true, &[])
        .await
        .unwrap();

    graph
        .sample_edges("edge.picked1", 10, Some(42), &WhereClause::always_true())
        .await
        .unwrap();
    graph
        .sample_edges("edge.picked2", 10, Some(42), &WhereClause::always_true())
        .await
        .unwrap();

    let rows = graph
        .select_sample_edges(
            1_000,
            &["picked1".to_string(), "picked2".to_string()],
            Some(1),
            &WhereClause::always_true(),
        )
        .await
        .unwrap();

    let mut picked_count = 0;
    for row in &rows {
        let p1 = row.get("picked1").and_then(|v| v.as_bool()).unwrap_or(false);
        let p2 = row.get("picked2").and_then(|v| v.as_bool()).unwrap_or(false);
        assert_eq!(p1, p2, "same seed must draw the same edges");
        if p1 {
            picked_count += 1;
        }
    }
    assert_eq!(picked_count, 10);
}

/// S6. Parquet round trip: ingest edges with a metadata column from an
/// external file, dump back out, re-ingest the dump, and recover the
/// same row count.
#[tokio::test]
async fn s6_parquet_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let mut graph = fresh_graph(&dir, "s6");

    let mut pairs = Vec::new();
    let mut scores = Vec::new();
    for i in 0..200 {
        pairs.push((format!("n{i}"), format!("n{}", (i + 1) % 200)));
        scores.push(i as f64 * 0.5);
    }
    let pair_refs: Vec<(&str, &str)> =
        pairs.iter().map(|(u, v)| (u.as_str(), v.as_str())).collect();
    let edges_dir = tempfile::tempdir().unwrap();
    let edges_path = edges_dir.path().join("edges.parquet");
    write_edges_parquet(&edges_path, &pair_refs, Some(&scores));

    let rc = graph
        .ingest_parquet_edges(
            &edges_path,
            false,
            "u",
            "v",
            true,
            &["score".to_string()],
        )
        .await
        .unwrap();
    assert!(rc.error.is_none());
    assert_eq!(graph.num_edges().await, 200);

    let dump_dir = tempfile::tempdir().unwrap();
    let prefix = dump_dir.path().join("out");
    let dump_rc = graph
        .dump_parquet_edges(&prefix, &["score".to_string()], true)
        .unwrap();
    let dumped_path = dump_rc
        .return_info
        .get("path")
        .and_then(|v| v.as_str())
        .unwrap()
        .to_string();

    let reload_dir = tempfile::tempdir().unwrap();
    let mut reloaded = fresh_graph(&reload_dir, "reloaded");
    reloaded
        .ingest_parquet_edges(dumped_path, false, "u", "v", true, &["score".to_string()])
        .await
        .unwrap();
    assert_eq!(reloaded.num_edges().await, 200);
}
