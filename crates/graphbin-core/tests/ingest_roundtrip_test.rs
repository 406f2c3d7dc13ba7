//! End-to-end ingestion tests
//!
//! Builds stores from PGDF files and in-memory rows, then reads them back
//! through `GraphReader`.

use graphbin_core::{
    EdgeRow, Error, GraphReader, InMemoryRows, IngestConfig, IngestContext, NodeRow, PgdfFiles,
    PostingCursor, derive_edge_id, fold_value, ingest,
};
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::path::Path;
use tempfile::TempDir;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("graphbin_core=debug")
        .try_init();
}

fn test_config(dir: &Path) -> IngestConfig {
    IngestConfig {
        temp_dir: Some(dir.to_path_buf()),
        buffer_capacity: 256,
        ..Default::default()
    }
}

fn ordinals(cursor: PostingCursor<'_>) -> Vec<u32> {
    cursor.collect::<graphbin_core::Result<Vec<_>>>().unwrap()
}

fn write_pgdf(dir: &Path, nodes: &str, edges: &str) -> PgdfFiles {
    let n = dir.join("nodes.pgdf");
    let e = dir.join("edges.pgdf");
    std::fs::write(&n, nodes).unwrap();
    std::fs::write(&e, edges).unwrap();
    PgdfFiles::new(n, e)
}

fn read_store(dir: &Path) -> BTreeMap<String, Vec<u8>> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| {
            let entry = entry.unwrap();
            (
                entry.file_name().to_string_lossy().to_string(),
                std::fs::read(entry.path()).unwrap(),
            )
        })
        .collect()
}

#[test]
fn test_single_node_scenario() {
    init_tracing();
    let tmp = TempDir::new().unwrap();
    let source = write_pgdf(tmp.path(), "@id|@label|name\nn1|Person|Ada\n", "");
    let out = tmp.path().join("out");

    let stats = ingest(&source, &out, &test_config(tmp.path())).unwrap();
    assert_eq!(stats.nodes_stored, 1);
    assert_eq!(stats.edges_stored, 0);

    let graph = GraphReader::open(&out).unwrap();
    let node = graph.node_by_id("n1").unwrap().unwrap();
    assert_eq!(node.label, "Person");
    assert_eq!(node.properties, vec![("name".to_string(), "ada".to_string())]);
    assert!(graph.node_by_id("missing").unwrap().is_none());
}

#[test]
fn test_store_file_set() {
    let tmp = TempDir::new().unwrap();
    let source = write_pgdf(tmp.path(), "@id|@label\nn1|A\n", "@label|@out|@in\nL|n1|n1\n");
    let out = tmp.path().join("out");
    ingest(&source, &out, &test_config(tmp.path())).unwrap();

    let names: Vec<String> = read_store(&out).into_keys().collect();
    let mut expected = Vec::new();
    for entity in ["nodes", "edges"] {
        for ext in ["id.str", "id.ord2pos", "id.lex", "rec", "off"] {
            expected.push(format!("{entity}.{ext}"));
        }
    }
    for dict in ["labels", "propname", "propval"] {
        for ext in ["str", "ord2pos", "lex"] {
            expected.push(format!("dict.{dict}.{ext}"));
        }
    }
    for idx in ["edgesByLabel", "srcByLabel", "dstByLabel", "nodesByProp"] {
        for ext in ["pl", "dir"] {
            expected.push(format!("idx.{idx}.{ext}"));
        }
    }
    expected.sort();
    assert_eq!(names, expected);
}

#[test]
fn test_ingestion_is_deterministic() {
    let tmp = TempDir::new().unwrap();
    let source = write_pgdf(
        tmp.path(),
        "@id|@label|name|city\nn2|Person|Bob|Paris\nn1|Person|Ada|LONDON\nn3|City|London|\n",
        "@id|@label|@dir|@out|@in\n|LIVES_IN|T|n1|n3\ne9|KNOWS|T|n1|n2\n|KNOWS|T|n2|n1\n",
    );
    let a = tmp.path().join("a");
    let b = tmp.path().join("b");
    ingest(&source, &a, &test_config(tmp.path())).unwrap();
    ingest(&source, &b, &test_config(tmp.path())).unwrap();

    let (left, right) = (read_store(&a), read_store(&b));
    assert_eq!(left.len(), 27);
    assert_eq!(left, right);
}

#[test]
fn test_edge_filtering() {
    let tmp = TempDir::new().unwrap();
    let source = InMemoryRows::new(
        vec![NodeRow::new("a", "P"), NodeRow::new("b", "P")],
        vec![
            EdgeRow::new("", "L", "b"),
            EdgeRow::new("a", "L", ""),
            EdgeRow::new("a", "", "b"),
            EdgeRow::new("a", "L", "b").with_direction("F"),
            EdgeRow::new("a", "L", "ghost"),
            EdgeRow::new("a", "M", "b"),
        ],
    );
    let out = tmp.path().join("out");
    let stats = ingest(&source, &out, &test_config(tmp.path())).unwrap();

    assert_eq!(stats.edges_stored, 1);
    assert_eq!(stats.edges_missing_fields, 3);
    assert_eq!(stats.edges_non_forward, 1);
    assert_eq!(stats.edges_dangling, 1);

    let graph = GraphReader::open(&out).unwrap();
    assert_eq!(graph.edge_count(), 1);
    assert!(ordinals(graph.edges_by_label("L").unwrap()).is_empty());
    assert!(ordinals(graph.sources_by_label("L").unwrap()).is_empty());
    assert!(ordinals(graph.destinations_by_label("L").unwrap()).is_empty());
    assert_eq!(ordinals(graph.edges_by_label("M").unwrap()), vec![0]);
    // edge-only labels still reach the dictionary
    assert!(graph.labels().string_to_id("L").unwrap().is_some());
}

#[test]
fn test_pgdf_edge_rows_dropped_by_reader_are_counted() {
    let tmp = TempDir::new().unwrap();
    let source = write_pgdf(
        tmp.path(),
        "@id|@label\na|P\nb|P\n",
        "@label|@dir|@out|@in\nL|T||b\nL|U|a|b\nL|t|a|b\n",
    );
    let out = tmp.path().join("out");
    let stats = ingest(&source, &out, &test_config(tmp.path())).unwrap();
    assert_eq!(stats.edges_missing_fields, 1);
    assert_eq!(stats.edges_non_forward, 1);
    assert_eq!(stats.edges_stored, 1);
}

#[test]
fn test_duplicate_edges_collapse() {
    let tmp = TempDir::new().unwrap();
    let source = InMemoryRows::new(
        vec![NodeRow::new("a", "P"), NodeRow::new("b", "P")],
        vec![
            EdgeRow::new("a", "KNOWS", "b"),
            EdgeRow::new("a", "KNOWS", "b"),
        ],
    );
    let out = tmp.path().join("out");
    let stats = ingest(&source, &out, &test_config(tmp.path())).unwrap();
    assert_eq!(stats.edges_stored, 1);
    assert_eq!(stats.duplicate_edge_ids, 1);

    let graph = GraphReader::open(&out).unwrap();
    let id = derive_edge_id("a", "KNOWS", "b");
    assert_eq!(graph.edge_id(0).unwrap(), id);
    assert_eq!(ordinals(graph.edges_by_label("KNOWS").unwrap()), vec![0]);
    assert_eq!(ordinals(graph.sources_by_label("KNOWS").unwrap()), vec![0]);
    assert_eq!(ordinals(graph.destinations_by_label("KNOWS").unwrap()), vec![1]);
}

#[test]
fn test_duplicate_node_ids_keep_first_row() {
    let tmp = TempDir::new().unwrap();
    let source = InMemoryRows::new(
        vec![
            NodeRow::new("n1", "First").with_property("k", "v1"),
            NodeRow::new("n1", "Second").with_property("k", "v2"),
            NodeRow::new("", "NoId"),
        ],
        vec![],
    );
    let out = tmp.path().join("out");
    let stats = ingest(&source, &out, &test_config(tmp.path())).unwrap();
    assert_eq!(stats.nodes_stored, 1);
    assert_eq!(stats.duplicate_node_ids, 1);
    assert_eq!(stats.node_rows_malformed, 1);

    let graph = GraphReader::open(&out).unwrap();
    let node = graph.node_by_id("n1").unwrap().unwrap();
    assert_eq!(node.label, "First");
    assert_eq!(node.property("k"), Some("v1"));
    // labels of skipped rows never reach the dictionary
    assert_eq!(graph.labels().string_to_id("Second").unwrap(), None);
}

#[test]
fn test_property_index_and_empty_values() {
    let tmp = TempDir::new().unwrap();
    let source = write_pgdf(
        tmp.path(),
        "@id|@label|name|nick\nn1|P|Ada|\nn2|P|ada|x\nn3|P|Bob|\n",
        "",
    );
    let out = tmp.path().join("out");
    let stats = ingest(&source, &out, &test_config(tmp.path())).unwrap();
    assert_eq!(stats.property_values, 4);

    let graph = GraphReader::open(&out).unwrap();
    assert_eq!(ordinals(graph.nodes_by_property("name", "ADA").unwrap()), vec![0, 1]);
    assert_eq!(ordinals(graph.nodes_by_property("nick", "").unwrap()), vec![0, 2]);
    assert!(ordinals(graph.nodes_by_property("age", "1").unwrap()).is_empty());
    assert_eq!(graph.property_values().id_to_string(0).unwrap(), "");
}

#[test]
fn test_dictionary_ids_follow_byte_order() {
    let tmp = TempDir::new().unwrap();
    let source = InMemoryRows::new(
        vec![
            NodeRow::new("1", "b"),
            NodeRow::new("2", "B"),
            NodeRow::new("3", "é"),
        ],
        vec![EdgeRow::new("1", "a", "2")],
    );
    let out = tmp.path().join("out");
    ingest(&source, &out, &test_config(tmp.path())).unwrap();

    let graph = GraphReader::open(&out).unwrap();
    let labels: Vec<&str> = (0..graph.labels().len() as u32)
        .map(|id| graph.labels().id_to_string(id).unwrap())
        .collect();
    assert_eq!(labels, vec!["B", "a", "b", "é"]);
}

#[test]
fn test_lookup_cache_disabled() {
    let tmp = TempDir::new().unwrap();
    let config = IngestConfig {
        lookup_cache_capacity: 0,
        ..test_config(tmp.path())
    };
    let source = InMemoryRows::new(
        vec![
            NodeRow::new("a", "P").with_property("k", "1"),
            NodeRow::new("b", "P").with_property("k", "2"),
        ],
        vec![EdgeRow::new("a", "L", "b")],
    );
    let out = tmp.path().join("out");
    ingest(&source, &out, &config).unwrap();
    let graph = GraphReader::open(&out).unwrap();
    assert_eq!(graph.node_by_id("b").unwrap().unwrap().property("k"), Some("2"));
    assert_eq!(graph.edge(0).unwrap().target, "b");
}

#[test]
fn test_phase_order_enforced() {
    let tmp = TempDir::new().unwrap();
    let source = InMemoryRows::default();
    let mut ctx = IngestContext::create(tmp.path().join("out"), test_config(tmp.path())).unwrap();

    assert!(matches!(ctx.edges_pass2(&source), Err(Error::Pipeline(_))));
    ctx.nodes_pass1(&source).unwrap();
    ctx.finish_nodes_pass1().unwrap();
    ctx.build_nodes_id_lex().unwrap();
    assert!(matches!(ctx.materialize_nodes_rec(), Err(Error::Pipeline(_))));
    ctx.edges_label_scan(&source).unwrap();
    ctx.build_dictionaries().unwrap();
    ctx.materialize_nodes_rec().unwrap();
    ctx.edges_pass2(&source).unwrap();
    ctx.finish_edges().unwrap();
    ctx.build_indexes().unwrap();
    let stats = ctx.finish().unwrap();
    assert_eq!(stats.nodes_stored, 0);

    let graph = GraphReader::open(tmp.path().join("out")).unwrap();
    assert_eq!(graph.node_count(), 0);
    assert!(graph.node_by_id("x").unwrap().is_none());
}

#[test]
fn test_missing_input_file() {
    let tmp = TempDir::new().unwrap();
    let source = PgdfFiles::new(tmp.path().join("nope.pgdf"), tmp.path().join("nope2.pgdf"));
    let err = ingest(&source, tmp.path().join("out"), &test_config(tmp.path())).unwrap_err();
    assert!(matches!(err, Error::Input(_)));
}

#[test]
fn test_unwritable_output_location() {
    let tmp = TempDir::new().unwrap();
    let blocker = tmp.path().join("file");
    std::fs::write(&blocker, b"x").unwrap();
    let err = ingest(
        &InMemoryRows::default(),
        blocker.join("out"),
        &test_config(tmp.path()),
    )
    .unwrap_err();
    assert!(matches!(err, Error::Storage(_)));
}

fn node_rows() -> impl Strategy<Value = Vec<NodeRow>> {
    let props = proptest::collection::vec(("[a-c]{1,2}", "[a-zA-Z éÉ]{0,6}"), 0..4);
    proptest::collection::vec(("[A-C]", props), 0..20).prop_map(|rows| {
        rows.into_iter()
            .enumerate()
            .map(|(i, (label, props))| {
                props
                    .into_iter()
                    .fold(NodeRow::new(format!("n{i}"), label), |row, (k, v)| {
                        row.with_property(k, v)
                    })
            })
            .collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_every_node_round_trips(nodes in node_rows()) {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("out");
        let source = InMemoryRows::new(nodes.clone(), vec![]);
        ingest(&source, &out, &test_config(tmp.path())).unwrap();
        let graph = GraphReader::open(&out).unwrap();

        prop_assert_eq!(graph.node_count(), nodes.len());
        for row in &nodes {
            let node = graph.node_by_id(&row.id).unwrap().unwrap();
            prop_assert_eq!(&node.label, &row.label);
            let expected: Vec<(String, String)> = row
                .properties
                .iter()
                .map(|(k, v)| (k.clone(), fold_value(v)))
                .collect();
            prop_assert_eq!(&node.properties, &expected);
            for (k, v) in &expected {
                let members = ordinals(graph.nodes_by_property(k, v).unwrap());
                prop_assert!(members.contains(&node.ordinal));
            }
        }
    }
}
