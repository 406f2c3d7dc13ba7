//! Drives the `graphbin` binary end to end

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

const NODES: &str = "@id|@label|name|city\n\
                     n1|Person|Ada|London\n\
                     n2|Person|Alan|London\n\
                     n3|City|London|\n";

const EDGES: &str = "@id|@label|@dir|@out|@in\n\
                     e1|KNOWS|T|n1|n2\n\
                     |LIVES_IN|T|n1|n3\n\
                     e3|LIVES_IN|F|n2|n3\n\
                     e4|LIVES_IN|T|n2|n3\n";

fn graphbin(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_graphbin"))
        .args(args)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .env_remove("GRAPHBIN_CONFIG")
        .output()
        .expect("failed to spawn graphbin")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

/// Millisecond value of the `Query finished in <t> ms` line, if present
fn query_millis(output: &Output) -> Option<f64> {
    stderr(output).lines().find_map(|line| {
        let rest = line.split("Query finished in ").nth(1)?;
        rest.strip_suffix(" ms")?.trim().parse::<f64>().ok()
    })
}

fn path(p: &Path) -> &str {
    p.to_str().unwrap()
}

fn build_store(tmp: &TempDir) -> PathBuf {
    let nodes = tmp.path().join("nodes.pgdf");
    let edges = tmp.path().join("edges.pgdf");
    std::fs::write(&nodes, NODES).unwrap();
    std::fs::write(&edges, EDGES).unwrap();
    let out = tmp.path().join("store");

    let output = graphbin(&["ingest", path(&nodes), path(&edges), path(&out)]);
    assert!(output.status.success(), "ingest failed: {:?}", output);
    assert!(stdout(&output).contains("Ingested 3 nodes and 3 edges"));
    out
}

#[test]
fn test_ingest_and_query_node() {
    let tmp = TempDir::new().unwrap();
    let out = build_store(&tmp);

    let output = graphbin(&["q-node", path(&out), "n1"]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("label=Person"));
    assert!(text.contains("props={name=ada, city=london}"));
}

#[test]
fn test_query_missing_node() {
    let tmp = TempDir::new().unwrap();
    let out = build_store(&tmp);

    let output = graphbin(&["q-node", path(&out), "missing"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output).trim(), "Node not found");
}

#[test]
fn test_query_edges() {
    let tmp = TempDir::new().unwrap();
    let out = build_store(&tmp);

    let output = graphbin(&["q-edge", path(&out), "e1"]);
    let text = stdout(&output);
    assert!(text.contains("label=KNOWS"));
    assert!(text.contains("source=n1"));
    assert!(text.contains("target=n2"));

    let output = graphbin(&["q-edge", path(&out), "e3"]);
    assert_eq!(stdout(&output).trim(), "Edge not found");

    let output = graphbin(&["q-edges-by-label", path(&out), "LIVES_IN"]);
    let ids: Vec<String> = stdout(&output).lines().map(str::to_string).collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&"e4".to_string()));

    let output = graphbin(&["q-src-by-label", path(&out), "LIVES_IN"]);
    assert_eq!(stdout(&output).lines().collect::<Vec<_>>(), vec!["n1", "n2"]);

    let output = graphbin(&["q-dst-by-label", path(&out), "LIVES_IN"]);
    assert_eq!(stdout(&output).lines().collect::<Vec<_>>(), vec!["n3"]);

    let output = graphbin(&["q-src-by-label", path(&out), "LIVES_IN", "--limit", "1"]);
    assert_eq!(stdout(&output).lines().collect::<Vec<_>>(), vec!["n1"]);

    let output = graphbin(&["q-edges-by-label", path(&out), "UNKNOWN"]);
    assert!(output.status.success());
    assert!(stdout(&output).is_empty());
}

#[test]
fn test_query_nodes_by_property() {
    let tmp = TempDir::new().unwrap();
    let out = build_store(&tmp);

    let output = graphbin(&["q-nodes-by-prop", path(&out), "city", "LONDON"]);
    assert_eq!(stdout(&output).lines().collect::<Vec<_>>(), vec!["n1", "n2"]);

    let output = graphbin(&["--json", "q-nodes-by-prop", path(&out), "name", "london"]);
    let listing: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(listing["count"], 1);
    assert_eq!(listing["ids"][0], "n3");
}

#[test]
fn test_queries_report_elapsed_time() {
    let tmp = TempDir::new().unwrap();
    let out = build_store(&tmp);

    for args in [
        vec!["q-node", path(&out), "n1"],
        vec!["q-node", path(&out), "missing"],
        vec!["q-edge", path(&out), "e1"],
        vec!["q-edges-by-label", path(&out), "LIVES_IN"],
        vec!["q-nodes-by-prop", path(&out), "city", "london"],
        vec!["--json", "q-node", path(&out), "n1"],
    ] {
        let output = graphbin(&args);
        assert!(output.status.success(), "{:?}", args);
        let millis = query_millis(&output);
        assert!(
            millis.is_some_and(|ms| ms >= 0.0),
            "no timing line for {:?}: {}",
            args,
            stderr(&output)
        );
        assert!(!stdout(&output).contains(" ms"));
    }

    let output = graphbin(&["q-node", path(&out), "missing"]);
    assert_eq!(stdout(&output).trim(), "Node not found");
}

#[test]
fn test_json_output() {
    let tmp = TempDir::new().unwrap();
    let out = build_store(&tmp);

    let output = graphbin(&["q-node", path(&out), "n2", "--json"]);
    let node: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(node["label"], "Person");
    assert_eq!(node["ordinal"], 1);
    assert_eq!(node["properties"]["name"], "alan");
    assert_eq!(node["properties"]["city"], "london");

    let output = graphbin(&["q-node", path(&out), "missing", "--json"]);
    assert_eq!(stdout(&output).trim(), "null");
}

#[test]
fn test_ingest_json_stats() {
    let tmp = TempDir::new().unwrap();
    let nodes = tmp.path().join("nodes.pgdf");
    let edges = tmp.path().join("edges.pgdf");
    std::fs::write(&nodes, NODES).unwrap();
    std::fs::write(&edges, EDGES).unwrap();
    let out = tmp.path().join("store");

    let output = graphbin(&["--json", "ingest", path(&nodes), path(&edges), path(&out)]);
    assert!(output.status.success());
    let stats: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(stats["nodes_stored"], 3);
    assert_eq!(stats["edges_stored"], 3);
    assert_eq!(stats["edges_non_forward"], 1);
}

#[test]
fn test_usage_errors_exit_two() {
    let output = graphbin(&["ingest", "only-nodes.pgdf"]);
    assert_eq!(output.status.code(), Some(2));

    let output = graphbin(&["q-node"]);
    assert_eq!(output.status.code(), Some(2));

    let output = graphbin(&["no-such-command"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_runtime_errors_exit_one() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("missing.pgdf");
    let out = tmp.path().join("store");

    let output = graphbin(&["ingest", path(&missing), path(&missing), path(&out)]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("ingestion into"));

    let output = graphbin(&["q-node", path(&tmp.path().join("nowhere")), "n1"]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_config_file() {
    let tmp = TempDir::new().unwrap();
    let scratch = tmp.path().join("scratch");
    std::fs::create_dir(&scratch).unwrap();
    let config = tmp.path().join("graphbin.toml");
    std::fs::write(
        &config,
        format!(
            "[ingest]\ntemp_dir = {:?}\nlookup_cache_capacity = 0\n",
            path(&scratch)
        ),
    )
    .unwrap();

    let nodes = tmp.path().join("nodes.pgdf");
    let edges = tmp.path().join("edges.pgdf");
    std::fs::write(&nodes, NODES).unwrap();
    std::fs::write(&edges, EDGES).unwrap();
    let out = tmp.path().join("store");

    let output = graphbin(&[
        "--config",
        path(&config),
        "ingest",
        path(&nodes),
        path(&edges),
        path(&out),
    ]);
    assert!(output.status.success(), "{:?}", output);
    assert_eq!(std::fs::read_dir(&scratch).unwrap().count(), 0);

    let output = graphbin(&["q-node", path(&out), "n3"]);
    assert!(stdout(&output).contains("label=City"));
}
