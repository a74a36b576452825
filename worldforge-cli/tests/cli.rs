use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;

const GRAPH: &str = r#"{
  "version": "1.0",
  "nodes": [
    { "id": "a", "position": { "x": 10, "y": 20 },
      "data": { "type": "character", "name": "Ilsa" } },
    { "id": "b", "position": null,
      "data": { "type": "city", "name": "Karsh", "properties": { "walls": 3 } } }
  ],
  "edges": [
    { "id": "e1", "source": "a", "target": "b", "data": { "type": "located_in" } },
    { "id": "e2", "source": "a", "target": "ghost" }
  ]
}"#;

fn worldforge(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("worldforge").unwrap();
    cmd.current_dir(dir).env_remove("WORLDFORGE_CONFIG");
    cmd
}

fn write_graph(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn validate_lists_warnings() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_graph(dir.path(), "world.json", GRAPH);

    worldforge(dir.path())
        .arg("validate")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("2 nodes, 2 edges, 2 warnings"))
        .stdout(predicate::str::contains("missing target node ghost"));
}

#[test]
fn validate_json_report() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_graph(dir.path(), "world.json", GRAPH);

    let output = worldforge(dir.path())
        .args(["validate", "--json"])
        .arg(&file)
        .output()
        .unwrap();
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["success"], true);
    assert_eq!(report["warnings"].as_array().unwrap().len(), 2);
}

#[test]
fn validate_rejects_non_json_file() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_graph(dir.path(), "world.txt", GRAPH);

    worldforge(dir.path())
        .arg("validate")
        .arg(&file)
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Unsupported file type"));
}

#[test]
fn validate_structural_error_exits_with_import_code() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_graph(dir.path(), "broken.json", r#"{ "nodes": [] }"#);

    worldforge(dir.path())
        .arg("validate")
        .arg(&file)
        .assert()
        .code(3)
        .stderr(predicate::str::contains("'edges' must be an array"));
}

#[test]
fn convert_writes_graphml() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_graph(dir.path(), "world.json", GRAPH);
    let out = dir.path().join("out");

    worldforge(dir.path())
        .arg("convert")
        .arg(&file)
        .args(["--format", "graphml", "--filename", "world.graphml", "--output"])
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("world.graphml"));

    let xml = std::fs::read_to_string(out.join("world.graphml")).unwrap();
    assert!(xml.contains("<node id=\"b\">"));
    assert!(xml.contains("<data key=\"x\">0</data>"));
}

#[test]
fn convert_uses_configured_default_format() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_graph(dir.path(), "world.json", GRAPH);
    std::fs::write(
        dir.path().join("worldforge.toml"),
        "[export]\ndefault_format = \"csv\"\n",
    )
    .unwrap();

    worldforge(dir.path())
        .arg("convert")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains(".csv"));
}

#[test]
fn bad_config_exits_with_config_code() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_graph(dir.path(), "world.json", GRAPH);
    let config = dir.path().join("custom.toml");
    std::fs::write(&config, "[editor]\nhistory_depth = 0\n").unwrap();

    worldforge(dir.path())
        .arg("--config")
        .arg(&config)
        .arg("validate")
        .arg(&file)
        .assert()
        .code(2);
}

#[test]
fn prefs_persist_between_runs() {
    let dir = tempfile::tempdir().unwrap();

    worldforge(dir.path())
        .args(["prefs", "--grid-size", "30", "--snap-to-grid", "true"])
        .assert()
        .success();

    worldforge(dir.path())
        .args(["prefs", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"gridSize\": 30"))
        .stdout(predicate::str::contains("\"snapToGrid\": true"))
        .stdout(predicate::str::contains("\"historyDepth\": 50"));
}

#[test]
fn health_against_closed_port_is_remote_error() {
    let dir = tempfile::tempdir().unwrap();

    worldforge(dir.path())
        .args(["health", "--remote", "http://127.0.0.1:9"])
        .assert()
        .code(4);
}
