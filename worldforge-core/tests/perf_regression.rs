use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{Value, json};

use worldforge_core::config::WorldforgeConfig;
use worldforge_core::persistence::{self, SqliteKeyValueStore};
use worldforge_core::remote::InMemoryRemote;
use worldforge_core::session::EditorSession;
use worldforge_core::transfer::export::ExportFormat;
use worldforge_core::transfer::import::ImportStrategy;
use worldforge_core::types::NodePatch;

fn threshold_ms(var: &str, default_ms: u64) -> Duration {
    let ms = std::env::var(var)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default_ms);
    Duration::from_millis(ms)
}

fn synthetic_graph(node_count: usize) -> Value {
    let types = ["character", "faction", "city", "event", "location"];
    let nodes: Vec<Value> = (0..node_count)
        .map(|i| {
            json!({
                "id": format!("node-{}", i + 1),
                "position": { "x": (i % 40) * 150, "y": (i / 40) * 150 },
                "data": {
                    "type": types[i % types.len()],
                    "name": format!("Entity {i}"),
                    "properties": { "rank": i, "notes": "x".repeat(64) }
                }
            })
        })
        .collect();
    let edges: Vec<Value> = (1..node_count)
        .map(|i| {
            json!({
                "id": format!("r{i}"),
                "source": format!("node-{i}"),
                "target": format!("node-{}", i + 1),
                "data": { "type": "ally" }
            })
        })
        .collect();
    json!({ "version": "1.0", "nodes": nodes, "edges": edges })
}

fn loaded_session(node_count: usize) -> EditorSession {
    let mut session = EditorSession::offline(WorldforgeConfig::default());
    session
        .import_document(synthetic_graph(node_count), ImportStrategy::Replace)
        .unwrap();
    session
}

#[tokio::test]
#[ignore = "performance gate; run explicitly in CI/dev workflows"]
async fn perf_import_under_threshold() {
    let document = synthetic_graph(5000);
    let mut session = EditorSession::offline(WorldforgeConfig::default());

    let t0 = Instant::now();
    let outcome = session
        .import_document(document, ImportStrategy::Replace)
        .unwrap();
    let elapsed = t0.elapsed();

    assert!(outcome.warnings.is_empty());
    assert_eq!(outcome.report.nodes_added, 5000);
    assert!(
        elapsed <= threshold_ms("WORLDFORGE_PERF_IMPORT_MS", 3000),
        "import exceeded threshold: {elapsed:?}"
    );
}

#[tokio::test]
#[ignore = "performance gate; run explicitly in CI/dev workflows"]
async fn perf_export_under_threshold() {
    let session = loaded_session(5000);

    let t0 = Instant::now();
    for format in [ExportFormat::Json, ExportFormat::Csv, ExportFormat::Graphml] {
        session.export(format, None).unwrap();
    }
    let elapsed = t0.elapsed();

    assert!(
        elapsed <= threshold_ms("WORLDFORGE_PERF_EXPORT_MS", 3000),
        "export exceeded threshold: {elapsed:?}"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "performance gate; run explicitly in CI/dev workflows"]
async fn perf_optimistic_updates_settle_under_threshold() {
    let seeded = loaded_session(1000);
    let nodes = seeded.effective_nodes();
    let remote = Arc::new(InMemoryRemote::with_nodes(nodes.clone()));
    let session = EditorSession::new(WorldforgeConfig::default(), remote);
    session.hydrate().await.unwrap();

    let t0 = Instant::now();
    let mutations: Vec<_> = nodes
        .iter()
        .map(|n| session.update(&n.id, NodePatch::new().set("name", "Renamed")))
        .collect();
    for mutation in mutations {
        mutation.await.unwrap();
    }
    let elapsed = t0.elapsed();

    assert_eq!(session.pending_operations_count(), 0);
    assert!(
        elapsed <= threshold_ms("WORLDFORGE_PERF_UPDATES_MS", 5000),
        "optimistic updates exceeded threshold: {elapsed:?}"
    );
}

#[tokio::test]
#[ignore = "performance gate; run explicitly in CI/dev workflows"]
async fn perf_local_cache_save_under_threshold() {
    let dir = tempfile::tempdir().unwrap();
    let kv = SqliteKeyValueStore::open(&dir.path().join("cache.db")).unwrap();
    let session = loaded_session(5000);
    let (nodes, edges) = session.read(|s| (s.effective_nodes(), s.edges().to_vec()));

    let t0 = Instant::now();
    persistence::save_graph(&kv, &nodes, &edges).unwrap();
    let cached = persistence::load_graph(&kv).unwrap().unwrap();
    let elapsed = t0.elapsed();

    assert_eq!(cached.nodes.len(), 5000);
    assert!(
        elapsed <= threshold_ms("WORLDFORGE_PERF_CACHE_MS", 3000),
        "local cache round trip exceeded threshold: {elapsed:?}"
    );
}
