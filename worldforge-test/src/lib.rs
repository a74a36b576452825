// Integration test utilities and fixtures for Worldforge.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Value, json};

use worldforge_core::config::WorldforgeConfig;
use worldforge_core::remote::InMemoryRemote;
use worldforge_core::session::EditorSession;
use worldforge_core::types::{Node, NodeData, NodeType, Position};

/// A scratch directory for import and export files.
#[derive(Debug)]
pub struct TestWorld {
    pub dir: tempfile::TempDir,
}

impl TestWorld {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create tempdir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write_json(&self, name: &str, value: &Value) -> PathBuf {
        let text = serde_json::to_string_pretty(value).expect("serialize fixture");
        self.write_text(name, &text)
    }

    pub fn write_text(&self, name: &str, text: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, text).expect("write fixture");
        path
    }
}

impl Default for TestWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// A small, fully valid world: one node of every type, a few relations,
/// and one node that still wraps its fields in a `properties` bag.
pub fn clean_graph() -> Value {
    json!({
        "version": "1.0",
        "exportDate": "2024-05-01T10:00:00.000Z",
        "metadata": { "nodeCount": 5, "edgeCount": 4 },
        "nodes": [
            { "id": "c1", "type": "custom", "position": { "x": 0, "y": 0 },
              "data": { "type": "character", "name": "Ilsa Venn", "age": 34 } },
            { "id": "f1", "type": "custom", "position": { "x": 200, "y": 0 },
              "data": { "type": "faction", "name": "Iron Circle",
                        "properties": { "motto": "Hold the line", "members": 120 } } },
            { "id": "t1", "type": "custom", "position": { "x": 400, "y": 0 },
              "data": { "type": "city", "name": "Karsh", "population": 12000 } },
            { "id": "e1", "type": "custom", "position": { "x": 0, "y": 200 },
              "data": { "type": "event", "name": "The Sundering", "year": -40 } },
            { "id": "l1", "type": "custom", "position": { "x": 200, "y": 200 },
              "data": { "type": "location", "name": "Ashen Pass",
                        "connectionDirection": "horizontal" } }
        ],
        "edges": [
            { "id": "r1", "source": "c1", "target": "f1",
              "data": { "type": "member_of", "strength": "strong" } },
            { "id": "r2", "source": "f1", "target": "t1",
              "data": { "type": "governs" } },
            { "id": "r3", "source": "t1", "target": "l1",
              "data": { "type": "located_in", "bidirectional": false } },
            { "id": "r4", "source": "c1", "target": "e1", "animated": true,
              "data": { "type": "participated_in", "label": "survivor" } }
        ]
    })
}

/// A graph with every recoverable defect: missing name, missing and
/// unknown types, bad positions, a duplicate id and dangling edges.
pub fn messy_graph() -> Value {
    json!({
        "nodes": [
            { "id": "n1", "data": { "type": "character" }, "position": { "x": 1, "y": 1 } },
            { "id": "n2", "data": { "name": "Typeless" }, "position": { "x": "left", "y": 0 } },
            { "id": "n3", "data": { "type": "dragon", "name": "Vex" } },
            { "id": "n1", "data": { "type": "city", "name": "Again" }, "position": { "x": 5, "y": 5 } }
        ],
        "edges": [
            { "id": "x1", "source": "n1", "target": "nowhere" },
            { "id": "x2", "source": "void", "target": "n2" }
        ]
    })
}

pub fn node(id: &str, node_type: NodeType, name: &str) -> Node {
    let mut data = NodeData::new(node_type);
    data.name = name.to_string();
    Node {
        id: id.to_string(),
        data,
        position: Position::default(),
        created_at: None,
        updated_at: None,
    }
}

/// Offline session wired to an inspectable in-memory remote.
pub fn session_with_remote(nodes: Vec<Node>) -> (EditorSession, Arc<InMemoryRemote>) {
    let remote = Arc::new(InMemoryRemote::with_nodes(nodes));
    let session = EditorSession::new(WorldforgeConfig::default(), remote.clone());
    (session, remote)
}
