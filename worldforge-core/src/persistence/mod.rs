//! Local key-value persistence: editor preferences, a cached copy of the
//! graph, and the queue of changes not yet confirmed remotely.
//!
//! Values are stored as JSON text under namespaced keys. Nothing here runs
//! on a timer; callers decide when to save.

pub mod sqlite;

pub use sqlite::SqliteKeyValueStore;

use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::EditorSection;
use crate::error::PersistenceError;
use crate::types::{Edge, Node, PendingOperation};

/// Namespace prepended to every key.
pub const KEY_NAMESPACE: &str = "worldforge";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
    Nodes,
    Edges,
    PendingChanges,
    LastSaved,
    SnapToGrid,
    AutosaveEnabled,
    AutosaveInterval,
    HistoryDepth,
    GridSize,
}

impl StorageKey {
    pub const ALL: [StorageKey; 9] = [
        Self::Nodes,
        Self::Edges,
        Self::PendingChanges,
        Self::LastSaved,
        Self::SnapToGrid,
        Self::AutosaveEnabled,
        Self::AutosaveInterval,
        Self::HistoryDepth,
        Self::GridSize,
    ];

    /// Full namespaced key, e.g. `worldforge:gridSize`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nodes => "worldforge:nodes",
            Self::Edges => "worldforge:edges",
            Self::PendingChanges => "worldforge:pendingChanges",
            Self::LastSaved => "worldforge:lastSaved",
            Self::SnapToGrid => "worldforge:snapToGrid",
            Self::AutosaveEnabled => "worldforge:autosaveEnabled",
            Self::AutosaveInterval => "worldforge:autosaveInterval",
            Self::HistoryDepth => "worldforge:historyDepth",
            Self::GridSize => "worldforge:gridSize",
        }
    }
}

impl std::fmt::Display for StorageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// String key-value storage.
pub trait KeyValueStore: Send + Sync + std::fmt::Debug {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError>;

    fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError>;

    fn remove(&self, key: &str) -> Result<(), PersistenceError>;
}

/// Volatile store for tests and sessions without a database.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        let entries = self.entries.lock().map_err(|_| PersistenceError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        let mut entries = self.entries.lock().map_err(|_| PersistenceError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        let mut entries = self.entries.lock().map_err(|_| PersistenceError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }
}

// ── Typed access ───────────────────────────────────────────────────

pub fn read_json<T: DeserializeOwned>(
    kv: &dyn KeyValueStore,
    key: StorageKey,
) -> Result<Option<T>, PersistenceError> {
    match kv.get(key.as_str())? {
        Some(text) => Ok(Some(serde_json::from_str(&text)?)),
        None => Ok(None),
    }
}

pub fn write_json<T: Serialize + ?Sized>(
    kv: &dyn KeyValueStore,
    key: StorageKey,
    value: &T,
) -> Result<(), PersistenceError> {
    let text = serde_json::to_string(value)?;
    kv.set(key.as_str(), &text)
}

/// Like [`read_json`], but a stored value that no longer parses is
/// treated as absent.
fn read_lenient<T: DeserializeOwned>(
    kv: &dyn KeyValueStore,
    key: StorageKey,
) -> Result<Option<T>, PersistenceError> {
    match read_json(kv, key) {
        Err(PersistenceError::Serialization(e)) => {
            warn!(key = %key, error = %e, "Ignoring unreadable stored value");
            Ok(None)
        }
        other => other,
    }
}

// ── Preferences ────────────────────────────────────────────────────

/// Per-user editor settings persisted between sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalPreferences {
    pub snap_to_grid: bool,
    pub autosave_enabled: bool,
    pub autosave_interval_ms: u64,
    pub history_depth: usize,
    pub grid_size: u32,
}

impl From<&EditorSection> for LocalPreferences {
    fn from(editor: &EditorSection) -> Self {
        Self {
            snap_to_grid: editor.snap_to_grid,
            autosave_enabled: editor.autosave_enabled,
            autosave_interval_ms: editor.autosave_interval_ms,
            history_depth: editor.history_depth,
            grid_size: editor.grid_size,
        }
    }
}

impl Default for LocalPreferences {
    fn default() -> Self {
        Self::from(&EditorSection::default())
    }
}

impl LocalPreferences {
    /// Load stored preferences, taking each missing or unreadable key
    /// from `defaults`.
    pub fn load(
        kv: &dyn KeyValueStore,
        defaults: &EditorSection,
    ) -> Result<Self, PersistenceError> {
        let fallback = Self::from(defaults);
        Ok(Self {
            snap_to_grid: read_lenient(kv, StorageKey::SnapToGrid)?
                .unwrap_or(fallback.snap_to_grid),
            autosave_enabled: read_lenient(kv, StorageKey::AutosaveEnabled)?
                .unwrap_or(fallback.autosave_enabled),
            autosave_interval_ms: read_lenient(kv, StorageKey::AutosaveInterval)?
                .unwrap_or(fallback.autosave_interval_ms),
            history_depth: read_lenient(kv, StorageKey::HistoryDepth)?
                .filter(|depth: &usize| *depth > 0)
                .unwrap_or(fallback.history_depth),
            grid_size: read_lenient(kv, StorageKey::GridSize)?
                .filter(|size: &u32| *size > 0)
                .unwrap_or(fallback.grid_size),
        })
    }

    pub fn save(&self, kv: &dyn KeyValueStore) -> Result<(), PersistenceError> {
        write_json(kv, StorageKey::SnapToGrid, &self.snap_to_grid)?;
        write_json(kv, StorageKey::AutosaveEnabled, &self.autosave_enabled)?;
        write_json(kv, StorageKey::AutosaveInterval, &self.autosave_interval_ms)?;
        write_json(kv, StorageKey::HistoryDepth, &self.history_depth)?;
        write_json(kv, StorageKey::GridSize, &self.grid_size)?;
        debug!("Saved editor preferences");
        Ok(())
    }

    /// Snap a coordinate to the grid when snapping is on.
    pub fn snap(&self, value: f64) -> f64 {
        if !self.snap_to_grid || self.grid_size == 0 {
            return value;
        }
        let grid = f64::from(self.grid_size);
        (value / grid).round() * grid
    }
}

// ── Graph cache ────────────────────────────────────────────────────

/// Graph contents recovered from local storage.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedGraph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub last_saved: Option<DateTime<Utc>>,
}

/// Store nodes and edges and stamp the save time.
pub fn save_graph(
    kv: &dyn KeyValueStore,
    nodes: &[Node],
    edges: &[Edge],
) -> Result<DateTime<Utc>, PersistenceError> {
    let now = Utc::now();
    write_json(kv, StorageKey::Nodes, nodes)?;
    write_json(kv, StorageKey::Edges, edges)?;
    write_json(kv, StorageKey::LastSaved, &now)?;
    debug!(nodes = nodes.len(), edges = edges.len(), "Saved graph locally");
    Ok(now)
}

/// `None` when no graph has been saved yet.
pub fn load_graph(kv: &dyn KeyValueStore) -> Result<Option<CachedGraph>, PersistenceError> {
    let Some(nodes) = read_json::<Vec<Node>>(kv, StorageKey::Nodes)? else {
        return Ok(None);
    };
    let edges = read_json::<Vec<Edge>>(kv, StorageKey::Edges)?.unwrap_or_default();
    let last_saved = read_lenient(kv, StorageKey::LastSaved)?;
    Ok(Some(CachedGraph {
        nodes,
        edges,
        last_saved,
    }))
}

pub fn append_pending_change(
    kv: &dyn KeyValueStore,
    op: &PendingOperation,
) -> Result<(), PersistenceError> {
    let mut queue = load_pending_changes(kv)?;
    queue.push(op.clone());
    write_json(kv, StorageKey::PendingChanges, &queue)
}

pub fn load_pending_changes(
    kv: &dyn KeyValueStore,
) -> Result<Vec<PendingOperation>, PersistenceError> {
    Ok(read_lenient(kv, StorageKey::PendingChanges)?.unwrap_or_default())
}

pub fn clear_pending_changes(kv: &dyn KeyValueStore) -> Result<(), PersistenceError> {
    kv.remove(StorageKey::PendingChanges.as_str())
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::types::{ConnectionType, NodeData, NodeType, OperationKind, Position};

    #[test]
    fn keys_are_namespaced_and_unique() {
        let mut seen = std::collections::HashSet::new();
        for key in StorageKey::ALL {
            assert!(key.as_str().starts_with("worldforge:"));
            assert!(seen.insert(key.as_str()));
        }
    }

    #[test]
    fn preferences_default_when_nothing_stored() {
        let kv = MemoryKeyValueStore::new();
        let prefs = LocalPreferences::load(&kv, &EditorSection::default()).unwrap();
        assert_eq!(prefs.autosave_interval_ms, 30_000);
        assert_eq!(prefs.history_depth, 50);
        assert_eq!(prefs.grid_size, 15);
        assert!(!prefs.snap_to_grid);
        assert!(prefs.autosave_enabled);
    }

    #[test]
    fn preferences_round_trip_and_ignore_garbage() {
        let kv = MemoryKeyValueStore::new();
        let prefs = LocalPreferences {
            snap_to_grid: true,
            grid_size: 20,
            ..LocalPreferences::default()
        };
        prefs.save(&kv).unwrap();
        kv.set(StorageKey::HistoryDepth.as_str(), "lots").unwrap();

        let loaded = LocalPreferences::load(&kv, &EditorSection::default()).unwrap();
        assert!(loaded.snap_to_grid);
        assert_eq!(loaded.grid_size, 20);
        assert_eq!(loaded.history_depth, 50);
    }

    #[test]
    fn snapping_rounds_to_grid() {
        let mut prefs = LocalPreferences::default();
        assert!((prefs.snap(22.0) - 22.0).abs() < f64::EPSILON);
        prefs.snap_to_grid = true;
        assert!((prefs.snap(22.0) - 15.0).abs() < f64::EPSILON);
        assert!((prefs.snap(23.0) - 30.0).abs() < f64::EPSILON);
    }

    #[test]
    fn graph_cache_round_trip() {
        let kv = MemoryKeyValueStore::new();
        assert!(load_graph(&kv).unwrap().is_none());

        let nodes = vec![Node {
            id: "node-1".into(),
            data: NodeData::new(NodeType::Event),
            position: Position::new(3.0, 4.0),
            created_at: None,
            updated_at: None,
        }];
        let edges = vec![Edge::new("e1", "node-1", "node-1", ConnectionType::CausedBy)];
        let saved_at = save_graph(&kv, &nodes, &edges).unwrap();

        let cached = load_graph(&kv).unwrap().unwrap();
        assert_eq!(cached.nodes, nodes);
        assert_eq!(cached.edges, edges);
        assert_eq!(cached.last_saved, Some(saved_at));
    }

    #[test]
    fn pending_changes_append_and_clear() {
        let kv = MemoryKeyValueStore::new();
        for kind in [OperationKind::Create, OperationKind::Delete] {
            append_pending_change(
                &kv,
                &PendingOperation {
                    operation_id: Uuid::new_v4(),
                    kind,
                    target_id: "node-1".into(),
                    snapshot_before: None,
                    submitted_at: Utc::now(),
                },
            )
            .unwrap();
        }
        let queue = load_pending_changes(&kv).unwrap();
        assert_eq!(queue.len(), 2);
        assert_eq!(queue[1].kind, OperationKind::Delete);

        clear_pending_changes(&kv).unwrap();
        assert!(load_pending_changes(&kv).unwrap().is_empty());
    }
}
