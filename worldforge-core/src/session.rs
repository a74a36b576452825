//! Editor session, the intent surface a UI or CLI drives.
//!
//! Bundles configuration, the [`MutationEngine`] and a [`HistoryLog`].
//! Node edits go through the engine; selection, filtering, import and
//! export act on the local store directly.

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use crate::config::WorldforgeConfig;
use crate::engine::{Mutation, MutationEngine};
use crate::error::{ExportError, ImportError, RemoteError};
use crate::history::HistoryLog;
use crate::persistence::LocalPreferences;
use crate::remote::{InMemoryRemote, RemoteStore};
use crate::state::{GraphState, MergeReport};
use crate::transfer::export::{ExportArtifact, ExportFormat, export_graph};
use crate::transfer::import::{
    ImportFile, ImportStrategy, ImportWarning, prepare_import, read_import_file, validate_graph,
};
use crate::types::{Node, NodeFilter, NodePatch, NodeType, Position};

/// What an import did to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOutcome {
    pub warnings: Vec<ImportWarning>,
    pub report: MergeReport,
}

#[derive(Debug)]
pub struct EditorSession {
    config: WorldforgeConfig,
    preferences: LocalPreferences,
    engine: MutationEngine,
    history: HistoryLog,
}

impl EditorSession {
    pub fn new(config: WorldforgeConfig, remote: Arc<dyn RemoteStore>) -> Self {
        let preferences = LocalPreferences::from(&config.editor);
        let history = HistoryLog::new(preferences.history_depth);
        Self {
            config,
            preferences,
            engine: MutationEngine::new(remote),
            history,
        }
    }

    /// Session backed by an in-process remote store.
    pub fn offline(config: WorldforgeConfig) -> Self {
        Self::new(config, Arc::new(InMemoryRemote::new()))
    }

    /// Replace preferences loaded from local storage. The history depth
    /// applies to snapshots recorded from now on.
    #[must_use]
    pub fn with_preferences(mut self, preferences: LocalPreferences) -> Self {
        if preferences.history_depth != self.history.depth() {
            let mut history = HistoryLog::new(preferences.history_depth);
            for snapshot in self.history.iter().cloned() {
                history.push(snapshot);
            }
            self.history = history;
        }
        self.preferences = preferences;
        self
    }

    pub fn config(&self) -> &WorldforgeConfig {
        &self.config
    }

    pub fn preferences(&self) -> &LocalPreferences {
        &self.preferences
    }

    pub fn engine(&self) -> &MutationEngine {
        &self.engine
    }

    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    pub fn read<R>(&self, f: impl FnOnce(&GraphState) -> R) -> R {
        self.engine.read(f)
    }

    // ── Node intents ───────────────────────────────────────────────

    /// Create a node, snapping its position when grid snapping is on.
    pub fn create(&self, node_type: NodeType, position: Position) -> Mutation<Node> {
        let position = Position::new(
            self.preferences.snap(position.x),
            self.preferences.snap(position.y),
        );
        self.engine.create(node_type, position)
    }

    pub fn update(&self, id: &str, patch: NodePatch) -> Mutation<Node> {
        self.engine.update(id, patch)
    }

    pub fn delete(&self, id: &str) -> Mutation<()> {
        self.engine.delete(id)
    }

    pub fn select(&self, id: Option<&str>) {
        let id = id.map(|id| self.engine.resolve_id(id));
        self.engine.write(|s| s.select(id));
    }

    pub fn set_filter(&self, filter: NodeFilter) {
        self.engine.write(|s| s.set_filter(filter));
    }

    pub fn pending_operations_count(&self) -> usize {
        self.engine.pending_operations_count()
    }

    pub fn effective_nodes(&self) -> Vec<Node> {
        self.engine.read(GraphState::effective_nodes)
    }

    pub fn filtered_nodes(&self) -> Vec<Node> {
        self.engine.read(GraphState::filtered_nodes)
    }

    // ── Remote ─────────────────────────────────────────────────────

    /// Fetch remote nodes and seed the store if it has never been seeded.
    pub async fn hydrate(&self) -> Result<bool, RemoteError> {
        let nodes = self.engine.remote().fetch_nodes().await?;
        Ok(self.engine.write(|s| s.hydrate(nodes)))
    }

    pub async fn health(&self) -> Result<bool, RemoteError> {
        self.engine.remote().fetch_health().await
    }

    // ── Import / export ────────────────────────────────────────────

    /// Check, read, validate and apply an import file.
    pub async fn import(
        &mut self,
        file: &ImportFile,
        strategy: ImportStrategy,
    ) -> Result<ImportOutcome, ImportError> {
        let document = read_import_file(file, self.config.import.max_file_size).await?;
        self.import_document(document, strategy)
    }

    /// Validate and apply an already-parsed graph document. The graph as it
    /// was before the import is recorded in the history log.
    ///
    /// Fails with [`ImportError::UnsyncedChanges`] when the import would
    /// overwrite nodes that still have operations in flight.
    pub fn import_document(
        &mut self,
        mut document: Value,
        strategy: ImportStrategy,
    ) -> Result<ImportOutcome, ImportError> {
        let validated = validate_graph(&mut document)?;
        let warnings = validated.warnings.clone();
        for warning in &warnings {
            warn!(%warning, "Import warning");
        }
        let request = prepare_import(validated, strategy)?;

        let app_version = self.config.export.app_version.clone();
        let before = self.engine.read(|s| s.snapshot(Some(app_version)));
        let report = self.engine.apply_import(request)?;
        self.history.push(before);
        info!(
            strategy = %strategy,
            warnings = warnings.len(),
            nodes_added = report.nodes_added,
            "Import complete"
        );
        Ok(ImportOutcome { warnings, report })
    }

    /// Serialize the effective graph. `None` uses the dated default name.
    pub fn export(
        &self,
        format: ExportFormat,
        filename: Option<&str>,
    ) -> Result<ExportArtifact, ExportError> {
        let (nodes, edges) = self
            .engine
            .read(|s| (s.effective_nodes(), s.edges().to_vec()));
        export_graph(
            &nodes,
            &edges,
            format,
            filename,
            Some(&self.config.export.app_version),
        )
    }
}
