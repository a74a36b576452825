//! Local graph state store: the in-memory source of truth for what the
//! user currently sees.
//!
//! All setters are synchronous and side-effect free beyond the store itself.
//! Derived views ([`GraphState::effective_nodes`], [`GraphState::filtered_nodes`])
//! are recomputed on every call from the owned collections.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::flatten::flatten_node;
use crate::transfer::import::{ImportRequest, ImportStrategy};
use crate::types::{Edge, GraphSnapshot, Node, NodeFilter, NodeType};

/// Transient UI visibility flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiFlags {
    pub sidebar_open: bool,
    pub analytics_open: bool,
}

/// Outcome of applying an import to the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub strategy: Option<ImportStrategy>,
    pub nodes_added: usize,
    pub edges_added: usize,
    /// Ids of existing nodes overwritten by imported ones.
    pub node_conflicts: Vec<String>,
    /// Ids of existing edges overwritten by imported ones.
    pub edge_conflicts: Vec<String>,
}

impl MergeReport {
    pub fn has_conflicts(&self) -> bool {
        !self.node_conflicts.is_empty() || !self.edge_conflicts.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct GraphState {
    nodes: Vec<Node>,
    drafts: BTreeMap<String, Node>,
    edges: Vec<Edge>,
    selected: Option<String>,
    filter: NodeFilter,
    ui: UiFlags,
    dragging: Option<NodeType>,
    hydrated: bool,
}

impl GraphState {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Accessors ──────────────────────────────────────────────────

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// The selected node, as the user sees it (draft included).
    pub fn selected_node(&self) -> Option<Node> {
        let id = self.selected.as_deref()?;
        self.drafts.get(id).or_else(|| self.node(id)).cloned()
    }

    pub fn filter(&self) -> NodeFilter {
        self.filter
    }

    pub fn ui(&self) -> UiFlags {
        self.ui
    }

    pub fn dragging(&self) -> Option<NodeType> {
        self.dragging
    }

    pub fn draft(&self, id: &str) -> Option<&Node> {
        self.drafts.get(id)
    }

    pub fn is_hydrated(&self) -> bool {
        self.hydrated
    }

    // ── Setters ────────────────────────────────────────────────────

    pub fn set_nodes(&mut self, nodes: Vec<Node>) {
        self.nodes = nodes.into_iter().map(flatten_node).collect();
    }

    pub fn set_edges(&mut self, edges: Vec<Edge>) {
        self.edges = edges;
    }

    pub fn select(&mut self, id: Option<String>) {
        self.selected = id;
    }

    pub fn set_filter(&mut self, filter: NodeFilter) {
        self.filter = filter;
    }

    pub fn set_sidebar_open(&mut self, open: bool) {
        self.ui.sidebar_open = open;
    }

    pub fn set_analytics_open(&mut self, open: bool) {
        self.ui.analytics_open = open;
    }

    pub fn set_dragging(&mut self, node_type: Option<NodeType>) {
        self.dragging = node_type;
    }

    /// Record an in-progress edit that has not been submitted yet.
    pub fn set_draft(&mut self, node: Node) {
        let node = flatten_node(node);
        self.drafts.insert(node.id.clone(), node);
    }

    pub fn clear_draft(&mut self, id: &str) -> Option<Node> {
        self.drafts.remove(id)
    }

    /// Replace the node with the same id, or append it.
    pub fn upsert_node(&mut self, node: Node) {
        let node = flatten_node(node);
        match self.nodes.iter_mut().find(|n| n.id == node.id) {
            Some(slot) => *slot = node,
            None => self.nodes.push(node),
        }
    }

    /// Replace the node stored under `id` (which may differ from `node.id`,
    /// e.g. a placeholder being swapped for its confirmed record).
    /// Appends when `id` is absent.
    pub fn replace_node(&mut self, id: &str, node: Node) {
        let node = flatten_node(node);
        if node.id != id {
            if let Some(draft) = self.drafts.remove(id) {
                self.drafts.insert(node.id.clone(), Node { id: node.id.clone(), ..draft });
            }
            if self.selected.as_deref() == Some(id) {
                self.selected = Some(node.id.clone());
            }
            // A stale entry under the new id must not survive next to the swap.
            self.nodes.retain(|n| n.id != node.id);
        }
        match self.nodes.iter_mut().find(|n| n.id == id) {
            Some(slot) => *slot = node,
            None => self.nodes.push(node),
        }
    }

    /// Re-insert a node at a given position (used when undoing a delete).
    pub fn insert_node_at(&mut self, index: usize, node: Node) {
        let node = flatten_node(node);
        if let Some(slot) = self.nodes.iter_mut().find(|n| n.id == node.id) {
            *slot = node;
            return;
        }
        let index = index.min(self.nodes.len());
        self.nodes.insert(index, node);
    }

    /// Remove a node. Returns it with its former index.
    pub fn remove_node(&mut self, id: &str) -> Option<(usize, Node)> {
        let index = self.nodes.iter().position(|n| n.id == id)?;
        let node = self.nodes.remove(index);
        self.drafts.remove(id);
        if self.selected.as_deref() == Some(id) {
            self.selected = None;
        }
        Some((index, node))
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.id == id)
    }

    // ── Derived views ──────────────────────────────────────────────

    /// Server-known nodes with in-progress drafts shadowing them by id.
    pub fn effective_nodes(&self) -> Vec<Node> {
        overlay_nodes(&self.nodes, &self.drafts)
    }

    /// Effective nodes projected through the active filter.
    pub fn filtered_nodes(&self) -> Vec<Node> {
        filter_nodes(&self.effective_nodes(), self.filter)
    }

    /// Portable snapshot of the effective graph.
    pub fn snapshot(&self, app_version: Option<String>) -> GraphSnapshot {
        GraphSnapshot::new(self.effective_nodes(), self.edges.clone(), app_version)
    }

    // ── Hydration & import ─────────────────────────────────────────

    /// Seed the store from the first remote fetch.
    ///
    /// Seeds only when nothing has been seeded yet, the local collection is
    /// empty and the remote set is not. Later calls are ignored, so local
    /// edits made before the fetch completed are never discarded.
    /// Returns whether the store was seeded.
    pub fn hydrate(&mut self, remote: Vec<Node>) -> bool {
        if self.hydrated {
            debug!("Ignoring remote fetch: store already hydrated");
            return false;
        }
        if remote.is_empty() {
            return false;
        }
        self.hydrated = true;
        if !self.nodes.is_empty() {
            debug!(
                local = self.nodes.len(),
                "Keeping local nodes over first remote fetch"
            );
            return false;
        }
        info!(count = remote.len(), "Hydrated local store from remote");
        self.set_nodes(remote);
        true
    }

    /// Bulk replace or merge an imported graph.
    pub fn apply_import(&mut self, request: ImportRequest) -> MergeReport {
        let ImportRequest { strategy, data } = request;
        let mut report = MergeReport {
            strategy: Some(strategy),
            ..MergeReport::default()
        };

        match strategy {
            ImportStrategy::Replace => {
                report.nodes_added = data.nodes.len();
                report.edges_added = data.edges.len();
                self.set_nodes(data.nodes);
                self.edges = data.edges;

                let ids: HashSet<&str> = self.nodes.iter().map(|n| n.id.as_str()).collect();
                self.drafts.retain(|id, _| ids.contains(id.as_str()));
                if self
                    .selected
                    .as_deref()
                    .is_some_and(|id| !ids.contains(id))
                {
                    self.selected = None;
                }
            }
            ImportStrategy::Merge => {
                let mut node_index: HashMap<String, usize> = self
                    .nodes
                    .iter()
                    .enumerate()
                    .map(|(i, n)| (n.id.clone(), i))
                    .collect();
                for node in data.nodes {
                    let node = flatten_node(node);
                    if let Some(&i) = node_index.get(&node.id) {
                        report.node_conflicts.push(node.id.clone());
                        self.nodes[i] = node;
                    } else {
                        node_index.insert(node.id.clone(), self.nodes.len());
                        self.nodes.push(node);
                        report.nodes_added += 1;
                    }
                }

                let mut edge_index: HashMap<String, usize> = self
                    .edges
                    .iter()
                    .enumerate()
                    .map(|(i, e)| (e.id.clone(), i))
                    .collect();
                for edge in data.edges {
                    if let Some(&i) = edge_index.get(&edge.id) {
                        report.edge_conflicts.push(edge.id.clone());
                        self.edges[i] = edge;
                    } else {
                        edge_index.insert(edge.id.clone(), self.edges.len());
                        self.edges.push(edge);
                        report.edges_added += 1;
                    }
                }
            }
        }

        info!(
            strategy = ?strategy,
            nodes_added = report.nodes_added,
            edges_added = report.edges_added,
            conflicts = report.node_conflicts.len() + report.edge_conflicts.len(),
            "Applied import to local store"
        );
        report
    }
}

/// Overlay `drafts` onto `base` by id, preserving the order of `base`.
pub fn overlay_nodes(base: &[Node], drafts: &BTreeMap<String, Node>) -> Vec<Node> {
    base.iter()
        .map(|n| drafts.get(&n.id).unwrap_or(n).clone())
        .collect()
}

/// Keep nodes matching `filter`, preserving order.
pub fn filter_nodes(nodes: &[Node], filter: NodeFilter) -> Vec<Node> {
    nodes.iter().filter(|n| filter.matches(n)).cloned().collect()
}
