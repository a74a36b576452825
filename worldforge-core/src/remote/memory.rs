// In-process authoritative store with failure injection and a latency gate.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, OwnedRwLockWriteGuard, RwLock};
use tracing::debug;

use super::RemoteStore;
use crate::error::RemoteError;
use crate::flatten::flatten_node;
use crate::types::{NewNode, Node, NodePatch, OperationKind};

/// Remote store kept entirely in memory.
///
/// Ids are assigned as `node-<n>`. Failures can be injected once per
/// operation kind, and [`hold`](Self::hold) blocks every call until the
/// returned guard is dropped, which lets callers observe optimistic state
/// while a request is still "in flight".
#[derive(Debug, Default)]
pub struct InMemoryRemote {
    inner: Mutex<MemoryInner>,
    gate: Arc<RwLock<()>>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    nodes: Vec<Node>,
    next_id: u64,
    unhealthy: bool,
    /// Scripted outcomes per kind; `None` lets the call through.
    script: HashMap<OperationKind, VecDeque<Option<RemoteError>>>,
    calls: Vec<RemoteCall>,
}

/// One request observed by [`InMemoryRemote`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCall {
    pub kind: OperationKind,
    /// Target id; empty for creates.
    pub target_id: String,
}

impl InMemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with existing authoritative records.
    pub fn with_nodes(nodes: Vec<Node>) -> Self {
        let next_id = nodes
            .iter()
            .filter_map(|n| n.id.strip_prefix("node-")?.parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        Self {
            inner: Mutex::new(MemoryInner {
                nodes,
                next_id,
                ..MemoryInner::default()
            }),
            gate: Arc::default(),
        }
    }

    /// Make the next unscripted call of `kind` fail with `error`. Scripted
    /// outcomes are consumed in the order they were added.
    pub async fn fail_next(&self, kind: OperationKind, error: RemoteError) {
        self.script(kind, Some(error)).await;
    }

    /// Let the next unscripted call of `kind` succeed. Combined with
    /// [`fail_next`](Self::fail_next) this targets a later call.
    pub async fn pass_next(&self, kind: OperationKind) {
        self.script(kind, None).await;
    }

    async fn script(&self, kind: OperationKind, outcome: Option<RemoteError>) {
        self.inner
            .lock()
            .await
            .script
            .entry(kind)
            .or_default()
            .push_back(outcome);
    }

    pub async fn set_healthy(&self, healthy: bool) {
        self.inner.lock().await.unhealthy = !healthy;
    }

    /// Block all calls until the guard is dropped.
    pub async fn hold(&self) -> OwnedRwLockWriteGuard<()> {
        Arc::clone(&self.gate).write_owned().await
    }

    pub async fn nodes(&self) -> Vec<Node> {
        self.inner.lock().await.nodes.clone()
    }

    pub async fn calls(&self) -> Vec<RemoteCall> {
        self.inner.lock().await.calls.clone()
    }

    async fn begin(&self, kind: OperationKind, target_id: &str) -> Result<(), RemoteError> {
        let _open = self.gate.read().await;
        let mut inner = self.inner.lock().await;
        inner.calls.push(RemoteCall {
            kind,
            target_id: target_id.to_string(),
        });
        let injected = inner
            .script
            .get_mut(&kind)
            .and_then(VecDeque::pop_front)
            .flatten();
        match injected {
            Some(err) => {
                debug!(kind = %kind, target = target_id, "Injected remote failure");
                Err(err)
            }
            None => Ok(()),
        }
    }
}

#[async_trait::async_trait]
#[allow(clippy::unnecessary_literal_bound)]
impl RemoteStore for InMemoryRemote {
    fn name(&self) -> &str {
        "memory"
    }

    async fn create_node(&self, node: NewNode) -> Result<Node, RemoteError> {
        self.begin(OperationKind::Create, "").await?;
        let mut inner = self.inner.lock().await;
        inner.next_id += 1;
        let now = Utc::now();
        let record = flatten_node(Node {
            id: format!("node-{}", inner.next_id),
            data: node.data,
            position: node.position,
            created_at: Some(now),
            updated_at: Some(now),
        });
        inner.nodes.push(record.clone());
        Ok(record)
    }

    async fn update_node(&self, id: &str, patch: NodePatch) -> Result<Node, RemoteError> {
        self.begin(OperationKind::Update, id).await?;
        let mut inner = self.inner.lock().await;
        let slot = inner
            .nodes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| RemoteError::NotFound(id.to_string()))?;
        let mut updated = patch
            .apply_to(slot)
            .map_err(|e| RemoteError::Rejected(e.to_string()))?;
        updated.updated_at = Some(Utc::now());
        *slot = updated.clone();
        Ok(updated)
    }

    async fn delete_node(&self, id: &str) -> Result<(), RemoteError> {
        self.begin(OperationKind::Delete, id).await?;
        let mut inner = self.inner.lock().await;
        let before = inner.nodes.len();
        inner.nodes.retain(|n| n.id != id);
        if inner.nodes.len() == before {
            return Err(RemoteError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn fetch_nodes(&self) -> Result<Vec<Node>, RemoteError> {
        let _open = self.gate.read().await;
        Ok(self.inner.lock().await.nodes.clone())
    }

    async fn fetch_health(&self) -> Result<bool, RemoteError> {
        let _open = self.gate.read().await;
        Ok(!self.inner.lock().await.unhealthy)
    }
}
