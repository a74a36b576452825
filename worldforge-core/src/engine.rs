//! Optimistic mutation engine.
//!
//! Every create, update and delete is applied to the local [`GraphState`]
//! immediately and then confirmed against the [`RemoteStore`] in the
//! background. Operations on the same node reach the remote store in the
//! order they were issued. For each node the engine keeps the last
//! confirmed record plus the effects still in flight; whenever one of them
//! settles, the visible node is recomputed from that ledger. A failed
//! operation therefore only removes its own effect, and the most recently
//! issued edit is what the user ends up seeing.

use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use chrono::Utc;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{ImportError, MutationError, RemoteError};
use crate::flatten::flatten_node;
use crate::remote::RemoteStore;
use crate::state::{GraphState, MergeReport};
use crate::transfer::import::{ImportRequest, ImportStrategy};
use crate::types::{
    NewNode, Node, NodeData, NodePatch, NodeType, OperationKind, PatchError, PendingOperation,
    Position,
};

/// Prefix of locally synthesized ids awaiting confirmation.
pub const PLACEHOLDER_PREFIX: &str = "temp-";

pub fn is_placeholder(id: &str) -> bool {
    id.starts_with(PLACEHOLDER_PREFIX)
}

// ── Mutation handle ────────────────────────────────────────────────

/// Outcome of an optimistic mutation.
///
/// The local effect is already visible when this is returned. Awaiting it
/// yields the confirmed result once the remote store answers; dropping it
/// does not cancel anything.
#[must_use = "the mutation runs regardless; await it to observe the outcome"]
#[derive(Debug)]
pub struct Mutation<T> {
    target_id: String,
    state: MutationState<T>,
}

#[derive(Debug)]
enum MutationState<T> {
    Rejected(Option<MutationError>),
    Running(JoinHandle<Result<T, MutationError>>),
}

impl<T> Mutation<T> {
    fn rejected(target_id: &str, err: MutationError) -> Self {
        Self {
            target_id: target_id.to_string(),
            state: MutationState::Rejected(Some(err)),
        }
    }

    /// Id the mutation was issued against. For creates this is the
    /// placeholder id.
    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    /// `true` when the mutation was refused before touching any state.
    pub fn is_rejected(&self) -> bool {
        matches!(self.state, MutationState::Rejected(_))
    }
}

impl<T> Future for Mutation<T> {
    type Output = Result<T, MutationError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().state {
            MutationState::Rejected(err) => Poll::Ready(Err(err.take().unwrap_or_else(|| {
                MutationError::Aborted("mutation polled after completion".into())
            }))),
            MutationState::Running(handle) => Pin::new(handle).poll(cx).map(|joined| {
                joined.unwrap_or_else(|e| Err(MutationError::Aborted(e.to_string())))
            }),
        }
    }
}

/// What a successful remote call tells the ledger.
trait Confirmation {
    fn confirmed(&self) -> Option<&Node>;
}

impl Confirmation for Node {
    fn confirmed(&self) -> Option<&Node> {
        Some(self)
    }
}

impl Confirmation for () {
    fn confirmed(&self) -> Option<&Node> {
        None
    }
}

// ── Ledger ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Effect {
    Create(Node),
    Update(NodePatch),
    Delete,
}

/// Confirmed record of one node plus its unsettled effects in issue order.
#[derive(Debug)]
struct TargetEntry {
    base: Option<Node>,
    pending: VecDeque<(Uuid, Effect)>,
    /// Index the node occupied before it was last taken out of the store.
    slot: usize,
}

impl TargetEntry {
    fn visible(&self) -> Option<Node> {
        self.pending
            .iter()
            .fold(self.base.clone(), |acc, (_, effect)| match effect {
                Effect::Create(node) => Some(node.clone()),
                Effect::Update(patch) => acc.map(|node| patch.apply_to(&node).unwrap_or(node)),
                Effect::Delete => None,
            })
    }
}

/// Tail of a target's FIFO chain. The next operation waits on `tail`,
/// which resolves when the operation holding its sender settles.
#[derive(Debug)]
struct Lane {
    seq: u64,
    tail: oneshot::Receiver<()>,
}

/// Everything an issued operation needs to run its remote leg.
#[derive(Debug)]
struct Ticket {
    operation_id: Uuid,
    kind: OperationKind,
    target: String,
    seq: u64,
    prev: Option<oneshot::Receiver<()>>,
    done: oneshot::Sender<()>,
}

#[derive(Debug, Default)]
struct Shared {
    state: GraphState,
    entries: HashMap<String, TargetEntry>,
    operations: Vec<PendingOperation>,
    /// Placeholder id -> confirmed id.
    aliases: HashMap<String, String>,
    /// Unsettled operations issued against each placeholder. The alias is
    /// dropped once this reaches zero.
    placeholder_refs: HashMap<String, usize>,
    /// Placeholders whose create failed while other operations were queued.
    orphaned: HashSet<String>,
    lanes: HashMap<String, Lane>,
    next_seq: u64,
}

impl Shared {
    fn canonical(&self, id: &str) -> String {
        let mut current = id;
        while let Some(next) = self.aliases.get(current) {
            current = next;
        }
        current.to_string()
    }

    fn enqueue(
        &mut self,
        kind: OperationKind,
        target: &str,
        effect: Effect,
        snapshot_before: Option<Node>,
    ) -> Ticket {
        let operation_id = Uuid::new_v4();
        let slot = self
            .state
            .index_of(target)
            .unwrap_or(self.state.nodes().len());
        let base = self.state.node(target).cloned();
        self.entries
            .entry(target.to_string())
            .or_insert_with(|| TargetEntry {
                base,
                pending: VecDeque::new(),
                slot,
            })
            .pending
            .push_back((operation_id, effect));
        self.operations.push(PendingOperation {
            operation_id,
            kind,
            target_id: target.to_string(),
            snapshot_before,
            submitted_at: Utc::now(),
        });
        self.refresh(target);
        if is_placeholder(target) {
            *self.placeholder_refs.entry(target.to_string()).or_default() += 1;
        }

        self.next_seq += 1;
        let seq = self.next_seq;
        let (done, tail) = oneshot::channel();
        let prev = self
            .lanes
            .insert(target.to_string(), Lane { seq, tail })
            .map(|lane| lane.tail);

        Ticket {
            operation_id,
            kind,
            target: target.to_string(),
            seq,
            prev,
            done,
        }
    }

    /// Id to send to the remote store, or why the operation cannot run.
    fn resolve(&self, issued: &str) -> Result<String, MutationError> {
        let key = self.canonical(issued);
        if self.orphaned.contains(&key) {
            return Err(MutationError::Orphaned(issued.to_string()));
        }
        Ok(key)
    }

    /// Write the ledger's view of `key` into the store.
    fn refresh(&mut self, key: &str) {
        let Some(entry) = self.entries.get_mut(key) else {
            return;
        };
        match entry.visible() {
            Some(node) => {
                if self.state.index_of(key).is_some() {
                    self.state.replace_node(key, node);
                } else {
                    self.state.insert_node_at(entry.slot, node);
                }
            }
            None => {
                if let Some((index, _)) = self.state.remove_node(key) {
                    entry.slot = index;
                }
            }
        }
        if entry.pending.is_empty() {
            self.entries.remove(key);
            self.orphaned.remove(key);
        }
    }

    fn settle(
        &mut self,
        issued: &str,
        operation_id: Uuid,
        outcome: Result<Option<Node>, &MutationError>,
    ) {
        self.operations.retain(|op| op.operation_id != operation_id);
        let key = self.canonical(issued);
        let Some(entry) = self.entries.get_mut(&key) else {
            return;
        };
        let Some(position) = entry.pending.iter().position(|(id, _)| *id == operation_id) else {
            return;
        };
        let Some((_, effect)) = entry.pending.remove(position) else {
            return;
        };

        match (effect, outcome) {
            (Effect::Create(_), Ok(Some(record))) => {
                entry.base = Some(record.clone());
                self.confirm_placeholder(&key, record);
            }
            (Effect::Create(_), Err(_)) => {
                self.orphaned.insert(key.clone());
                self.refresh(&key);
            }
            (Effect::Update(_), Ok(Some(record))) => {
                entry.base = Some(record);
                self.refresh(&key);
            }
            (Effect::Delete, Ok(_)) => {
                entry.base = None;
                self.refresh(&key);
            }
            // Failure: the confirmed base stays as it was.
            _ => self.refresh(&key),
        }
    }

    /// Swap a placeholder for its confirmed record and move everything
    /// keyed by it to the real id.
    fn confirm_placeholder(&mut self, placeholder: &str, record: Node) {
        let real = record.id.clone();
        if real != placeholder {
            if let Some(entry) = self.entries.remove(placeholder) {
                self.entries.insert(real.clone(), entry);
            }
            if let Some(lane) = self.lanes.remove(placeholder) {
                self.lanes.insert(real.clone(), lane);
            }
            self.aliases.insert(placeholder.to_string(), real.clone());
            for op in &mut self.operations {
                if op.target_id == placeholder {
                    op.target_id.clone_from(&real);
                }
            }
            if self.state.index_of(placeholder).is_some() {
                self.state.replace_node(placeholder, record);
            }
        }
        self.refresh(&real);
    }

    /// Drop the alias of `issued` once nothing in flight still names it.
    fn release_placeholder(&mut self, issued: &str) {
        let Some(count) = self.placeholder_refs.get_mut(issued) else {
            return;
        };
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.placeholder_refs.remove(issued);
            self.aliases.remove(issued);
        }
    }

    /// Operations in flight that `request` would overwrite.
    fn blocking_import(&self, request: &ImportRequest) -> usize {
        match request.strategy {
            ImportStrategy::Replace => self.operations.len(),
            ImportStrategy::Merge => {
                let incoming: HashSet<&str> =
                    request.data.nodes.iter().map(|n| n.id.as_str()).collect();
                self.operations
                    .iter()
                    .filter(|op| incoming.contains(op.target_id.as_str()))
                    .count()
            }
        }
    }

    /// Forget the lane if no later operation chained onto it.
    fn release_lane(&mut self, issued: &str, seq: u64) {
        let key = self.canonical(issued);
        if self.lanes.get(&key).is_some_and(|lane| lane.seq == seq) {
            self.lanes.remove(&key);
        }
    }
}

// ── Engine ─────────────────────────────────────────────────────────

#[derive(Debug)]
struct EngineInner {
    shared: Mutex<Shared>,
    remote: Arc<dyn RemoteStore>,
}

impl EngineInner {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Applies intents locally and reconciles them with the remote store.
///
/// Cloning is cheap; clones share the same store and ledger. Mutation entry
/// points must be called from within a Tokio runtime.
#[derive(Debug, Clone)]
pub struct MutationEngine {
    inner: Arc<EngineInner>,
}

impl MutationEngine {
    pub fn new(remote: Arc<dyn RemoteStore>) -> Self {
        Self::with_state(remote, GraphState::new())
    }

    pub fn with_state(remote: Arc<dyn RemoteStore>, state: GraphState) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                shared: Mutex::new(Shared {
                    state,
                    ..Shared::default()
                }),
                remote,
            }),
        }
    }

    pub fn remote(&self) -> Arc<dyn RemoteStore> {
        Arc::clone(&self.inner.remote)
    }

    /// Run `f` against the current store.
    pub fn read<R>(&self, f: impl FnOnce(&GraphState) -> R) -> R {
        f(&self.inner.lock().state)
    }

    /// Run `f` with mutable access to the store. Nodes with operations in
    /// flight are rewritten from the ledger when those operations settle.
    pub fn write<R>(&self, f: impl FnOnce(&mut GraphState) -> R) -> R {
        f(&mut self.inner.lock().state)
    }

    /// Apply a bulk import under the ledger lock.
    ///
    /// A replace import is refused while any operation is in flight; a merge
    /// import is refused while an operation targets one of its node ids.
    pub fn apply_import(&self, request: ImportRequest) -> Result<MergeReport, ImportError> {
        let mut shared = self.inner.lock();
        let pending = shared.blocking_import(&request);
        if pending > 0 {
            return Err(ImportError::UnsyncedChanges { pending });
        }
        Ok(shared.state.apply_import(request))
    }

    pub fn nodes(&self) -> Vec<Node> {
        self.read(|s| s.nodes().to_vec())
    }

    /// Current id of a node, following placeholder confirmations.
    pub fn resolve_id(&self, id: &str) -> String {
        self.inner.lock().canonical(id)
    }

    pub fn pending_operations_count(&self) -> usize {
        self.inner.lock().operations.len()
    }

    /// Unsettled operations in issue order.
    pub fn pending_operations(&self) -> Vec<PendingOperation> {
        self.inner.lock().operations.clone()
    }

    /// Create a node of `node_type` with default data.
    pub fn create(&self, node_type: NodeType, position: Position) -> Mutation<Node> {
        self.create_node(NodeData::new(node_type), position)
    }

    pub fn create_node(&self, data: NodeData, position: Position) -> Mutation<Node> {
        let Ok(handle) = Handle::try_current() else {
            return Mutation::rejected("", no_runtime());
        };

        let placeholder = format!("{PLACEHOLDER_PREFIX}{}", Uuid::new_v4());
        let now = Utc::now();
        let node = flatten_node(Node {
            id: placeholder.clone(),
            data,
            position,
            created_at: Some(now),
            updated_at: Some(now),
        });
        let request = NewNode {
            data: node.data.clone(),
            position,
        };

        let ticket = self.inner.lock().enqueue(
            OperationKind::Create,
            &placeholder,
            Effect::Create(node),
            None,
        );
        debug!(placeholder = %placeholder, node_type = %request.data.node_type, "Optimistic create");

        self.launch(&handle, ticket, move |remote, _| async move {
            remote.create_node(request).await
        })
    }

    pub fn update(&self, id: &str, patch: NodePatch) -> Mutation<Node> {
        let Ok(handle) = Handle::try_current() else {
            return Mutation::rejected(id, no_runtime());
        };

        let ticket = {
            let mut shared = self.inner.lock();
            let target = shared.canonical(id);
            let Some(current) = shared.state.node(&target).cloned() else {
                return Mutation::rejected(id, MutationError::UnknownNode(id.to_string()));
            };
            if let Err(e) = patch.apply_to(&current) {
                return Mutation::rejected(id, patch_error(&target, e));
            }
            shared.enqueue(
                OperationKind::Update,
                &target,
                Effect::Update(patch.clone()),
                Some(current),
            )
        };
        debug!(id = %ticket.target, "Optimistic update");

        self.launch(&handle, ticket, move |remote, target| async move {
            remote.update_node(&target, patch).await
        })
    }

    pub fn delete(&self, id: &str) -> Mutation<()> {
        let Ok(handle) = Handle::try_current() else {
            return Mutation::rejected(id, no_runtime());
        };

        let ticket = {
            let mut shared = self.inner.lock();
            let target = shared.canonical(id);
            let Some(current) = shared.state.node(&target).cloned() else {
                return Mutation::rejected(id, MutationError::UnknownNode(id.to_string()));
            };
            shared.enqueue(OperationKind::Delete, &target, Effect::Delete, Some(current))
        };
        debug!(id = %ticket.target, "Optimistic delete");

        self.launch(&handle, ticket, move |remote, target| async move {
            remote.delete_node(&target).await
        })
    }

    /// Spawn the remote leg of an enqueued operation.
    fn launch<T, F, Fut>(&self, handle: &Handle, ticket: Ticket, call: F) -> Mutation<T>
    where
        T: Confirmation + Send + 'static,
        F: FnOnce(Arc<dyn RemoteStore>, String) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, RemoteError>> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let target_id = ticket.target.clone();

        let join = handle.spawn(async move {
            let Ticket {
                operation_id,
                kind,
                target,
                seq,
                prev,
                done,
            } = ticket;

            if let Some(prev) = prev {
                // Err only means the previous operation's task went away.
                let _ = prev.await;
            }

            let resolved = inner.lock().resolve(&target);
            let outcome = match resolved {
                Ok(id) => call(Arc::clone(&inner.remote), id)
                    .await
                    .map_err(MutationError::from),
                Err(e) => Err(e),
            };

            {
                let mut shared = inner.lock();
                shared.settle(
                    &target,
                    operation_id,
                    outcome.as_ref().map(|v| v.confirmed().cloned()),
                );
                shared.release_lane(&target, seq);
                shared.release_placeholder(&target);
            }
            drop(done);

            match &outcome {
                Ok(_) => debug!(kind = %kind, target = %target, "Mutation confirmed"),
                Err(e) => warn!(kind = %kind, target = %target, error = %e, "Mutation rolled back"),
            }
            outcome
        });

        Mutation {
            target_id,
            state: MutationState::Running(join),
        }
    }
}

fn no_runtime() -> MutationError {
    MutationError::Aborted("no Tokio runtime to run the remote call".into())
}

fn patch_error(id: &str, err: PatchError) -> MutationError {
    match err {
        PatchError::ImmutableType { current, requested } => MutationError::ImmutableType {
            id: id.to_string(),
            current,
            requested,
        },
        PatchError::Invalid(message) => MutationError::InvalidPatch {
            id: id.to_string(),
            message,
        },
    }
}
