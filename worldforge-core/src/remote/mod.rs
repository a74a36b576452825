pub mod http;
pub mod memory;

pub use http::HttpRemote;
pub use memory::InMemoryRemote;

use crate::error::RemoteError;
use crate::types::{NewNode, Node, NodePatch};

/// The authoritative node store the editor reconciles against.
///
/// Implementations must be safe to call concurrently; the mutation engine
/// serializes calls per node id but not across ids.
#[async_trait::async_trait]
pub trait RemoteStore: Send + Sync + std::fmt::Debug {
    /// Short identifier for logs.
    fn name(&self) -> &str;

    /// Persist a new node. The returned record carries the real id.
    async fn create_node(&self, node: NewNode) -> Result<Node, RemoteError>;

    async fn update_node(&self, id: &str, patch: NodePatch) -> Result<Node, RemoteError>;

    async fn delete_node(&self, id: &str) -> Result<(), RemoteError>;

    async fn fetch_nodes(&self) -> Result<Vec<Node>, RemoteError>;

    /// `true` when the store reports itself healthy.
    async fn fetch_health(&self) -> Result<bool, RemoteError>;
}
