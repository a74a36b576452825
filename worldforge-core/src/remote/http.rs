// REST client for the node API.

use std::sync::Once;
use std::time::Duration;

use reqwest::{Client, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::RemoteStore;
use crate::config::RemoteSection;
use crate::error::RemoteError;
use crate::flatten::flatten_node;
use crate::types::{NewNode, Node, NodePatch};

#[derive(Debug)]
pub struct HttpRemote {
    client: Client,
    base_url: String,
}

#[derive(Deserialize)]
struct HealthResponse {
    status: String,
}

static CRYPTO_PROVIDER: Once = Once::new();

/// reqwest is built without a bundled provider; install aws-lc-rs once per
/// process unless the host application already chose one.
fn ensure_crypto_provider() {
    CRYPTO_PROVIDER.call_once(|| {
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
    });
}

impl HttpRemote {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RemoteError> {
        ensure_crypto_provider();
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Network(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &RemoteSection) -> Result<Self, RemoteError> {
        Self::new(&config.base_url, Duration::from_secs(config.timeout_secs))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/{path}", self.base_url)
    }
}

/// Reject non-2xx responses, keeping the body for the error.
async fn check_status(resp: Response) -> Result<Response, RemoteError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    Err(RemoteError::Api { status, body })
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, RemoteError> {
    resp.json()
        .await
        .map_err(|e| RemoteError::Decode(e.to_string()))
}

#[async_trait::async_trait]
#[allow(clippy::unnecessary_literal_bound)]
impl RemoteStore for HttpRemote {
    fn name(&self) -> &str {
        "http"
    }

    async fn create_node(&self, node: NewNode) -> Result<Node, RemoteError> {
        debug!(base_url = %self.base_url, node_type = %node.data.node_type, "POST node");
        let resp = self
            .client
            .post(self.url("nodes"))
            .json(&node)
            .send()
            .await
            .map_err(|e| RemoteError::Network(e.to_string()))?;
        let node: Node = decode(check_status(resp).await?).await?;
        Ok(flatten_node(node))
    }

    async fn update_node(&self, id: &str, patch: NodePatch) -> Result<Node, RemoteError> {
        debug!(base_url = %self.base_url, id, "PUT node");
        let resp = self
            .client
            .put(self.url(&format!("nodes/{id}")))
            .json(&patch)
            .send()
            .await
            .map_err(|e| RemoteError::Network(e.to_string()))?;
        let node: Node = decode(check_status(resp).await?).await?;
        Ok(flatten_node(node))
    }

    async fn delete_node(&self, id: &str) -> Result<(), RemoteError> {
        debug!(base_url = %self.base_url, id, "DELETE node");
        let resp = self
            .client
            .delete(self.url(&format!("nodes/{id}")))
            .send()
            .await
            .map_err(|e| RemoteError::Network(e.to_string()))?;
        check_status(resp).await?;
        Ok(())
    }

    async fn fetch_nodes(&self) -> Result<Vec<Node>, RemoteError> {
        let resp = self
            .client
            .get(self.url("nodes"))
            .send()
            .await
            .map_err(|e| RemoteError::Network(e.to_string()))?;
        let nodes: Vec<Node> = decode(check_status(resp).await?).await?;
        debug!(count = nodes.len(), "Fetched nodes");
        Ok(nodes.into_iter().map(flatten_node).collect())
    }

    async fn fetch_health(&self) -> Result<bool, RemoteError> {
        let resp = self
            .client
            .get(self.url("health"))
            .send()
            .await
            .map_err(|e| RemoteError::Network(e.to_string()))?;
        let health: HealthResponse = decode(check_status(resp).await?).await?;
        Ok(health.status.eq_ignore_ascii_case("ok"))
    }
}
