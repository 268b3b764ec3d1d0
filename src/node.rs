//! Node Handle
//!
//! One remote Ethereum node behind a single transport. Each accessor makes
//! exactly one attempt (the production probe may make two calls) and
//! surfaces failures to the caller; there is no caching and no retry.

use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::debug;

use crate::config::MeshConfig;
use crate::error::{MeshError, MeshResult};
use crate::production::ProductionProbe;
use crate::rpc::{parse_hex_quantity, HttpTransport, NodeTransport};

/// Run a remote call, failing with `DeadlineExceeded` once `deadline` passes
pub async fn bounded<T, F>(deadline: Instant, call: F) -> MeshResult<T>
where
    F: Future<Output = MeshResult<T>>,
{
    match tokio::time::timeout_at(deadline, call).await {
        Ok(result) => result,
        Err(_) => Err(MeshError::DeadlineExceeded),
    }
}

fn no_params() -> Value {
    Value::Array(vec![])
}

/// Handle to one connected node
pub struct Node {
    url: String,
    transport: Arc<dyn NodeTransport>,
    client_version: Option<String>,
    production: ProductionProbe,
}

impl Node {
    /// Wrap an already established transport
    pub fn new(url: &str, transport: Arc<dyn NodeTransport>) -> Self {
        Self {
            url: url.to_string(),
            transport,
            client_version: None,
            production: ProductionProbe::default(),
        }
    }

    /// Connect to `url` over JSON-RPC/HTTP.
    ///
    /// With `probe_on_connect` the node must answer `web3_clientVersion`
    /// within the RPC timeout, otherwise no handle is created.
    pub async fn connect(url: &str, config: &MeshConfig) -> MeshResult<Self> {
        let transport = Arc::new(HttpTransport::new(url, config.rpc_timeout())?);
        let mut node = Self::new(url, transport)
            .with_production_probe(ProductionProbe::new(config.production_fallback));

        if config.probe_on_connect {
            let deadline = Instant::now() + config.rpc_timeout();
            let version = bounded(deadline, node.transport.call("web3_clientVersion", no_params())).await?;
            node.client_version = version.as_str().map(str::to_string);
            debug!("{} runs {:?}", url, node.client_version);
        }

        Ok(node)
    }

    pub fn with_production_probe(mut self, probe: ProductionProbe) -> Self {
        self.production = probe;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn client_version(&self) -> Option<&str> {
        self.client_version.as_deref()
    }

    /// Height of the latest known block
    pub async fn block_height(&self, deadline: Instant) -> MeshResult<u64> {
        let header = bounded(deadline, self.transport.latest_header()).await?;
        debug!("{} head #{} {:?}", self.url, header.number, header.hash);
        Ok(header.number)
    }

    /// Number of connected peers (`net_peerCount`, hex encoded on the wire)
    pub async fn peer_count(&self, deadline: Instant) -> MeshResult<u64> {
        let raw = bounded(deadline, self.transport.call("net_peerCount", no_params())).await?;
        let hex = raw
            .as_str()
            .ok_or_else(|| MeshError::protocol(format!("net_peerCount returned {}", raw)))?;
        parse_hex_quantity(hex)
    }

    /// The node's enode URL from `admin_nodeInfo`
    pub async fn self_identity(&self, deadline: Instant) -> MeshResult<String> {
        let info = bounded(deadline, self.transport.call("admin_nodeInfo", no_params())).await?;
        info.get("enode")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| MeshError::protocol("enode not found"))
    }

    /// Whether the node is producing blocks. See [`ProductionProbe`].
    pub async fn is_producing_blocks(&self, deadline: Instant) -> MeshResult<bool> {
        self.production.is_producing(self.transport.as_ref(), deadline).await
    }

    /// Ask the node to dial `enode` (`admin_addPeer`)
    pub async fn add_peer(&self, enode: &str, deadline: Instant) -> MeshResult<bool> {
        let raw = bounded(
            deadline,
            self.transport.call("admin_addPeer", Value::Array(vec![Value::String(enode.to_string())])),
        )
        .await?;
        raw.as_bool()
            .ok_or_else(|| MeshError::protocol(format!("admin_addPeer returned {}", raw)))
    }

    pub fn close(&self) {
        self.transport.close();
    }
}
