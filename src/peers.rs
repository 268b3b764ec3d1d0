//! Peer Manager
//!
//! Owns the ordered registry of node handles and runs the operations that
//! span all of them: full-mesh peer introduction and status snapshots.
//!
//! ## Peer introduction
//!
//! 1. Fetch every node's enode via `admin_nodeInfo`. Any failure aborts.
//! 2. Rewrite each enode's host to the name peers know the node by
//!    (`geth-node{n}` by default), keeping key and port.
//! 3. For every ordered pair (i, j), i ≠ j, call `admin_addPeer` on node i
//!    with node j's enode. Pair failures are logged and skipped.

use futures::future::join_all;
use std::future::Future;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::config::{MeshConfig, ORDINAL_PLACEHOLDER};
use crate::error::{MeshError, MeshResult};
use crate::node::Node;
use crate::status::{NetworkStatus, NodeStatus};

/// Replace the host of `credential@host:port` with the peer-facing name of
/// node `ordinal`. Anything not in that shape is returned unchanged.
pub fn rewrite_enode(enode: &str, ordinal: usize, host_template: &str) -> String {
    let mut parts = enode.split('@');
    let (Some(credential), Some(endpoint), None) = (parts.next(), parts.next(), parts.next()) else {
        return enode.to_string();
    };

    let mut endpoint_parts = endpoint.split(':');
    let (Some(_host), Some(port), None) = (endpoint_parts.next(), endpoint_parts.next(), endpoint_parts.next()) else {
        return enode.to_string();
    };

    let host = host_template.replace(ORDINAL_PLACEHOLDER, &ordinal.to_string());
    format!("{}@{}:{}", credential, host, port)
}

/// A pairwise introduction that did not go through
#[derive(Debug, Clone)]
pub struct IntroductionFailure {
    /// 1-based ordinal of the node asked to add the peer
    pub from: usize,
    /// 1-based ordinal of the node being added
    pub to: usize,
    pub error: MeshError,
}

/// Outcome of one full-mesh introduction
#[derive(Debug, Clone, Default)]
pub struct IntroductionReport {
    /// Rewritten enode per node, in registry order
    pub identities: Vec<String>,
    pub attempted: usize,
    pub connected: usize,
    pub failures: Vec<IntroductionFailure>,
}

/// Registry of connected nodes
pub struct PeerManager {
    nodes: Vec<Node>,
    peer_host_template: String,
}

impl PeerManager {
    /// Connect to every URL over JSON-RPC/HTTP, skipping the ones that fail
    pub async fn connect(urls: &[String], config: &MeshConfig) -> MeshResult<Self> {
        Self::connect_with(urls, &config.peer_host_template, |url| async move {
            Node::connect(&url, config).await
        })
        .await
    }

    /// Build a registry with a custom dialer. Fails only when nothing connects.
    pub async fn connect_with<F, Fut>(urls: &[String], peer_host_template: &str, mut dial: F) -> MeshResult<Self>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = MeshResult<Node>>,
    {
        let mut nodes = Vec::with_capacity(urls.len());

        for url in urls {
            match dial(url.clone()).await {
                Ok(node) => {
                    info!("🔗 Connected to {} ({})", url, node.client_version().unwrap_or("unknown client"));
                    nodes.push(node);
                }
                Err(e) => warn!("Failed to connect to {}: {}", url, e),
            }
        }

        Self::from_nodes(nodes, peer_host_template)
    }

    pub fn from_nodes(nodes: Vec<Node>, peer_host_template: &str) -> MeshResult<Self> {
        if nodes.is_empty() {
            return Err(MeshError::NoNodesAvailable);
        }

        Ok(Self {
            nodes,
            peer_host_template: peer_host_template.to_string(),
        })
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Introduce every node to every other node
    pub async fn introduce_peers(&self, deadline: Instant) -> MeshResult<IntroductionReport> {
        info!("🤝 Connecting peers...");

        let mut report = IntroductionReport::default();

        for (i, node) in self.nodes.iter().enumerate() {
            let enode = node.self_identity(deadline).await.map_err(|e| {
                error!("Failed to get enode from node {}: {}", i + 1, e);
                e
            })?;

            let enode = rewrite_enode(&enode, i + 1, &self.peer_host_template);
            info!("Node {} enode: {}", i + 1, enode);
            report.identities.push(enode);
        }

        for (i, node) in self.nodes.iter().enumerate() {
            for (j, enode) in report.identities.iter().enumerate() {
                if i == j {
                    continue;
                }

                report.attempted += 1;
                let result = match node.add_peer(enode, deadline).await {
                    Ok(true) => Ok(()),
                    Ok(false) => Err(MeshError::protocol("admin_addPeer refused")),
                    Err(e) => Err(e),
                };

                match result {
                    Ok(()) => {
                        info!("✓ Connected node{} -> node{}", i + 1, j + 1);
                        report.connected += 1;
                    }
                    Err(e) => {
                        warn!("Failed to add peer from node{} to node{}: {}", i + 1, j + 1, e);
                        report.failures.push(IntroductionFailure {
                            from: i + 1,
                            to: j + 1,
                            error: e,
                        });
                    }
                }
            }
        }

        info!(
            "🤝 Peer introduction done: {}/{} links",
            report.connected, report.attempted
        );
        Ok(report)
    }

    /// Fetch block height, peer count and production status from every node.
    ///
    /// Nodes are queried concurrently; within one node the three calls run
    /// in order and each records its own result.
    pub async fn status_snapshot(&self, deadline: Instant) -> NetworkStatus {
        let fetches = self.nodes.iter().enumerate().map(|(i, node)| async move {
            NodeStatus {
                ordinal: i + 1,
                url: node.url().to_string(),
                block_height: node.block_height(deadline).await,
                peer_count: node.peer_count(deadline).await,
                producing: node.is_producing_blocks(deadline).await,
            }
        });

        NetworkStatus::new(join_all(fetches).await)
    }

    /// Release every node's transport
    pub fn close(&self) {
        for node in &self.nodes {
            node.close();
        }
    }
}
