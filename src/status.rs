//! Status Snapshot
//!
//! Per-node health as fetched in one pass. Every field holds its own
//! result so a failed lookup never hides the others.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::fmt;

use crate::error::MeshResult;

/// Status of one node
#[derive(Debug, Clone)]
pub struct NodeStatus {
    /// 1-based position in the registry
    pub ordinal: usize,
    pub url: String,
    pub block_height: MeshResult<u64>,
    pub peer_count: MeshResult<u64>,
    pub producing: MeshResult<bool>,
}

impl NodeStatus {
    /// Metric label for this node ("node-1")
    pub fn label(&self) -> String {
        format!("node-{}", self.ordinal)
    }

    pub fn is_fully_healthy(&self) -> bool {
        self.block_height.is_ok() && self.peer_count.is_ok() && self.producing.is_ok()
    }

    pub fn to_json(&self) -> Value {
        serde_json::json!({
            "node": self.label(),
            "url": self.url,
            "block_height": field_json(&self.block_height),
            "peer_count": field_json(&self.peer_count),
            "mining": field_json(&self.producing),
        })
    }
}

fn field_json<T: Into<Value> + Clone>(field: &MeshResult<T>) -> Value {
    match field {
        Ok(v) => v.clone().into(),
        Err(e) => serde_json::json!({ "error": e.to_string() }),
    }
}

fn field_text<T: fmt::Display>(field: &MeshResult<T>) -> String {
    match field {
        Ok(v) => v.to_string(),
        Err(e) => format!("Error - {}", e),
    }
}

/// Snapshot across all registered nodes, in registry order
#[derive(Debug, Clone)]
pub struct NetworkStatus {
    pub taken_at: DateTime<Utc>,
    pub nodes: Vec<NodeStatus>,
}

impl NetworkStatus {
    pub fn new(nodes: Vec<NodeStatus>) -> Self {
        Self {
            taken_at: Utc::now(),
            nodes,
        }
    }

    pub fn healthy_nodes(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_fully_healthy()).count()
    }

    pub fn to_json(&self) -> Value {
        serde_json::json!({
            "timestamp": self.taken_at.to_rfc3339(),
            "node_count": self.nodes.len(),
            "healthy_nodes": self.healthy_nodes(),
            "nodes": self.nodes.iter().map(NodeStatus::to_json).collect::<Vec<_>>(),
        })
    }
}

impl fmt::Display for NetworkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n=== Network Status ===")?;

        for node in &self.nodes {
            writeln!(f, "\nNode {} ({}):", node.ordinal, node.url)?;
            writeln!(f, "  Block: {}", field_text(&node.block_height))?;
            writeln!(f, "  Peers: {}", field_text(&node.peer_count))?;
            writeln!(f, "  Mining: {}", field_text(&node.producing))?;
        }

        Ok(())
    }
}
