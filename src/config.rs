//! Mesh Configuration
//!
//! Node endpoints, timeouts and exporter settings.
//! Values come from defaults, an optional TOML file, then CLI/env overrides.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::production::FallbackPolicy;

/// Placeholder replaced by the 1-based node ordinal in `peer_host_template`
pub const ORDINAL_PLACEHOLDER: &str = "{}";

/// Main configuration for ethmesh
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshConfig {
    // === Nodes ===

    /// JSON-RPC endpoints, in display order ("node 1", "node 2", ...)
    pub node_urls: Vec<String>,

    /// Host name nodes use to reach each other, `{}` is the node ordinal
    /// (e.g. container DNS names inside a compose network)
    pub peer_host_template: String,

    /// Probe each endpoint with `web3_clientVersion` before registering it
    pub probe_on_connect: bool,

    /// How to read production status from nodes without `eth_mining`
    pub production_fallback: FallbackPolicy,

    // === Timing ===

    /// Bound on every individual remote call (seconds)
    pub rpc_timeout_secs: u64,

    /// Total budget for one metrics aggregation pass (seconds)
    pub scrape_timeout_secs: u64,

    /// Full-mesh introduction deadline per registered node (seconds)
    pub introduction_timeout_per_node_secs: u64,

    /// Interval between status prints in watch mode (seconds)
    pub watch_interval_secs: u64,

    /// Pause after introducing peers before printing status (seconds)
    pub connect_settle_secs: u64,

    // === Exporter ===

    /// Port for the metrics HTTP server
    pub metrics_port: u16,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            node_urls: vec![
                "http://127.0.0.1:8545".to_string(),
                "http://127.0.0.1:8546".to_string(),
                "http://127.0.0.1:8547".to_string(),
            ],
            peer_host_template: "geth-node{}".to_string(),
            probe_on_connect: true,
            production_fallback: FallbackPolicy::HeightAboveGenesis,

            rpc_timeout_secs: 5,
            scrape_timeout_secs: 10,
            introduction_timeout_per_node_secs: 5,
            watch_interval_secs: 5,
            connect_settle_secs: 2,

            metrics_port: 9545,
        }
    }
}

impl MeshConfig {
    /// Load configuration from TOML file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    // Builder-style methods for CLI overrides

    pub fn with_node_urls(mut self, urls: Vec<String>) -> Self {
        if !urls.is_empty() {
            self.node_urls = urls;
        }
        self
    }

    pub fn with_metrics_port(mut self, port: Option<u16>) -> Self {
        if let Some(port) = port {
            self.metrics_port = port;
        }
        self
    }

    pub fn with_watch_interval(mut self, secs: Option<u64>) -> Self {
        if let Some(secs) = secs {
            self.watch_interval_secs = secs;
        }
        self
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }

    pub fn scrape_timeout(&self) -> Duration {
        Duration::from_secs(self.scrape_timeout_secs)
    }

    /// Overall deadline for introducing `node_count` nodes to each other
    pub fn introduction_timeout(&self, node_count: usize) -> Duration {
        Duration::from_secs(self.introduction_timeout_per_node_secs * node_count.max(1) as u64)
    }

    pub fn watch_interval(&self) -> Duration {
        Duration::from_secs(self.watch_interval_secs)
    }

    pub fn connect_settle(&self) -> Duration {
        Duration::from_secs(self.connect_settle_secs)
    }

    /// Validate configuration values
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.node_urls.is_empty() {
            anyhow::bail!("node_urls must contain at least one endpoint");
        }

        if let Some(blank) = self.node_urls.iter().position(|u| u.trim().is_empty()) {
            anyhow::bail!("node_urls[{}] is empty", blank);
        }

        if !self.peer_host_template.contains(ORDINAL_PLACEHOLDER) {
            anyhow::bail!(
                "peer_host_template ({}) must contain {}",
                self.peer_host_template,
                ORDINAL_PLACEHOLDER
            );
        }

        if self.rpc_timeout_secs == 0
            || self.scrape_timeout_secs == 0
            || self.introduction_timeout_per_node_secs == 0
        {
            anyhow::bail!("timeouts must be greater than zero");
        }

        if self.watch_interval_secs == 0 {
            anyhow::bail!("watch_interval_secs must be greater than zero");
        }

        Ok(())
    }
}
