//! Metrics Collection
//!
//! `MetricsBridge` turns a status snapshot into Prometheus text on every
//! scrape. The gauge registry it writes into is owned by the bridge and
//! guarded by one lock for the whole pass, so concurrent scrapes never
//! interleave their samples.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

use crate::peers::PeerManager;
use crate::status::NetworkStatus;

pub const BLOCK_HEIGHT: &str = "ethereum_block_height";
pub const PEER_COUNT: &str = "ethereum_peer_count";
pub const IS_MINING: &str = "ethereum_is_mining";
pub const NODES_REGISTERED: &str = "ethmesh_nodes_registered";
pub const SCRAPES_TOTAL: &str = "ethmesh_scrapes_total";
pub const SCRAPE_DURATION: &str = "ethmesh_scrape_duration_seconds";
pub const UPTIME: &str = "ethmesh_uptime_seconds";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Gauge,
    Counter,
}

impl MetricKind {
    fn as_str(self) -> &'static str {
        match self {
            MetricKind::Gauge => "gauge",
            MetricKind::Counter => "counter",
        }
    }
}

#[derive(Debug, Clone)]
struct Sample {
    labels: Vec<(&'static str, String)>,
    value: f64,
}

#[derive(Debug, Clone)]
struct MetricFamily {
    name: &'static str,
    help: &'static str,
    kind: MetricKind,
    samples: Vec<Sample>,
}

/// Described metric families and the samples of the current pass
#[derive(Debug, Clone, Default)]
pub struct GaugeRegistry {
    families: Vec<MetricFamily>,
}

impl GaugeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the per-node gauges and the exporter's own metrics
    pub fn for_nodes() -> Self {
        let mut registry = Self::new();
        registry.describe(BLOCK_HEIGHT, "Current block height", MetricKind::Gauge);
        registry.describe(PEER_COUNT, "Number of connected peers", MetricKind::Gauge);
        registry.describe(IS_MINING, "Mining status (1=mining, 0=not mining)", MetricKind::Gauge);
        registry.describe(NODES_REGISTERED, "Nodes in the registry", MetricKind::Gauge);
        registry.describe(SCRAPES_TOTAL, "Scrapes served", MetricKind::Counter);
        registry.describe(SCRAPE_DURATION, "Duration of the last aggregation pass", MetricKind::Gauge);
        registry.describe(UPTIME, "Exporter uptime in seconds", MetricKind::Gauge);
        registry
    }

    pub fn describe(&mut self, name: &'static str, help: &'static str, kind: MetricKind) {
        if self.families.iter().any(|f| f.name == name) {
            return;
        }
        self.families.push(MetricFamily {
            name,
            help,
            kind,
            samples: Vec::new(),
        });
    }

    /// Record a sample. Returns false for an undescribed metric.
    pub fn set(&mut self, name: &str, labels: &[(&'static str, &str)], value: f64) -> bool {
        let Some(family) = self.families.iter_mut().find(|f| f.name == name) else {
            return false;
        };
        family.samples.push(Sample {
            labels: labels.iter().map(|(k, v)| (*k, v.to_string())).collect(),
            value,
        });
        true
    }

    /// Drop all samples, keep the descriptions
    pub fn reset(&mut self) {
        for family in &mut self.families {
            family.samples.clear();
        }
    }

    #[cfg(test)]
    pub fn sample_count(&self, name: &str) -> usize {
        self.families
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.samples.len())
            .unwrap_or(0)
    }

    /// Text exposition format. Families without samples are left out.
    pub fn render(&self) -> String {
        let mut output = String::new();

        for family in self.families.iter().filter(|f| !f.samples.is_empty()) {
            let _ = writeln!(output, "# HELP {} {}", family.name, family.help);
            let _ = writeln!(output, "# TYPE {} {}", family.name, family.kind.as_str());

            for sample in &family.samples {
                output.push_str(family.name);
                if !sample.labels.is_empty() {
                    let labels: Vec<String> = sample
                        .labels
                        .iter()
                        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
                        .collect();
                    let _ = write!(output, "{{{}}}", labels.join(","));
                }
                let _ = writeln!(output, " {}", sample.value);
            }
            output.push('\n');
        }

        output
    }
}

fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

/// Serves node status to scrapers
pub struct MetricsBridge {
    manager: Arc<PeerManager>,
    registry: Mutex<GaugeRegistry>,
    scrape_timeout: Duration,
    start_time: std::time::Instant,
    scrapes: AtomicU64,
}

impl MetricsBridge {
    pub fn new(manager: Arc<PeerManager>, registry: GaugeRegistry, scrape_timeout: Duration) -> Self {
        Self {
            manager,
            registry: Mutex::new(registry),
            scrape_timeout,
            start_time: std::time::Instant::now(),
            scrapes: AtomicU64::new(0),
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Snapshot bounded by the scrape budget, without touching the registry
    pub async fn snapshot(&self) -> NetworkStatus {
        let deadline = tokio::time::Instant::now() + self.scrape_timeout;
        self.manager.status_snapshot(deadline).await
    }

    /// One full aggregation pass, rendered as Prometheus text
    pub async fn scrape(&self) -> String {
        let mut registry = self.registry.lock().await;
        let started = std::time::Instant::now();

        registry.reset();
        let status = self.snapshot().await;
        record_status(&mut registry, &status);

        let scrapes = self.scrapes.fetch_add(1, Ordering::Relaxed) + 1;
        let elapsed = started.elapsed();
        registry.set(NODES_REGISTERED, &[], status.nodes.len() as f64);
        registry.set(SCRAPES_TOTAL, &[], scrapes as f64);
        registry.set(SCRAPE_DURATION, &[], elapsed.as_secs_f64());
        registry.set(UPTIME, &[], self.uptime_secs() as f64);

        debug!(
            "📊 Scrape #{} took {:?}, {}/{} nodes healthy",
            scrapes,
            elapsed,
            status.healthy_nodes(),
            status.nodes.len()
        );

        registry.render()
    }
}

/// Write one snapshot into the registry. Failed fields get no sample.
fn record_status(registry: &mut GaugeRegistry, status: &NetworkStatus) {
    for node in &status.nodes {
        let label = node.label();
        let labels = [("node", label.as_str()), ("url", node.url.as_str())];

        if let Ok(height) = node.block_height {
            registry.set(BLOCK_HEIGHT, &labels, height as f64);
        }
        if let Ok(peers) = node.peer_count {
            registry.set(PEER_COUNT, &labels, peers as f64);
        }
        if let Ok(producing) = node.producing {
            registry.set(IS_MINING, &labels, if producing { 1.0 } else { 0.0 });
        }
    }
}
