//! ethmesh
//!
//! Peering and monitoring for a small private Ethereum network.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          ETHMESH                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Node handles (JSON-RPC)  ←── one transport per endpoint    │
//! │  Peer manager             ←── full-mesh admin_addPeer       │
//! │  Status snapshot          ←── height, peers, mining         │
//! │  HTTP API (9545)          ←── /metrics, /health, /status    │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

mod api;
mod config;
mod error;
mod node;
mod peers;
mod production;
mod rpc;
mod status;

use api::{GaugeRegistry, MetricsBridge};
use config::MeshConfig;
use peers::PeerManager;

/// ethmesh - connect and monitor a private Ethereum network
#[derive(Parser, Debug)]
#[command(name = "ethmesh")]
#[command(author = "ethmesh Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Full-mesh peering and Prometheus exporter for a set of Ethereum nodes", long_about = None)]
struct Args {
    /// Connect all nodes as peers
    #[arg(long)]
    connect: bool,

    /// Show network status
    #[arg(long)]
    status: bool,

    /// Watch network status
    #[arg(long)]
    watch: bool,

    /// Start Prometheus exporter
    #[arg(long)]
    exporter: bool,

    /// Exporter port
    #[arg(long, env = "ETHMESH_PORT")]
    port: Option<u16>,

    /// Node JSON-RPC endpoint (repeatable, replaces the configured list)
    #[arg(long = "node", value_name = "URL", env = "ETHMESH_NODES", value_delimiter = ',')]
    nodes: Vec<String>,

    /// Seconds between status prints in watch mode
    #[arg(long)]
    watch_interval: Option<u64>,

    /// Path to configuration file
    #[arg(short, long, default_value = "ethmesh.toml")]
    config: PathBuf,

    /// Write the effective configuration to --config and exit
    #[arg(long)]
    init_config: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "ETHMESH_LOG")]
    log_level: String,
}

impl Args {
    fn no_mode_selected(&self) -> bool {
        !self.connect && !self.status && !self.watch && !self.exporter
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .init();

    debug!("ethmesh v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = if args.config.exists() {
        MeshConfig::load(&args.config)?
    } else {
        debug!("Config file {:?} not found, using defaults", args.config);
        MeshConfig::default()
    };

    // Override config with CLI args
    let config = config
        .with_node_urls(args.nodes.clone())
        .with_metrics_port(args.port)
        .with_watch_interval(args.watch_interval);

    config.validate()?;

    if args.init_config {
        config.save(&args.config)?;
        info!("📝 Configuration written to {:?}", args.config);
        return Ok(());
    }

    info!("🔗 Connecting to Ethereum nodes...");
    let manager = match PeerManager::connect(&config.node_urls, &config).await {
        Ok(manager) => Arc::new(manager),
        Err(e) => {
            error!("❌ Failed to create peer manager: {}", e);
            return Err(e.into());
        }
    };
    info!("✅ Connected to {} nodes", manager.len());
    for (i, node) in manager.nodes().iter().enumerate() {
        info!("   node {}: {}", i + 1, node.url());
    }

    let result = run(&args, Arc::new(config), manager.clone()).await;

    manager.close();
    result
}

async fn run(args: &Args, config: Arc<MeshConfig>, manager: Arc<PeerManager>) -> anyhow::Result<()> {
    if args.connect {
        let deadline = Instant::now() + config.introduction_timeout(manager.len());
        match manager.introduce_peers(deadline).await {
            Ok(report) if !report.failures.is_empty() => {
                warn!("{} of {} peer links failed", report.failures.len(), report.attempted);
                for failure in &report.failures {
                    debug!("   node{} -> node{}: {}", failure.from, failure.to, failure.error);
                }
            }
            Ok(_) => {}
            Err(e) => error!("❌ Failed to connect peers: {}", e),
        }

        tokio::time::sleep(config.connect_settle()).await;
        print_status(&manager, &config).await;
    }

    if args.status {
        print_status(&manager, &config).await;
    }

    match (args.watch, args.exporter) {
        (true, true) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("🛑 Shutdown signal received"),
                _ = watch(&manager, &config) => {}
                result = start_exporter(config.clone(), manager.clone()) => result?,
            }
        }
        (true, false) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("🛑 Shutdown signal received"),
                _ = watch(&manager, &config) => {}
            }
        }
        (false, true) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("🛑 Shutdown signal received"),
                result = start_exporter(config.clone(), manager.clone()) => result?,
            }
        }
        (false, false) => {}
    }

    if args.no_mode_selected() {
        print_status(&manager, &config).await;
        print_usage();
    }

    Ok(())
}

async fn print_status(manager: &PeerManager, config: &MeshConfig) {
    let status = manager
        .status_snapshot(Instant::now() + config.scrape_timeout())
        .await;
    println!("{}", status);
}

/// Print status every watch interval, forever
async fn watch(manager: &PeerManager, config: &MeshConfig) {
    info!("👁️  Watching network status every {}s (Ctrl+C to stop)...", config.watch_interval_secs);

    let mut interval = tokio::time::interval(config.watch_interval());
    loop {
        interval.tick().await;
        print_status(manager, config).await;
    }
}

async fn start_exporter(config: Arc<MeshConfig>, manager: Arc<PeerManager>) -> anyhow::Result<()> {
    let bridge = Arc::new(MetricsBridge::new(
        manager,
        GaugeRegistry::for_nodes(),
        config.scrape_timeout(),
    ));

    info!("📊 Starting Prometheus exporter on port {}...", config.metrics_port);
    api::run_api_server(config, bridge).await.map_err(|e| {
        error!("❌ Failed to start exporter: {}", e);
        e
    })
}

fn print_usage() {
    println!("\n📚 Usage:");
    println!("  --connect         Connect all nodes as peers");
    println!("  --status          Show network status");
    println!("  --watch           Watch network status (every --watch-interval seconds, default 5)");
    println!("  --exporter        Start Prometheus metrics exporter");
    println!("  --port <PORT>     Exporter port (default: 9545)");
    println!("  --node <URL>      Node endpoint, repeatable (or ETHMESH_NODES)");
    println!("  --config <PATH>   Configuration file (default: ethmesh.toml)");
    println!("\nExample: ethmesh --status");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["ethmesh"]).unwrap();
        assert!(args.no_mode_selected());
        assert_eq!(args.config, PathBuf::from("ethmesh.toml"));
    }

    #[test]
    fn test_args_flags_combine() {
        let args = Args::try_parse_from([
            "ethmesh", "--connect", "--exporter", "--port", "9100",
            "--node", "http://a:8545,http://b:8545", "--node", "http://c:8545",
        ])
        .unwrap();

        assert!(args.connect && args.exporter && !args.watch);
        assert!(!args.no_mode_selected());
        assert_eq!(args.port, Some(9100));
        assert_eq!(args.nodes, vec!["http://a:8545", "http://b:8545", "http://c:8545"]);
    }
}
