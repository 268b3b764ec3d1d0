//! HTTP API Module
//!
//! Prometheus metrics, health check and a JSON status view.

mod routes;
mod metrics;

pub use routes::{router, run_api_server, ApiState};
pub use metrics::{GaugeRegistry, MetricsBridge};
