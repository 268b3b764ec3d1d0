//! API Routes
//!
//! HTTP endpoints for metrics, health checks and node status

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::MetricsBridge;
use crate::config::MeshConfig;

/// Prometheus text exposition content type
const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Shared API state
pub struct ApiState {
    pub config: Arc<MeshConfig>,
    pub bridge: Arc<MetricsBridge>,
}

pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        // Health & Status
        .route("/health", get(health_check))
        .route("/status", get(get_status))

        // Metrics
        .route("/metrics", get(get_metrics_prometheus))

        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the HTTP API server
pub async fn run_api_server(config: Arc<MeshConfig>, bridge: Arc<MetricsBridge>) -> anyhow::Result<()> {
    let port = config.metrics_port;
    let app = router(Arc::new(ApiState { config, bridge }));

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("📊 Metrics server listening on {}", addr);
    info!("📈 Metrics: http://localhost:{}/metrics", port);

    axum::serve(listener, app).await?;

    Ok(())
}

/// GET /health - Simple health check, independent of node reachability
async fn health_check() -> impl IntoResponse {
    "OK"
}

/// GET /status - Per-node status as JSON
async fn get_status(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    let status = state.bridge.snapshot().await;

    let mut body = status.to_json();
    body["version"] = serde_json::json!(env!("CARGO_PKG_VERSION"));
    body["uptime_secs"] = serde_json::json!(state.bridge.uptime_secs());
    body["peer_host_template"] = serde_json::json!(state.config.peer_host_template);

    Json(body)
}

/// GET /metrics - Prometheus format metrics
async fn get_metrics_prometheus(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)],
        state.bridge.scrape().await,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::GaugeRegistry;
    use crate::error::MeshError;
    use crate::node::Node;
    use crate::peers::PeerManager;
    use crate::rpc::scripted::ScriptedTransport;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use std::time::Duration;
    use tower::ServiceExt;

    fn app(transport: ScriptedTransport) -> Router {
        let node = Node::new("http://127.0.0.1:8545", Arc::new(transport));
        let manager = Arc::new(PeerManager::from_nodes(vec![node], "geth-node{}").unwrap());
        let bridge = Arc::new(MetricsBridge::new(
            manager,
            GaugeRegistry::for_nodes(),
            Duration::from_secs(5),
        ));
        router(Arc::new(ApiState {
            config: Arc::new(MeshConfig::default()),
            bridge,
        }))
    }

    fn healthy() -> ScriptedTransport {
        ScriptedTransport::healthy("http://127.0.0.1:8545", 7, 1, "enode://k@127.0.0.1:30303")
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, Option<String>, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|v| v.to_str().unwrap().to_string());
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, content_type, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_health_ignores_node_state() {
        let dead = ScriptedTransport::new("http://127.0.0.1:8545");
        let (status, _, body) = get(app(dead), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "OK");
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let (status, content_type, body) = get(app(healthy()), "/metrics").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type.as_deref(), Some(PROMETHEUS_CONTENT_TYPE));
        assert!(body.contains("ethereum_block_height{node=\"node-1\",url=\"http://127.0.0.1:8545\"} 7"));
    }

    #[tokio::test]
    async fn test_status_endpoint() {
        let transport = healthy().fail("eth_getBlockByNumber", MeshError::transport("timeout"));
        let (status, _, body) = get(app(transport), "/status").await;

        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["node_count"], 1);
        assert_eq!(json["nodes"][0]["peer_count"], 1);
        assert_eq!(json["nodes"][0]["block_height"]["error"], "transport error: timeout");
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let (status, _, _) = get(app(healthy()), "/idpeers.json").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
