// JSON-RPC 2.0 client for an Ethereum node over HTTP

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

use super::NodeTransport;
use crate::error::{MeshError, MeshResult};

/// JSON-RPC request
#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Value,
    id: u64,
}

/// JSON-RPC response
#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

/// JSON-RPC error
#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// HTTP transport to one node
pub struct HttpTransport {
    url: String,
    client: Client,
    request_id: AtomicU64,
    closed: AtomicBool,
}

impl HttpTransport {
    /// Create a transport for `url`; every call is bounded by `timeout`
    pub fn new(url: &str, timeout: Duration) -> MeshResult<Self> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| MeshError::transport(format!("invalid endpoint {}: {}", url, e)))?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(MeshError::transport(format!(
                "unsupported scheme {} for {}",
                parsed.scheme(),
                url
            )));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MeshError::transport(format!("failed to build client: {}", e)))?;

        Ok(Self {
            url: url.to_string(),
            client,
            request_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
        })
    }

    /// Get next request ID
    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::SeqCst)
    }
}

#[async_trait]
impl NodeTransport for HttpTransport {
    fn endpoint(&self) -> &str {
        &self.url
    }

    async fn call(&self, method: &str, params: Value) -> MeshResult<Value> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(MeshError::transport("transport closed"));
        }

        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: self.next_id(),
        };
        debug!("→ {} {} (id={})", self.url, method, request.id);

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    MeshError::DeadlineExceeded
                } else {
                    MeshError::transport(format!("network error: {}", e))
                }
            })?;

        if !response.status().is_success() {
            return Err(MeshError::transport(format!("HTTP error: {}", response.status())));
        }

        let body: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| MeshError::protocol(format!("parse error: {}", e)))?;

        if let Some(error) = body.error {
            return Err(MeshError::transport(format!(
                "{} (code {})",
                error.message, error.code
            )));
        }

        Ok(body.result.unwrap_or(Value::Null))
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Json, Router};

    /// Minimal JSON-RPC node answering a handful of methods
    async fn spawn_stub_node() -> String {
        async fn handle(Json(req): Json<Value>) -> Json<Value> {
            let id = req["id"].clone();
            let reply = match req["method"].as_str() {
                Some("net_peerCount") => serde_json::json!({ "jsonrpc": "2.0", "id": id, "result": "0x2" }),
                Some("eth_getBlockByNumber") => serde_json::json!({
                    "jsonrpc": "2.0", "id": id, "result": { "number": "0x2a", "hash": "0xfeed" }
                }),
                _ => serde_json::json!({
                    "jsonrpc": "2.0", "id": id,
                    "error": { "code": -32601, "message": "the method does not exist/is not available" }
                }),
            };
            Json(reply)
        }

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, Router::new().route("/", post(handle))).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[test]
    fn test_transport_creation() {
        let transport = HttpTransport::new("http://127.0.0.1:8545", Duration::from_secs(1)).unwrap();
        assert_eq!(transport.endpoint(), "http://127.0.0.1:8545");
    }

    #[test]
    fn test_request_id_increment() {
        let transport = HttpTransport::new("http://localhost", Duration::from_secs(1)).unwrap();
        assert_eq!(transport.next_id(), 1);
        assert_eq!(transport.next_id(), 2);
        assert_eq!(transport.next_id(), 3);
    }

    #[test]
    fn test_rejects_unsupported_endpoints() {
        assert!(matches!(
            HttpTransport::new("ws://127.0.0.1:8546", Duration::from_secs(1)),
            Err(MeshError::Transport(_))
        ));
        assert!(matches!(
            HttpTransport::new("not a url", Duration::from_secs(1)),
            Err(MeshError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_call_against_stub_node() {
        let url = spawn_stub_node().await;
        let transport = HttpTransport::new(&url, Duration::from_secs(2)).unwrap();

        let peers = transport.call("net_peerCount", serde_json::json!([])).await.unwrap();
        assert_eq!(peers, Value::String("0x2".to_string()));

        let header = transport.latest_header().await.unwrap();
        assert_eq!(header.number, 42);

        let err = transport.call("eth_mining", serde_json::json!([])).await.unwrap_err();
        assert!(matches!(err, MeshError::Transport(ref msg) if msg.contains("-32601")));
    }

    #[tokio::test]
    async fn test_closed_transport_refuses_calls() {
        let url = spawn_stub_node().await;
        let transport = HttpTransport::new(&url, Duration::from_secs(2)).unwrap();
        transport.close();

        let err = transport.call("net_peerCount", serde_json::json!([])).await.unwrap_err();
        assert_eq!(err, MeshError::transport("transport closed"));
    }
}
