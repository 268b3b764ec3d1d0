//! In-memory transport with canned replies, for tests.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::NodeTransport;
use crate::error::{MeshError, MeshResult};

pub struct ScriptedTransport {
    endpoint: String,
    replies: Mutex<HashMap<String, MeshResult<Value>>>,
    calls: Mutex<Vec<(String, Value)>>,
    delay: Option<Duration>,
    closed: AtomicBool,
}

impl ScriptedTransport {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            replies: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            delay: None,
            closed: AtomicBool::new(false),
        }
    }

    /// A healthy geth dev node: block `height`, `peers` peers, `enode` identity
    pub fn healthy(endpoint: &str, height: u64, peers: u64, enode: &str) -> Self {
        Self::new(endpoint)
            .reply(
                "eth_getBlockByNumber",
                serde_json::json!({ "number": format!("{:#x}", height), "hash": "0x01" }),
            )
            .reply("net_peerCount", Value::String(format!("{:#x}", peers)))
            .reply("admin_nodeInfo", serde_json::json!({ "enode": enode, "name": "Geth/v1.14.0" }))
            .reply("eth_mining", Value::Bool(true))
            .reply("admin_addPeer", Value::Bool(true))
            .reply("web3_clientVersion", Value::String("Geth/v1.14.0".to_string()))
    }

    pub fn reply(self, method: &str, value: Value) -> Self {
        self.replies.lock().unwrap().insert(method.to_string(), Ok(value));
        self
    }

    pub fn fail(self, method: &str, err: MeshError) -> Self {
        self.replies.lock().unwrap().insert(method.to_string(), Err(err));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|(m, _)| m == method).count()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NodeTransport for ScriptedTransport {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn call(&self, method: &str, params: Value) -> MeshResult<Value> {
        self.calls.lock().unwrap().push((method.to_string(), params));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.is_closed() {
            return Err(MeshError::transport("transport closed"));
        }

        self.replies
            .lock()
            .unwrap()
            .get(method)
            .cloned()
            .unwrap_or_else(|| Err(MeshError::transport(format!("method {} not available", method))))
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
