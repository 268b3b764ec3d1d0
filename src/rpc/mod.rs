//! Node RPC Transport
//!
//! The boundary between ethmesh and a node: a generic "call method with
//! positional parameters" primitive plus a latest-header accessor.
//! `HttpTransport` speaks JSON-RPC 2.0 over HTTP.

mod http;
#[cfg(test)]
pub mod scripted;

pub use http::HttpTransport;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{MeshError, MeshResult};

/// Header fields ethmesh reads from the latest block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    pub number: u64,
    pub hash: Option<String>,
}

impl BlockHeader {
    /// Decode an `eth_getBlockByNumber` result
    pub fn from_json(raw: &Value) -> MeshResult<Self> {
        let obj = raw
            .as_object()
            .ok_or_else(|| MeshError::protocol("latest block not available"))?;

        let number = obj
            .get("number")
            .and_then(Value::as_str)
            .ok_or_else(|| MeshError::protocol("block header has no number"))?;

        Ok(Self {
            number: parse_hex_quantity(number)?,
            hash: obj.get("hash").and_then(Value::as_str).map(str::to_string),
        })
    }
}

/// One connection to one node endpoint
#[async_trait]
pub trait NodeTransport: Send + Sync {
    /// Address this transport was created for
    fn endpoint(&self) -> &str;

    /// Invoke `method` with positional `params`
    async fn call(&self, method: &str, params: Value) -> MeshResult<Value>;

    /// Fetch the header of the latest known block
    async fn latest_header(&self) -> MeshResult<BlockHeader> {
        let raw = self
            .call("eth_getBlockByNumber", serde_json::json!(["latest", false]))
            .await?;
        BlockHeader::from_json(&raw)
    }

    /// Release the connection. Later calls fail.
    fn close(&self) {}
}

/// Decode a hex-encoded JSON-RPC quantity ("0x1a", "1a")
pub fn parse_hex_quantity(raw: &str) -> MeshResult<u64> {
    let digits = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .unwrap_or(raw);

    if digits.is_empty() {
        return Err(MeshError::protocol(format!("empty hex quantity: {:?}", raw)));
    }

    u64::from_str_radix(digits, 16)
        .map_err(|e| MeshError::protocol(format!("invalid hex quantity {:?}: {}", raw, e)))
}
