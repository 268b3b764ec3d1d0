//! Block Production Probe
//!
//! Reports whether a node is producing blocks. The legacy `eth_mining`
//! call is authoritative when the node still answers it; post-merge geth
//! dropped it, so a named fallback policy infers the answer instead.
//!
//! The fallback never fails: a node whose status cannot be determined is
//! reported as not producing (`Ok(false)`). Dashboards built on the
//! `ethereum_is_mining` gauge depend on that reading.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::Instant;
use tracing::debug;

use crate::error::{MeshError, MeshResult};
use crate::node::bounded;
use crate::rpc::NodeTransport;

/// Legacy boolean production status call
pub const PRIMARY_METHOD: &str = "eth_mining";

/// How production is inferred when the primary call is unavailable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Producing iff the latest block is past genesis
    #[default]
    HeightAboveGenesis,

    /// Never producing
    AssumeIdle,
}

impl FallbackPolicy {
    /// Resolve production status without the primary call. Swallows its own errors.
    async fn infer(self, transport: &dyn NodeTransport, deadline: Instant) -> bool {
        match self {
            FallbackPolicy::HeightAboveGenesis => {
                match bounded(deadline, transport.latest_header()).await {
                    Ok(header) => header.number > 0,
                    Err(e) => {
                        debug!("{}: production fallback failed, reporting idle: {}", transport.endpoint(), e);
                        false
                    }
                }
            }
            FallbackPolicy::AssumeIdle => false,
        }
    }
}

/// Primary probe plus fallback policy
#[derive(Debug, Clone, Copy, Default)]
pub struct ProductionProbe {
    fallback: FallbackPolicy,
}

impl ProductionProbe {
    pub fn new(fallback: FallbackPolicy) -> Self {
        Self { fallback }
    }

    pub async fn is_producing(&self, transport: &dyn NodeTransport, deadline: Instant) -> MeshResult<bool> {
        let primary = bounded(deadline, transport.call(PRIMARY_METHOD, Value::Array(vec![])))
            .await
            .and_then(|raw| {
                raw.as_bool()
                    .ok_or_else(|| MeshError::protocol(format!("{} returned {}", PRIMARY_METHOD, raw)))
            });

        match primary {
            Ok(producing) => Ok(producing),
            Err(e) => {
                debug!("{}: {} unavailable ({}), using {:?}", transport.endpoint(), PRIMARY_METHOD, e, self.fallback);
                Ok(self.fallback.infer(transport, deadline).await)
            }
        }
    }
}
