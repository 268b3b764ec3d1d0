//! Error taxonomy shared by the node handles, the peer manager and the exporter.

/// Failure of a single operation against one or more nodes
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MeshError {
    /// Connection or call-level failure against an endpoint
    #[error("transport error: {0}")]
    Transport(String),

    /// Malformed or unexpected response shape
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The caller-supplied deadline elapsed before the call completed
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// Every configured address failed at construction
    #[error("no nodes connected")]
    NoNodesAvailable,
}

impl MeshError {
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }
}

pub type MeshResult<T> = Result<T, MeshError>;
