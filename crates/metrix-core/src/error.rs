//! Shared error type across metrix crates.

use thiserror::Error;

/// Client-facing error codes (stable API).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCode {
    /// Invalid kind, name or value.
    BadRequest,
    /// Metric not present in the store.
    NotFound,
    /// Network-level failure talking to the collector.
    Transport,
    /// Collector answered with a non-success status.
    Application,
    /// Snapshot file or backend write failed.
    Persistence,
    /// Durable backend unreachable.
    Connect,
    /// Internal server error.
    Internal,
}

impl ClientCode {
    /// String representation used in JSON responses.
    pub fn as_str(self) -> &'static str {
        match self {
            ClientCode::BadRequest => "BAD_REQUEST",
            ClientCode::NotFound => "NOT_FOUND",
            ClientCode::Transport => "TRANSPORT",
            ClientCode::Application => "APPLICATION",
            ClientCode::Persistence => "PERSISTENCE",
            ClientCode::Connect => "CONNECT",
            ClientCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, MetrixError>;

/// Unified error type used by core, server and agent.
#[derive(Debug, Error)]
pub enum MetrixError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("metric not found: {0}")]
    NotFound(String),
    #[error("transport: {0}")]
    Transport(String),
    #[error("collector responded {status}: {msg}")]
    Application { status: u16, msg: String },
    #[error("persistence: {0}")]
    Persistence(String),
    #[error("connect: {0}")]
    Connect(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl MetrixError {
    /// Map internal error to a stable client-facing code.
    pub fn client_code(&self) -> ClientCode {
        match self {
            MetrixError::BadRequest(_) => ClientCode::BadRequest,
            MetrixError::NotFound(_) => ClientCode::NotFound,
            MetrixError::Transport(_) => ClientCode::Transport,
            MetrixError::Application { .. } => ClientCode::Application,
            MetrixError::Persistence(_) => ClientCode::Persistence,
            MetrixError::Connect(_) => ClientCode::Connect,
            MetrixError::Internal(_) => ClientCode::Internal,
        }
    }
}
