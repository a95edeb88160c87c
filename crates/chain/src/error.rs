//! Chain read errors and their retry classification.

use thiserror::Error;

/// How the retry policy treats a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Transport failure: exponential backoff with jitter.
    Network,
    /// Full node throttled us: longer, linearly growing delay.
    RateLimited,
    /// Anything else: never retried.
    Fatal,
}

/// Errors from the chain read path.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChainError {
    /// Connect, timeout, or 5xx from the full node.
    #[error("network error: {0}")]
    Network(String),

    /// HTTP 429 or a JSON-RPC throttling error.
    #[error("rate limited (retry after {retry_after_ms:?} ms)")]
    RateLimited { retry_after_ms: Option<u64> },

    /// JSON-RPC error object returned by the node.
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// Response did not have the expected shape.
    #[error("decode error: {0}")]
    Decode(String),
}

impl ChainError {
    pub fn class(&self) -> FailureClass {
        match self {
            ChainError::Network(_) => FailureClass::Network,
            ChainError::RateLimited { .. } => FailureClass::RateLimited,
            ChainError::Rpc { .. } | ChainError::Decode(_) => FailureClass::Fatal,
        }
    }

    /// Failures that may degrade to cached-or-empty instead of surfacing.
    pub fn is_degradable(&self) -> bool {
        self.class() != FailureClass::Fatal
    }
}

impl From<serde_json::Error> for ChainError {
    fn from(e: serde_json::Error) -> Self {
        ChainError::Decode(e.to_string())
    }
}
