use thiserror::Error;

pub mod client;
pub mod ledger;
pub mod types;

pub use client::HttpClient;
pub use ledger::LedgerClient;
pub use types::*;

/// Non-standard code used by Infura, Alchemy and most public endpoints
/// for "limit exceeded".
pub const LIMIT_EXCEEDED: i64 = -32005;

const RATE_LIMIT_MARKERS: [&str; 3] = ["limit exceeded", "rate limit", "too many requests"];

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timed out")]
    Timeout,

    #[error("HTTP status {status}: {body}")]
    Http { status: u16, body: String },

    #[error("JSON-RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl RpcError {
    /// The provider is throttling us and wants a longer pause.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            RpcError::Http { status, body } => *status == 429 || mentions_rate_limit(body),
            RpcError::Rpc { code, message } => *code == LIMIT_EXCEEDED || mentions_rate_limit(message),
            RpcError::Transport(message) => mentions_rate_limit(message),
            RpcError::Timeout | RpcError::InvalidResponse(_) => false,
        }
    }

    pub fn code(&self) -> Option<i64> {
        match self {
            RpcError::Rpc { code, .. } => Some(*code),
            _ => None,
        }
    }
}

fn mentions_rate_limit(message: &str) -> bool {
    let lower = message.to_lowercase();
    RATE_LIMIT_MARKERS.iter().any(|marker| lower.contains(marker))
}

pub type Result<T> = std::result::Result<T, RpcError>;
