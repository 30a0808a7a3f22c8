use oracle_inference::InferenceError;
use thiserror::Error;

use crate::decoder::DecodeError;
use crate::fetcher::FetchError;
use crate::submitter::SubmitError;

/// Failure taxonomy of the bridge. Only `Setup` is fatal; the loop maps
/// every other kind to a per-request or per-tick policy.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Setup error: {0}")]
    Setup(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Inference error: {0}")]
    Inference(#[from] InferenceError),

    #[error("Submission error: {0}")]
    Submission(#[from] SubmitError),
}

impl BridgeError {
    pub fn setup(message: impl Into<String>) -> Self {
        BridgeError::Setup(message.into())
    }

    /// Short label used in logs and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            BridgeError::Setup(_) => "setup",
            BridgeError::Fetch(FetchError::RateLimited(_)) => "rate_limited",
            BridgeError::Fetch(FetchError::Provider(_)) => "provider",
            BridgeError::Decode(_) => "decode",
            BridgeError::Inference(_) => "inference",
            BridgeError::Submission(_) => "submission",
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
