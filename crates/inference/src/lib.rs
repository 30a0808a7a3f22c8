pub mod cache;
pub mod model;
pub mod signal;
pub mod vector;

pub use cache::{CacheStats, HistoryEntry, Inference, PredictionCache};
pub use model::{load_model, InferenceEngine, LinearModel, LogisticModel, ModelFile, ModelKind, Prediction};
pub use signal::Signal;
pub use vector::NumericVector;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Input vector is empty")]
    EmptyInput,

    #[error("Non-finite value {value} at index {index}")]
    NonFinite { index: usize, value: f64 },

    #[error("Input dimension mismatch: model expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid engine output: {0}")]
    InvalidOutput(String),

    #[error("Invalid model: {0}")]
    InvalidModel(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, InferenceError>;
