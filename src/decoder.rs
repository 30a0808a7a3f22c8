use oracle_inference::{InferenceError, NumericVector};
use oracle_types::Bytes;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Empty payload")]
    Empty,

    #[error("Payload is not a JSON number array: {0}")]
    NotJson(String),

    #[error("Invalid feature vector: {0}")]
    InvalidVector(#[from] InferenceError),
}

/// How a payload was turned into features.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodePath {
    Json,
    /// Legacy encoding: every byte is one feature.
    RawBytes,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedInput {
    pub vector: NumericVector,
    pub path: DecodePath,
}

#[derive(Debug, Clone)]
pub struct InputDecoder {
    allow_raw_fallback: bool,
}

impl Default for InputDecoder {
    fn default() -> Self {
        Self::new(true)
    }
}

impl InputDecoder {
    pub fn new(allow_raw_fallback: bool) -> Self {
        Self { allow_raw_fallback }
    }

    pub fn decode(&self, payload: &[u8]) -> Result<DecodedInput, DecodeError> {
        if payload.is_empty() {
            return Err(DecodeError::Empty);
        }

        match serde_json::from_slice::<Vec<f64>>(payload) {
            Ok(values) => Ok(DecodedInput {
                vector: NumericVector::new(values)?,
                path: DecodePath::Json,
            }),
            Err(_) if self.allow_raw_fallback => {
                let values = payload.iter().map(|&b| f64::from(b)).collect();
                Ok(DecodedInput {
                    vector: NumericVector::new(values)?,
                    path: DecodePath::RawBytes,
                })
            }
            Err(e) => Err(DecodeError::NotJson(e.to_string())),
        }
    }

    /// Canonical payload for a vector: a UTF-8 JSON array.
    pub fn encode(vector: &NumericVector) -> Bytes {
        // finite floats always serialize
        serde_json::to_vec(vector.as_slice())
            .map(Bytes::from_vec)
            .unwrap_or_default()
    }
}
