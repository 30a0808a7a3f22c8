use crate::{InferenceError, Result};
use oracle_crypto::keccak256;
use oracle_types::H256;
use serde::{Deserialize, Serialize};
use std::ops::Deref;

/// Non-empty vector of finite `f64` features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct NumericVector(Vec<f64>);

impl NumericVector {
    pub fn new(values: Vec<f64>) -> Result<Self> {
        if values.is_empty() {
            return Err(InferenceError::EmptyInput);
        }
        if let Some((index, &value)) = values.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(InferenceError::NonFinite { index, value });
        }
        Ok(Self(values))
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.0
    }

    /// Cache key: Keccak-256 of the length (u64 BE) followed by every
    /// element's IEEE-754 BE bytes. `-0.0` hashes as `0.0`.
    pub fn content_hash(&self) -> H256 {
        let mut buf = Vec::with_capacity(8 + self.0.len() * 8);
        buf.extend_from_slice(&(self.0.len() as u64).to_be_bytes());
        for value in &self.0 {
            let value = if *value == 0.0 { 0.0f64 } else { *value };
            buf.extend_from_slice(&value.to_be_bytes());
        }
        keccak256(&buf)
    }
}

impl Deref for NumericVector {
    type Target = [f64];

    fn deref(&self) -> &[f64] {
        &self.0
    }
}

impl TryFrom<Vec<f64>> for NumericVector {
    type Error = InferenceError;

    fn try_from(values: Vec<f64>) -> Result<Self> {
        Self::new(values)
    }
}

impl From<NumericVector> for Vec<f64> {
    fn from(vector: NumericVector) -> Self {
        vector.0
    }
}
