use crate::{InferenceError, NumericVector, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Confidence reported by regression models, which have no probability.
pub const DEFAULT_REGRESSION_CONFIDENCE: f64 = 85.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub values: Vec<f64>,
    /// Percentage in [0, 100].
    pub confidence: f64,
}

impl Prediction {
    pub fn primary(&self) -> Option<f64> {
        self.values.first().copied()
    }
}

/// Pure function from a feature vector to a prediction.
pub trait InferenceEngine: Send + Sync {
    fn model_id(&self) -> &str;

    fn input_dim(&self) -> usize;

    fn predict(&self, input: &NumericVector) -> Result<Prediction>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Logistic,
    Linear,
}

/// On-disk model description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelFile {
    pub kind: ModelKind,
    pub id: String,
    pub weights: Vec<f64>,
    #[serde(default)]
    pub bias: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub means: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scales: Option<Vec<f64>>,
}

impl ModelFile {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn into_engine(self) -> Result<Box<dyn InferenceEngine>> {
        let engine: Box<dyn InferenceEngine> = match self.kind {
            ModelKind::Logistic => Box::new(LogisticModel::new(self)?),
            ModelKind::Linear => Box::new(LinearModel::new(self)?),
        };
        Ok(engine)
    }
}

/// Load a model file and build the matching backend.
pub fn load_model<P: AsRef<Path>>(path: P) -> Result<Box<dyn InferenceEngine>> {
    let path = path.as_ref();
    let file = ModelFile::from_file(path)?;
    info!(
        "Loaded {:?} model '{}' ({} features) from {}",
        file.kind,
        file.id,
        file.weights.len(),
        path.display()
    );
    file.into_engine()
}

/// `w · standardize(x) + b`
#[derive(Debug, Clone)]
struct Affine {
    weights: Vec<f64>,
    bias: f64,
    means: Vec<f64>,
    scales: Vec<f64>,
}

impl Affine {
    fn from_file(file: &ModelFile) -> Result<Self> {
        let dim = file.weights.len();
        if dim == 0 {
            return Err(InferenceError::InvalidModel("no weights".into()));
        }

        let means = file.means.clone().unwrap_or_else(|| vec![0.0; dim]);
        let scales = file.scales.clone().unwrap_or_else(|| vec![1.0; dim]);
        if means.len() != dim || scales.len() != dim {
            return Err(InferenceError::InvalidModel(format!(
                "means/scales must have {} entries",
                dim
            )));
        }

        let all_finite = file
            .weights
            .iter()
            .chain(&means)
            .chain(&scales)
            .chain(std::iter::once(&file.bias))
            .all(|v| v.is_finite());
        if !all_finite {
            return Err(InferenceError::InvalidModel("non-finite parameter".into()));
        }
        if scales.iter().any(|s| *s == 0.0) {
            return Err(InferenceError::InvalidModel("zero scale".into()));
        }

        Ok(Self {
            weights: file.weights.clone(),
            bias: file.bias,
            means,
            scales,
        })
    }

    fn dim(&self) -> usize {
        self.weights.len()
    }

    fn evaluate(&self, input: &NumericVector) -> Result<f64> {
        if input.len() != self.dim() {
            return Err(InferenceError::DimensionMismatch {
                expected: self.dim(),
                actual: input.len(),
            });
        }

        let sum = input
            .iter()
            .zip(&self.means)
            .zip(&self.scales)
            .zip(&self.weights)
            .map(|(((x, mean), scale), w)| w * (x - mean) / scale)
            .sum::<f64>();
        Ok(sum + self.bias)
    }
}

/// Binary classifier: `p = sigmoid(w·x + b)`.
#[derive(Debug, Clone)]
pub struct LogisticModel {
    id: String,
    affine: Affine,
}

impl LogisticModel {
    pub fn new(file: ModelFile) -> Result<Self> {
        Ok(Self {
            affine: Affine::from_file(&file)?,
            id: file.id,
        })
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl InferenceEngine for LogisticModel {
    fn model_id(&self) -> &str {
        &self.id
    }

    fn input_dim(&self) -> usize {
        self.affine.dim()
    }

    fn predict(&self, input: &NumericVector) -> Result<Prediction> {
        let p = sigmoid(self.affine.evaluate(input)?);
        Ok(Prediction {
            values: vec![p],
            confidence: p.max(1.0 - p) * 100.0,
        })
    }
}

/// Regressor with a fixed confidence.
#[derive(Debug, Clone)]
pub struct LinearModel {
    id: String,
    affine: Affine,
    confidence: f64,
}

impl LinearModel {
    pub fn new(file: ModelFile) -> Result<Self> {
        let confidence = file.confidence.unwrap_or(DEFAULT_REGRESSION_CONFIDENCE);
        if !(0.0..=100.0).contains(&confidence) {
            return Err(InferenceError::InvalidModel(format!(
                "confidence {} outside [0, 100]",
                confidence
            )));
        }
        Ok(Self {
            affine: Affine::from_file(&file)?,
            id: file.id,
            confidence,
        })
    }
}

impl InferenceEngine for LinearModel {
    fn model_id(&self) -> &str {
        &self.id
    }

    fn input_dim(&self) -> usize {
        self.affine.dim()
    }

    fn predict(&self, input: &NumericVector) -> Result<Prediction> {
        Ok(Prediction {
            values: vec![self.affine.evaluate(input)?],
            confidence: self.confidence,
        })
    }
}
