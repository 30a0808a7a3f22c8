//! Content-addressed memo in front of an [`InferenceEngine`], with a
//! bounded audit trail of every inference served.

use crate::{InferenceEngine, InferenceError, NumericVector, Prediction, Result};
use chrono::{DateTime, Utc};
use lru::LruCache;
use oracle_types::H256;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::path::Path;
use tracing::{debug, info};

pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;
pub const DEFAULT_HISTORY_CAPACITY: usize = 1_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub input: Vec<f64>,
    pub prediction: Vec<f64>,
    pub confidence: f64,
    pub model_id: String,
    pub cached: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub model_id: String,
    pub cache_size: usize,
    pub total_predictions: usize,
    pub hits: u64,
    pub misses: u64,
    pub avg_confidence: f64,
}

/// Result of a single inference.
#[derive(Debug, Clone, PartialEq)]
pub struct Inference {
    pub key: H256,
    pub prediction: Prediction,
    pub cached: bool,
}

pub struct PredictionCache {
    engine: Box<dyn InferenceEngine>,
    entries: LruCache<H256, Prediction>,
    history: VecDeque<HistoryEntry>,
    history_capacity: usize,
    hits: u64,
    misses: u64,
}

impl PredictionCache {
    pub fn new(engine: Box<dyn InferenceEngine>) -> Self {
        Self::with_capacity(engine, DEFAULT_CACHE_CAPACITY, DEFAULT_HISTORY_CAPACITY)
    }

    /// Zero capacities are raised to one.
    pub fn with_capacity(
        engine: Box<dyn InferenceEngine>,
        cache_capacity: usize,
        history_capacity: usize,
    ) -> Self {
        let cache_capacity = NonZeroUsize::new(cache_capacity).unwrap_or(NonZeroUsize::MIN);
        let history_capacity = history_capacity.max(1);
        Self {
            engine,
            entries: LruCache::new(cache_capacity),
            history: VecDeque::with_capacity(history_capacity),
            history_capacity,
            hits: 0,
            misses: 0,
        }
    }

    pub fn engine(&self) -> &dyn InferenceEngine {
        self.engine.as_ref()
    }

    /// Serve from cache, or run the engine and remember the validated result.
    pub fn infer(&mut self, input: &NumericVector) -> Result<Inference> {
        let expected = self.engine.input_dim();
        if input.len() != expected {
            return Err(InferenceError::DimensionMismatch {
                expected,
                actual: input.len(),
            });
        }

        let key = input.content_hash();
        if let Some(prediction) = self.entries.get(&key).cloned() {
            self.hits += 1;
            debug!("Cache hit for {:x}", key);
            self.record(input, &prediction, true);
            return Ok(Inference {
                key,
                prediction,
                cached: true,
            });
        }

        let prediction = validate(self.engine.predict(input)?)?;
        self.misses += 1;
        self.entries.put(key, prediction.clone());
        self.record(input, &prediction, false);

        Ok(Inference {
            key,
            prediction,
            cached: false,
        })
    }

    /// Per-input results; one failure does not abort the batch.
    pub fn infer_batch(&mut self, inputs: &[NumericVector]) -> Vec<Result<Inference>> {
        inputs.iter().map(|input| self.infer(input)).collect()
    }

    fn record(&mut self, input: &NumericVector, prediction: &Prediction, cached: bool) {
        if self.history.len() == self.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(HistoryEntry {
            timestamp: Utc::now(),
            input: input.to_vec(),
            prediction: prediction.values.clone(),
            confidence: prediction.confidence,
            model_id: self.engine.model_id().to_string(),
            cached,
        });
    }

    pub fn stats(&self) -> CacheStats {
        let total = self.history.len();
        let avg_confidence = if total == 0 {
            0.0
        } else {
            self.history.iter().map(|e| e.confidence).sum::<f64>() / total as f64
        };

        CacheStats {
            model_id: self.engine.model_id().to_string(),
            cache_size: self.entries.len(),
            total_predictions: total,
            hits: self.hits,
            misses: self.misses,
            avg_confidence,
        }
    }

    /// Drop memoized predictions. History and counters are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
        info!("Prediction cache cleared");
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.history.iter().cloned().collect()
    }

    pub fn export_history<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(&self.history)?;
        std::fs::write(path, json)?;
        info!("Exported {} history entries to {}", self.history.len(), path.display());
        Ok(())
    }
}

fn validate(mut prediction: Prediction) -> Result<Prediction> {
    if prediction.values.is_empty() {
        return Err(InferenceError::InvalidOutput("empty prediction".into()));
    }
    if prediction.values.iter().any(|v| !v.is_finite()) {
        return Err(InferenceError::InvalidOutput("non-finite prediction".into()));
    }
    if !prediction.confidence.is_finite() {
        return Err(InferenceError::InvalidOutput("non-finite confidence".into()));
    }
    prediction.confidence = prediction.confidence.clamp(0.0, 100.0);
    Ok(prediction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Echoes the first input as the prediction and counts invocations.
    struct CountingEngine {
        calls: Arc<AtomicUsize>,
        confidence: f64,
    }

    impl InferenceEngine for CountingEngine {
        fn model_id(&self) -> &str {
            "counting"
        }

        fn input_dim(&self) -> usize {
            2
        }

        fn predict(&self, input: &NumericVector) -> Result<Prediction> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Prediction {
                values: vec![input[0]],
                confidence: self.confidence,
            })
        }
    }

    fn counting(confidence: f64) -> (PredictionCache, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = CountingEngine {
            calls: calls.clone(),
            confidence,
        };
        (PredictionCache::new(Box::new(engine)), calls)
    }

    fn vector(values: &[f64]) -> NumericVector {
        NumericVector::new(values.to_vec()).unwrap()
    }

    #[test]
    fn test_second_inference_is_cached() {
        let (mut cache, calls) = counting(90.0);
        let input = vector(&[0.7, 1.0]);

        let first = cache.infer(&input).unwrap();
        let second = cache.infer(&input).unwrap();

        assert!(!first.cached);
        assert!(second.cached);
        assert_eq!(first.prediction, second.prediction);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (1, 1));
        assert_eq!(stats.cache_size, 1);
        assert_eq!(stats.total_predictions, 2);
        assert_eq!(stats.avg_confidence, 90.0);
    }

    #[test]
    fn test_confidence_clamped() {
        let (mut cache, _) = counting(250.0);
        let out = cache.infer(&vector(&[1.0, 1.0])).unwrap();
        assert_eq!(out.prediction.confidence, 100.0);

        let (mut cache, _) = counting(-3.0);
        let out = cache.infer(&vector(&[1.0, 1.0])).unwrap();
        assert_eq!(out.prediction.confidence, 0.0);
        assert!(cache.history().iter().all(|e| (0.0..=100.0).contains(&e.confidence)));
    }

    #[test]
    fn test_non_finite_confidence_rejected() {
        let (mut cache, _) = counting(f64::NAN);
        assert!(matches!(
            cache.infer(&vector(&[1.0, 1.0])),
            Err(InferenceError::InvalidOutput(_))
        ));
        assert_eq!(cache.stats().cache_size, 0);
    }

    #[test]
    fn test_dimension_checked_before_engine() {
        let (mut cache, calls) = counting(50.0);
        assert!(cache.infer(&vector(&[1.0])).is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_history_bound() {
        let (mut cache, _) = counting(50.0);
        for i in 0..=DEFAULT_HISTORY_CAPACITY {
            cache.infer(&vector(&[i as f64, 0.0])).unwrap();
        }

        let history = cache.history();
        assert_eq!(history.len(), DEFAULT_HISTORY_CAPACITY);
        assert_eq!(history[0].input, vec![1.0, 0.0]);
        assert_eq!(history.last().unwrap().input, vec![DEFAULT_HISTORY_CAPACITY as f64, 0.0]);
    }

    #[test]
    fn test_lru_eviction() {
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = CountingEngine { calls: calls.clone(), confidence: 50.0 };
        let mut cache = PredictionCache::with_capacity(Box::new(engine), 2, 10);

        cache.infer(&vector(&[1.0, 0.0])).unwrap();
        cache.infer(&vector(&[2.0, 0.0])).unwrap();
        cache.infer(&vector(&[3.0, 0.0])).unwrap();
        assert_eq!(cache.stats().cache_size, 2);

        // [1, 0] was evicted and must be recomputed
        cache.infer(&vector(&[1.0, 0.0])).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_clear_forces_recompute() {
        let (mut cache, calls) = counting(50.0);
        let input = vector(&[1.0, 2.0]);
        cache.infer(&input).unwrap();
        cache.clear();
        assert_eq!(cache.stats().cache_size, 0);
        assert!(!cache.infer(&input).unwrap().cached);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_batch_keeps_going() {
        let (mut cache, _) = counting(50.0);
        let results = cache.infer_batch(&[vector(&[1.0, 1.0]), vector(&[1.0]), vector(&[2.0, 2.0])]);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert!(results[2].is_ok());
    }

    #[test]
    fn test_export_history() {
        let (mut cache, _) = counting(75.0);
        cache.infer(&vector(&[1.0, 2.0])).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        cache.export_history(&path).unwrap();

        let exported: Vec<HistoryEntry> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(exported, cache.history());
        assert_eq!(exported[0].model_id, "counting");
    }
}
