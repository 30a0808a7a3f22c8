use std::net::SocketAddr;
use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use tracing::info;

/// Prometheus metrics for the bridge loop.
pub struct BridgeMetrics {
    registry: Registry,
    pub head_block: IntGauge,
    pub cursor_block: IntGauge,
    pub requests_seen: IntCounter,
    pub requests_dropped: IntCounterVec,
    pub logs_undecodable: IntCounter,
    pub logs_removed: IntCounter,
    pub fulfillments: IntCounterVec,
    pub submission_failures: IntCounter,
    pub provider_errors: IntCounterVec,
    pub cache_hits: IntCounter,
    pub cache_misses: IntCounter,
    pub gas_used: IntCounter,
}

impl BridgeMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let head_block = IntGauge::new("oracle_head_block", "Latest ledger head seen")?;
        let cursor_block = IntGauge::new("oracle_cursor_block", "Last fully processed block")?;
        let requests_seen = IntCounter::new("oracle_requests_total", "Prediction requests observed")?;
        let requests_dropped = IntCounterVec::new(
            Opts::new("oracle_requests_dropped_total", "Requests dropped before submission"),
            &["reason"],
        )?;
        let logs_undecodable = IntCounter::new(
            "oracle_logs_undecodable_total",
            "Request logs that failed to decode",
        )?;
        let logs_removed = IntCounter::new("oracle_logs_removed_total", "Reorged logs skipped")?;
        let fulfillments = IntCounterVec::new(
            Opts::new("oracle_fulfillments_total", "Fulfillment transactions with a receipt"),
            &["status"],
        )?;
        let submission_failures = IntCounter::new(
            "oracle_submission_failures_total",
            "Fulfillments abandoned before a receipt",
        )?;
        let provider_errors = IntCounterVec::new(
            Opts::new("oracle_provider_errors_total", "Failed head or log reads"),
            &["kind"],
        )?;
        let cache_hits = IntCounter::new("oracle_cache_hits_total", "Predictions served from cache")?;
        let cache_misses = IntCounter::new("oracle_cache_misses_total", "Predictions computed")?;
        let gas_used = IntCounter::new("oracle_gas_used_total", "Gas used by fulfillments")?;

        registry.register(Box::new(head_block.clone()))?;
        registry.register(Box::new(cursor_block.clone()))?;
        registry.register(Box::new(requests_seen.clone()))?;
        registry.register(Box::new(requests_dropped.clone()))?;
        registry.register(Box::new(logs_undecodable.clone()))?;
        registry.register(Box::new(logs_removed.clone()))?;
        registry.register(Box::new(fulfillments.clone()))?;
        registry.register(Box::new(submission_failures.clone()))?;
        registry.register(Box::new(provider_errors.clone()))?;
        registry.register(Box::new(cache_hits.clone()))?;
        registry.register(Box::new(cache_misses.clone()))?;
        registry.register(Box::new(gas_used.clone()))?;

        Ok(Self {
            registry,
            head_block,
            cursor_block,
            requests_seen,
            requests_dropped,
            logs_undecodable,
            logs_removed,
            fulfillments,
            submission_failures,
            provider_errors,
            cache_hits,
            cache_misses,
            gas_used,
        })
    }

    /// Prometheus text exposition of every registered metric.
    pub fn render(&self) -> String {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buffer) {
            tracing::error!("Failed to encode metrics: {}", e);
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

async fn metrics_handler(State(metrics): State<Arc<BridgeMetrics>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4")],
        metrics.render(),
    )
}

async fn health_check() -> &'static str {
    "OK"
}

pub fn router(metrics: Arc<BridgeMetrics>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_check))
        .with_state(metrics)
}

/// Serve `/metrics` and `/health` until the task is dropped.
pub async fn serve(addr: SocketAddr, metrics: Arc<BridgeMetrics>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Metrics server listening on http://{}", addr);
    axum::serve(listener, router(metrics)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[test]
    fn test_render_contains_metrics() {
        let metrics = BridgeMetrics::new().unwrap();
        metrics.head_block.set(110);
        metrics.fulfillments.with_label_values(&["reverted"]).inc();

        let text = metrics.render();
        assert!(text.contains("oracle_head_block 110"));
        assert!(text.contains("oracle_fulfillments_total{status=\"reverted\"} 1"));
    }

    #[tokio::test]
    async fn test_serve_health() {
        let metrics = Arc::new(BridgeMetrics::new().unwrap());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(metrics)).await.unwrap();
        });

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.ends_with("OK"));
    }
}
