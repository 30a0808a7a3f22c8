//! The polling loop tying fetcher, decoder, cache and submitter together.
//!
//! Each tick reads the head, processes the pending block range and only then
//! advances the cursor. Provider failures on the read side leave the range in
//! place for the next tick; per-request failures never do.

use std::sync::Arc;
use std::time::Duration;

use oracle_crypto::Signer;
use oracle_inference::{load_model, PredictionCache};
use oracle_rpc::LedgerClient;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::contract::PredictionRequest;
use crate::cursor::{BlockCursor, BlockRange};
use crate::decoder::{DecodePath, InputDecoder};
use crate::error::{BridgeError, Result};
use crate::fetcher::{EventFetcher, FetchError};
use crate::metrics::BridgeMetrics;
use crate::submitter::{FulfillmentTx, SubmitOutcome, Submitter};

#[derive(Debug, Clone)]
pub struct BridgeSettings {
    pub poll_interval: Duration,
    pub error_cooldown: Duration,
    pub rate_limit_cooldown: Duration,
    pub max_block_range: Option<u64>,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            error_cooldown: Duration::from_secs(5),
            rate_limit_cooldown: Duration::from_secs(60),
            max_block_range: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Head has not moved past the cursor.
    Idle,
    /// The range was handled and the cursor moved to its end.
    Processed(BlockRange),
    /// The provider throttled a head or log read; nothing advanced.
    RateLimited,
    /// Any other head or log read failure; nothing advanced.
    ProviderError,
}

/// What happened to a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    Fulfilled,
    Reverted,
    StatusUnknown,
    Dropped,
    SubmissionFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub outcome: TickOutcome,
    pub head: Option<u64>,
    pub cursor: u64,
    pub requests: usize,
    pub fulfilled: usize,
    pub reverted: usize,
    pub status_unknown: usize,
    pub dropped: usize,
    pub submission_failures: usize,
    /// Delay before the next tick.
    pub sleep: Duration,
}

impl TickReport {
    fn new(outcome: TickOutcome, cursor: u64) -> Self {
        Self {
            outcome,
            head: None,
            cursor,
            requests: 0,
            fulfilled: 0,
            reverted: 0,
            status_unknown: 0,
            dropped: 0,
            submission_failures: 0,
            sleep: Duration::ZERO,
        }
    }

    fn record(&mut self, outcome: RequestOutcome) {
        self.requests += 1;
        match outcome {
            RequestOutcome::Fulfilled => self.fulfilled += 1,
            RequestOutcome::Reverted => self.reverted += 1,
            RequestOutcome::StatusUnknown => self.status_unknown += 1,
            RequestOutcome::Dropped => self.dropped += 1,
            RequestOutcome::SubmissionFailed => self.submission_failures += 1,
        }
    }
}

pub struct Bridge {
    ledger: Arc<dyn LedgerClient>,
    cursor: BlockCursor,
    fetcher: EventFetcher,
    decoder: InputDecoder,
    cache: PredictionCache,
    submitter: Submitter,
    settings: BridgeSettings,
    metrics: Option<Arc<BridgeMetrics>>,
}

impl Bridge {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        cursor: BlockCursor,
        fetcher: EventFetcher,
        decoder: InputDecoder,
        cache: PredictionCache,
        submitter: Submitter,
        settings: BridgeSettings,
    ) -> Self {
        Self {
            ledger,
            cursor,
            fetcher,
            decoder,
            cache,
            submitter,
            settings,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<BridgeMetrics>) -> Self {
        metrics.cursor_block.set(clamp_gauge(self.cursor.last_processed()));
        self.metrics = Some(metrics);
        self
    }

    /// Check the ledger, load the model and position the cursor.
    pub async fn from_config(config: &Config, signer: Signer, ledger: Arc<dyn LedgerClient>) -> Result<Self> {
        let chain_id = ledger
            .chain_id()
            .await
            .map_err(|e| BridgeError::setup(format!("ledger unreachable: {}", e)))?;
        if chain_id != config.ledger.chain_id {
            return Err(BridgeError::setup(format!(
                "chain ID mismatch: configured {}, ledger reports {}",
                config.ledger.chain_id, chain_id
            )));
        }

        let engine = load_model(&config.model.path).map_err(|e| {
            BridgeError::setup(format!("cannot load model {}: {}", config.model.path.display(), e))
        })?;
        let cache = PredictionCache::with_capacity(
            engine,
            config.model.cache_capacity,
            config.model.history_capacity,
        );

        let cursor = match config.bridge.start_block {
            Some(start) => BlockCursor::starting_at(start),
            None => {
                let head = ledger
                    .block_number()
                    .await
                    .map_err(|e| BridgeError::setup(format!("cannot read head block: {}", e)))?;
                BlockCursor::new(head)
            }
        };

        let request_contract = config.contract.request_address();
        let fetcher = EventFetcher::new(ledger.clone(), request_contract);
        let submitter = Submitter::new(
            ledger.clone(),
            signer,
            config.contract.oracle_address,
            request_contract,
            config.submitter_settings(),
        );

        info!(
            "Bridge ready on chain {}: oracle {}, account {}, model '{}', starting after block {}",
            chain_id,
            config.contract.oracle_address,
            submitter.account(),
            cache.engine().model_id(),
            cursor.last_processed()
        );

        Ok(Self::new(
            ledger,
            cursor,
            fetcher,
            InputDecoder::new(config.decoder.allow_raw_fallback),
            cache,
            submitter,
            config.loop_settings(),
        ))
    }

    pub fn cursor(&self) -> &BlockCursor {
        &self.cursor
    }

    pub fn cache(&self) -> &PredictionCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut PredictionCache {
        &mut self.cache
    }

    /// One iteration: head, fetch, process, advance.
    pub async fn tick(&mut self) -> TickReport {
        let cursor = self.cursor.last_processed();

        let head = match self.ledger.block_number().await {
            Ok(head) => head,
            Err(e) => return self.provider_failure(FetchError::from(e), cursor, None),
        };
        if let Some(metrics) = &self.metrics {
            metrics.head_block.set(clamp_gauge(head));
        }

        let range = match self.cursor.pending_range(head, self.settings.max_block_range) {
            Some(range) => range,
            None => {
                let mut report = TickReport::new(TickOutcome::Idle, cursor);
                report.head = Some(head);
                report.sleep = self.settings.poll_interval;
                return report;
            }
        };

        let events = match self.fetcher.fetch(range).await {
            Ok(events) => events,
            Err(e) => return self.provider_failure(e, cursor, Some(head)),
        };
        if let Some(metrics) = &self.metrics {
            metrics.logs_undecodable.inc_by(events.undecodable as u64);
            metrics.logs_removed.inc_by(events.removed as u64);
        }
        if !events.requests.is_empty() {
            info!("Found {} prediction requests in blocks {}", events.requests.len(), range);
        }

        let mut report = TickReport::new(TickOutcome::Processed(range), cursor);
        report.head = Some(head);
        for request in events.requests {
            let outcome = self.process(&request).await;
            report.record(outcome);
        }

        if let Err(e) = self.cursor.advance(range.to) {
            error!("{}", e);
        }
        report.cursor = self.cursor.last_processed();
        report.sleep = self.settings.poll_interval;
        if let Some(metrics) = &self.metrics {
            metrics.cursor_block.set(clamp_gauge(report.cursor));
        }

        debug!(
            "Processed blocks {}: {} requests, {} fulfilled, {} reverted, {} unknown, {} dropped, {} failed",
            range,
            report.requests,
            report.fulfilled,
            report.reverted,
            report.status_unknown,
            report.dropped,
            report.submission_failures
        );
        report
    }

    fn provider_failure(&self, error: FetchError, cursor: u64, head: Option<u64>) -> TickReport {
        let (outcome, sleep) = match &error {
            FetchError::RateLimited(_) => {
                warn!(
                    "{}; cooling down for {}s",
                    error,
                    self.settings.rate_limit_cooldown.as_secs()
                );
                (TickOutcome::RateLimited, self.settings.rate_limit_cooldown)
            }
            FetchError::Provider(_) => {
                error!("{}; retrying in {}s", error, self.settings.error_cooldown.as_secs());
                (TickOutcome::ProviderError, self.settings.error_cooldown)
            }
        };
        if let Some(metrics) = &self.metrics {
            metrics
                .provider_errors
                .with_label_values(&[BridgeError::from(error).kind()])
                .inc();
        }

        let mut report = TickReport::new(outcome, cursor);
        report.head = head;
        report.sleep = sleep;
        report
    }

    async fn process(&mut self, request: &PredictionRequest) -> RequestOutcome {
        if let Some(metrics) = &self.metrics {
            metrics.requests_seen.inc();
        }
        info!(
            "Request {:x} from {} at block {} ({} payload bytes)",
            request.request_id,
            request.requester,
            request.observed_block,
            request.input_payload.len()
        );

        match self.handle(request).await {
            Ok(SubmitOutcome::Fulfilled { gas_used, .. }) => {
                if let Some(metrics) = &self.metrics {
                    metrics.fulfillments.with_label_values(&["success"]).inc();
                    metrics.gas_used.inc_by(gas_used.low_u64());
                }
                RequestOutcome::Fulfilled
            }
            Ok(SubmitOutcome::Reverted { .. }) => {
                if let Some(metrics) = &self.metrics {
                    metrics.fulfillments.with_label_values(&["reverted"]).inc();
                }
                RequestOutcome::Reverted
            }
            Ok(SubmitOutcome::StatusUnknown { gas_used, .. }) => {
                if let Some(metrics) = &self.metrics {
                    metrics.fulfillments.with_label_values(&["unknown"]).inc();
                    metrics.gas_used.inc_by(gas_used.low_u64());
                }
                RequestOutcome::StatusUnknown
            }
            Err(BridgeError::Submission(e)) => {
                error!("Abandoning request {:x}: {}", request.request_id, e);
                if let Some(metrics) = &self.metrics {
                    metrics.submission_failures.inc();
                }
                RequestOutcome::SubmissionFailed
            }
            Err(e) => {
                warn!("Dropping request {:x}: {}", request.request_id, e);
                if let Some(metrics) = &self.metrics {
                    metrics.requests_dropped.with_label_values(&[e.kind()]).inc();
                }
                RequestOutcome::Dropped
            }
        }
    }

    async fn handle(&mut self, request: &PredictionRequest) -> Result<SubmitOutcome> {
        let decoded = self.decoder.decode(&request.input_payload)?;
        if decoded.path == DecodePath::RawBytes {
            warn!(
                "Request {:x} is not JSON; using {} raw bytes as features",
                request.request_id,
                decoded.vector.len()
            );
        }

        let inference = self.cache.infer(&decoded.vector)?;
        if let Some(metrics) = &self.metrics {
            if inference.cached {
                metrics.cache_hits.inc();
            } else {
                metrics.cache_misses.inc();
            }
        }

        let prediction = inference.prediction.primary().unwrap_or_default();
        let fulfillment = FulfillmentTx::new(request.request_id, prediction, inference.prediction.confidence);
        debug!(
            "Request {:x}: prediction {} (scaled {}), confidence {}%{}",
            request.request_id,
            prediction,
            fulfillment.scaled_prediction,
            fulfillment.confidence,
            if inference.cached { ", cached" } else { "" }
        );

        Ok(self.submitter.submit(&fulfillment).await?)
    }

    /// Tick until `shutdown` turns true or its sender goes away.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        info!("Bridge loop started");
        loop {
            if *shutdown.borrow() {
                break;
            }

            let report = self.tick().await;

            tokio::select! {
                _ = tokio::time::sleep(report.sleep) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        let stats = self.cache.stats();
        info!(
            "Bridge loop stopped at block {}: {} predictions ({} cached), avg confidence {:.1}%",
            self.cursor.last_processed(),
            stats.total_predictions,
            stats.hits,
            stats.avg_confidence
        );
    }
}

fn clamp_gauge(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
