use std::sync::Arc;

use oracle_rpc::{LedgerClient, LogFilter, RpcError};
use oracle_types::{Address, H256};
use thiserror::Error;
use tracing::{debug, warn};

use crate::contract::{prediction_requested_topic, PredictionRequest};
use crate::cursor::BlockRange;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Provider rate limited: {0}")]
    RateLimited(RpcError),

    #[error("Provider error: {0}")]
    Provider(RpcError),
}

impl From<RpcError> for FetchError {
    fn from(error: RpcError) -> Self {
        if error.is_rate_limited() {
            FetchError::RateLimited(error)
        } else {
            FetchError::Provider(error)
        }
    }
}

/// Requests found in one block range, in (block, log index) order.
#[derive(Debug, Default)]
pub struct FetchedEvents {
    pub requests: Vec<PredictionRequest>,
    /// Logs that did not decode as `PredictionRequested`.
    pub undecodable: usize,
    /// Logs flagged as removed by a reorg.
    pub removed: usize,
}

pub struct EventFetcher {
    ledger: Arc<dyn LedgerClient>,
    contract: Address,
    topic: H256,
}

impl EventFetcher {
    pub fn new(ledger: Arc<dyn LedgerClient>, contract: Address) -> Self {
        Self {
            ledger,
            contract,
            topic: prediction_requested_topic(),
        }
    }

    pub fn contract(&self) -> Address {
        self.contract
    }

    pub async fn fetch(&self, range: BlockRange) -> Result<FetchedEvents, FetchError> {
        let filter = LogFilter::new(self.contract, self.topic, range.first_block(), range.last_block());
        let mut logs = self.ledger.get_logs(&filter).await?;
        logs.sort_by_key(|log| log.position());
        debug!("Fetched {} logs for blocks {}", logs.len(), range);

        let mut events = FetchedEvents::default();
        for log in logs {
            if log.removed {
                warn!(
                    "Skipping removed log at block {:?} index {:?}",
                    log.block_number, log.log_index
                );
                events.removed += 1;
                continue;
            }

            match PredictionRequest::from_log(&log) {
                Ok(request) => events.requests.push(request),
                Err(e) => {
                    warn!(
                        "Dropping undecodable log in tx {:?} at block {:?}: {}",
                        log.transaction_hash, log.block_number, e
                    );
                    events.undecodable += 1;
                }
            }
        }

        Ok(events)
    }
}
