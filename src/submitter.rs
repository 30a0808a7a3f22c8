use std::sync::Arc;
use std::time::Duration;

use oracle_core::{LegacyTransaction, TransactionError};
use oracle_crypto::Signer;
use oracle_rpc::{CallRequest, LedgerClient, Receipt, RpcError};
use oracle_types::{Address, UintExt, H256, U256};
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::contract::{find_fulfillment, fulfill_calldata};

/// Fixed-point factor applied to predictions before they go on chain.
pub const PREDICTION_SCALE: f64 = 1000.0;

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("Gas estimation failed: {0}")]
    GasEstimate(RpcError),

    #[error("Nonce lookup failed: {0}")]
    Nonce(RpcError),

    #[error("Gas price lookup failed: {0}")]
    GasPrice(RpcError),

    #[error("Signing failed: {0}")]
    Signing(#[from] TransactionError),

    #[error("Broadcast failed: {0}")]
    Broadcast(RpcError),

    #[error("Receipt polling failed for {hash:x}: {source}")]
    Receipt { hash: H256, source: RpcError },

    #[error("No receipt for {0:x} before timeout")]
    ReceiptTimeout(H256),
}

/// Truncate toward zero after scaling; saturates at the i64 bounds.
pub fn scale_prediction(prediction: f64) -> i64 {
    (prediction * PREDICTION_SCALE).trunc() as i64
}

/// Integer percentage in [0, 100].
pub fn confidence_percent(confidence: f64) -> u8 {
    confidence.clamp(0.0, 100.0).trunc() as u8
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FulfillmentTx {
    pub request_id: H256,
    pub scaled_prediction: i64,
    pub confidence: u8,
}

impl FulfillmentTx {
    pub fn new(request_id: H256, prediction: f64, confidence: f64) -> Self {
        Self {
            request_id,
            scaled_prediction: scale_prediction(prediction),
            confidence: confidence_percent(confidence),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Fulfilled {
        tx_hash: H256,
        gas_used: U256,
        /// Value from the contract's `PredictionFulfilled` event, if emitted.
        confirmed_result: Option<U256>,
    },
    Reverted {
        tx_hash: H256,
        gas_used: U256,
    },
    /// Mined, but the receipt has no status field.
    StatusUnknown {
        tx_hash: H256,
        gas_used: U256,
    },
}

#[derive(Debug, Clone)]
pub struct SubmitterSettings {
    pub chain_id: u64,
    pub gas_multiplier: f64,
    pub gas_limit_ceiling: u64,
    /// Fixed gas price; queried from the ledger when unset.
    pub gas_price: Option<U256>,
    pub receipt_poll_interval: Duration,
    pub receipt_timeout: Option<Duration>,
}

impl SubmitterSettings {
    /// `min(ceil(estimate * multiplier), ceiling)`
    pub fn gas_limit(&self, estimate: U256) -> u64 {
        let estimate = match estimate.try_to_u64() {
            Ok(value) => value,
            Err(_) => return self.gas_limit_ceiling,
        };
        let padded = (estimate as f64 * self.gas_multiplier).ceil();
        if padded >= self.gas_limit_ceiling as f64 {
            self.gas_limit_ceiling
        } else {
            padded as u64
        }
    }
}

/// Builds, signs and confirms fulfillment transactions one at a time.
pub struct Submitter {
    ledger: Arc<dyn LedgerClient>,
    signer: Signer,
    oracle: Address,
    request_contract: Address,
    settings: SubmitterSettings,
}

impl Submitter {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        signer: Signer,
        oracle: Address,
        request_contract: Address,
        settings: SubmitterSettings,
    ) -> Self {
        Self {
            ledger,
            signer,
            oracle,
            request_contract,
            settings,
        }
    }

    pub fn account(&self) -> Address {
        self.signer.address()
    }

    /// Send one fulfillment and wait for its receipt. Taking `&mut self`
    /// keeps at most one transaction in flight, so the pending nonce is
    /// always the right one.
    pub async fn submit(&mut self, fulfillment: &FulfillmentTx) -> Result<SubmitOutcome, SubmitError> {
        let data = fulfill_calldata(
            fulfillment.request_id,
            fulfillment.scaled_prediction,
            fulfillment.confidence,
        );
        let from = self.signer.address();

        let call = CallRequest {
            from: Some(from),
            to: Some(self.oracle),
            data: Some(data.clone()),
            ..Default::default()
        };
        let estimate = self
            .ledger
            .estimate_gas(&call)
            .await
            .map_err(SubmitError::GasEstimate)?;
        let gas_limit = self.settings.gas_limit(estimate);

        let gas_price = match self.settings.gas_price {
            Some(price) => price,
            None => self.ledger.gas_price().await.map_err(SubmitError::GasPrice)?,
        };
        let nonce = self
            .ledger
            .transaction_count(from)
            .await
            .map_err(SubmitError::Nonce)?;

        let tx = LegacyTransaction {
            nonce,
            gas_price,
            gas_limit: U256::from(gas_limit),
            to: Some(self.oracle),
            value: U256::zero(),
            data,
        };
        let signed = tx.sign(&self.signer, self.settings.chain_id)?;
        debug!(
            "Signed fulfillment {:x}: nonce {}, gas {} (estimate {}), price {}",
            fulfillment.request_id, nonce, gas_limit, estimate, gas_price
        );

        let tx_hash = self
            .ledger
            .send_raw_transaction(&signed.raw)
            .await
            .map_err(SubmitError::Broadcast)?;
        if tx_hash != signed.hash {
            warn!("Ledger reported hash {:x}, expected {:x}", tx_hash, signed.hash);
        }
        info!("Fulfillment sent for request {:x}: {:x}", fulfillment.request_id, tx_hash);

        let receipt = self.wait_for_receipt(tx_hash).await?;
        Ok(self.classify(fulfillment, receipt))
    }

    async fn wait_for_receipt(&self, hash: H256) -> Result<Receipt, SubmitError> {
        let started = Instant::now();
        loop {
            match self.ledger.transaction_receipt(hash).await {
                Ok(Some(receipt)) => return Ok(receipt),
                Ok(None) => {}
                Err(source) => return Err(SubmitError::Receipt { hash, source }),
            }

            if let Some(timeout) = self.settings.receipt_timeout {
                if started.elapsed() >= timeout {
                    return Err(SubmitError::ReceiptTimeout(hash));
                }
            }
            tokio::time::sleep(self.settings.receipt_poll_interval).await;
        }
    }

    fn classify(&self, fulfillment: &FulfillmentTx, receipt: Receipt) -> SubmitOutcome {
        let tx_hash = receipt.transaction_hash;
        let gas_used = receipt.gas_used;

        match receipt.succeeded() {
            Some(true) => {}
            Some(false) => {
                error!(
                    "Fulfillment {:x} for request {:x} reverted (gas used {})",
                    tx_hash, fulfillment.request_id, gas_used
                );
                return SubmitOutcome::Reverted { tx_hash, gas_used };
            }
            None => {
                warn!(
                    "Fulfillment {:x} for request {:x} mined with status unknown (gas used {})",
                    tx_hash, fulfillment.request_id, gas_used
                );
                return SubmitOutcome::StatusUnknown { tx_hash, gas_used };
            }
        }

        let confirmed_result = find_fulfillment(&receipt, self.request_contract, fulfillment.request_id);
        match confirmed_result {
            Some(result) => info!(
                "Request {:x} fulfilled in {:x}, gas used {}, on-chain result {}",
                fulfillment.request_id, tx_hash, gas_used, result
            ),
            None => info!(
                "Request {:x} fulfilled in {:x}, gas used {}",
                fulfillment.request_id, tx_hash, gas_used
            ),
        }

        SubmitOutcome::Fulfilled {
            tx_hash,
            gas_used,
            confirmed_result,
        }
    }
}
