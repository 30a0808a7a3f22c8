use crate::{CallRequest, Log, LogFilter, Receipt, Result};
use async_trait::async_trait;
use oracle_types::{Address, Bytes, H256, U256};
use std::sync::Arc;

/// Read/write access to the ledger the oracle contract lives on.
///
/// The bridge only talks to the chain through this trait, so tests can
/// substitute an in-memory ledger.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn block_number(&self) -> Result<u64>;

    async fn chain_id(&self) -> Result<u64>;

    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<Log>>;

    async fn estimate_gas(&self, call: &CallRequest) -> Result<U256>;

    /// Nonce of `address` including pending transactions.
    async fn transaction_count(&self, address: Address) -> Result<U256>;

    async fn gas_price(&self) -> Result<U256>;

    async fn balance(&self, address: Address) -> Result<U256>;

    async fn send_raw_transaction(&self, raw: &Bytes) -> Result<H256>;

    /// `None` while the transaction is not yet mined.
    async fn transaction_receipt(&self, hash: H256) -> Result<Option<Receipt>>;
}

#[async_trait]
impl<T: LedgerClient + ?Sized> LedgerClient for Arc<T> {
    async fn block_number(&self) -> Result<u64> {
        (**self).block_number().await
    }

    async fn chain_id(&self) -> Result<u64> {
        (**self).chain_id().await
    }

    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<Log>> {
        (**self).get_logs(filter).await
    }

    async fn estimate_gas(&self, call: &CallRequest) -> Result<U256> {
        (**self).estimate_gas(call).await
    }

    async fn transaction_count(&self, address: Address) -> Result<U256> {
        (**self).transaction_count(address).await
    }

    async fn gas_price(&self) -> Result<U256> {
        (**self).gas_price().await
    }

    async fn balance(&self, address: Address) -> Result<U256> {
        (**self).balance(address).await
    }

    async fn send_raw_transaction(&self, raw: &Bytes) -> Result<H256> {
        (**self).send_raw_transaction(raw).await
    }

    async fn transaction_receipt(&self, hash: H256) -> Result<Option<Receipt>> {
        (**self).transaction_receipt(hash).await
    }
}
