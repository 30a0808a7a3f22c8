use crate::{
    CallRequest, LedgerClient, Log, LogFilter, Receipt, Result, RpcError, RpcRequest, RpcResponse,
};
use async_trait::async_trait;
use oracle_types::{Address, Bytes, UintExt, H256, U256};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, trace};

/// JSON-RPC over HTTP ledger client.
pub struct HttpClient {
    client: Client,
    url: String,
    next_id: AtomicU64,
}

impl HttpClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn request<R: DeserializeOwned>(&self, method: &str, params: Value) -> Result<R> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = RpcRequest::new(id, method, params);
        trace!("-> {} #{}", method, id);

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!("{} failed with HTTP {}", method, status);
            return Err(RpcError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: RpcResponse = response.json().await.map_err(transport_error)?;
        if let Some(error) = envelope.error {
            debug!("{} returned error {}: {}", method, error.code, error.message);
            return Err(RpcError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        let result = envelope.result.unwrap_or(Value::Null);
        serde_json::from_value(result)
            .map_err(|e| RpcError::InvalidResponse(format!("{}: {}", method, e)))
    }

    async fn quantity(&self, method: &str, params: Value) -> Result<U256> {
        self.request(method, params).await
    }

    async fn small_quantity(&self, method: &str) -> Result<u64> {
        self.quantity(method, json!([]))
            .await?
            .try_to_u64()
            .map_err(|e| RpcError::InvalidResponse(format!("{}: {}", method, e)))
    }
}

fn transport_error(error: reqwest::Error) -> RpcError {
    if error.is_timeout() {
        RpcError::Timeout
    } else if error.is_decode() {
        RpcError::InvalidResponse(error.to_string())
    } else {
        RpcError::Transport(error.to_string())
    }
}

#[async_trait]
impl LedgerClient for HttpClient {
    async fn block_number(&self) -> Result<u64> {
        self.small_quantity("eth_blockNumber").await
    }

    async fn chain_id(&self) -> Result<u64> {
        self.small_quantity("eth_chainId").await
    }

    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<Log>> {
        self.request("eth_getLogs", json!([filter])).await
    }

    async fn estimate_gas(&self, call: &CallRequest) -> Result<U256> {
        self.quantity("eth_estimateGas", json!([call])).await
    }

    async fn transaction_count(&self, address: Address) -> Result<U256> {
        self.quantity("eth_getTransactionCount", json!([address, "pending"]))
            .await
    }

    async fn gas_price(&self) -> Result<U256> {
        self.quantity("eth_gasPrice", json!([])).await
    }

    async fn balance(&self, address: Address) -> Result<U256> {
        self.quantity("eth_getBalance", json!([address, "latest"]))
            .await
    }

    async fn send_raw_transaction(&self, raw: &Bytes) -> Result<H256> {
        self.request("eth_sendRawTransaction", json!([raw])).await
    }

    async fn transaction_receipt(&self, hash: H256) -> Result<Option<Receipt>> {
        self.request("eth_getTransactionReceipt", json!([hash])).await
    }
}
