use oracle_types::{Address, Bytes, UintExt, H256, U256};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub method: String,
    pub params: Value,
    pub id: u64,
}

impl RpcRequest {
    pub fn new(id: u64, method: &str, params: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
            id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcErrorResponse>,
    #[serde(default)]
    pub id: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcErrorResponse {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Event log as returned by `eth_getLogs` and inside receipts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Log {
    pub address: Address,
    pub topics: Vec<H256>,
    pub data: Bytes,
    #[serde(default)]
    pub block_number: Option<U256>,
    #[serde(default)]
    pub transaction_hash: Option<H256>,
    #[serde(default)]
    pub log_index: Option<U256>,
    #[serde(default)]
    pub removed: bool,
}

impl Log {
    /// (block, log index) ordering key; pending logs sort last.
    pub fn position(&self) -> (u64, u64) {
        let narrow = |q: &Option<U256>| q.and_then(|v| v.try_to_u64().ok()).unwrap_or(u64::MAX);
        (narrow(&self.block_number), narrow(&self.log_index))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub transaction_hash: H256,
    #[serde(default)]
    pub block_number: Option<U256>,
    pub gas_used: U256,
    /// Absent on pre-Byzantium chains.
    #[serde(default)]
    pub status: Option<U256>,
    #[serde(default)]
    pub logs: Vec<Log>,
}

impl Receipt {
    /// Execution status; `None` when the receipt carries no status field.
    pub fn succeeded(&self) -> Option<bool> {
        self.status.map(|status| status == U256::one())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Bytes>,
}

/// `eth_getLogs` filter with inclusive block bounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogFilter {
    pub from_block: U256,
    pub to_block: U256,
    pub address: Address,
    /// Positional topic filters; `None` matches anything.
    pub topics: Vec<Option<H256>>,
}

impl LogFilter {
    pub fn new(address: Address, topic0: H256, from_block: u64, to_block: u64) -> Self {
        Self {
            from_block: U256::from(from_block),
            to_block: U256::from(to_block),
            address,
            topics: vec![Some(topic0)],
        }
    }
}
