#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use oracle_bridge::contract::{
    fulfill_calldata, fulfill_selector, prediction_fulfilled_topic, prediction_requested_topic,
};
use oracle_bridge::core::abi::{self, Token};
use oracle_bridge::crypto::{keccak256, Signer};
use oracle_bridge::inference::{load_model, PredictionCache};
use oracle_bridge::rpc::{
    CallRequest, LedgerClient, Log, LogFilter, Receipt, Result as RpcResult, RpcError,
};
use oracle_bridge::types::{Address, Bytes, UintExt, H256, U256};
use oracle_bridge::{
    BlockCursor, Bridge, BridgeSettings, EventFetcher, InputDecoder, Submitter, SubmitterSettings,
};

pub const CHAIN_ID: u64 = 1337;
pub const ORACLE: [u8; 20] = [0xcc; 20];

pub fn demo_model_path() -> String {
    concat!(env!("CARGO_MANIFEST_DIR"), "/models/demo_model.json").to_string()
}

pub fn oracle() -> Address {
    Address::from_bytes(ORACLE)
}

/// Submission-side calls in the order the ledger saw them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerEvent {
    NonceRead(u64),
    Sent { nonce: u64 },
    ReceiptDelivered,
}

/// Scripted in-memory ledger.
#[derive(Default)]
pub struct MockState {
    pub chain_id: u64,
    pub head: u64,
    pub logs: Vec<Log>,
    pub head_failures: VecDeque<RpcError>,
    pub log_failures: VecDeque<RpcError>,
    pub estimate_failures: VecDeque<RpcError>,
    /// `(from, to)` of every `eth_getLogs` call.
    pub log_queries: Vec<(u64, u64)>,
    pub sent: Vec<Bytes>,
    pub nonce: u64,
    /// Status given to the receipt of the next transactions; `None` omits it.
    pub receipt_status: Option<u64>,
    /// Contract that emits `PredictionFulfilled` in each receipt, if any.
    pub fulfilled_emitter: Option<Address>,
    pub events: Vec<LedgerEvent>,
    /// Receipt polls answered with `None` before the receipt appears.
    pub pending_polls: usize,
    pub receipts: HashMap<H256, Receipt>,
}

pub struct MockLedger {
    pub state: Mutex<MockState>,
}

impl MockLedger {
    pub fn new(head: u64) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(MockState {
                chain_id: CHAIN_ID,
                head,
                receipt_status: Some(1),
                ..Default::default()
            }),
        })
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    pub fn add_log(&self, log: Log) {
        self.with(|s| s.logs.push(log));
    }

    pub fn sent(&self) -> Vec<Bytes> {
        self.with(|s| s.sent.clone())
    }

    pub fn log_queries(&self) -> Vec<(u64, u64)> {
        self.with(|s| s.log_queries.clone())
    }

    pub fn events(&self) -> Vec<LedgerEvent> {
        self.with(|s| s.events.clone())
    }
}

fn quantity(value: &U256) -> u64 {
    value.try_to_u64().unwrap_or(u64::MAX)
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn block_number(&self) -> RpcResult<u64> {
        self.with(|s| match s.head_failures.pop_front() {
            Some(e) => Err(e),
            None => Ok(s.head),
        })
    }

    async fn chain_id(&self) -> RpcResult<u64> {
        Ok(self.with(|s| s.chain_id))
    }

    async fn get_logs(&self, filter: &LogFilter) -> RpcResult<Vec<Log>> {
        self.with(|s| {
            let (from, to) = (quantity(&filter.from_block), quantity(&filter.to_block));
            s.log_queries.push((from, to));
            if let Some(e) = s.log_failures.pop_front() {
                return Err(e);
            }
            let topic0 = filter.topics.first().copied().flatten();
            Ok(s.logs
                .iter()
                .filter(|log| log.address == filter.address)
                .filter(|log| topic0.is_none() || log.topics.first().copied() == topic0)
                .filter(|log| {
                    let block = log.block_number.map(|b| quantity(&b)).unwrap_or(u64::MAX);
                    block >= from && block <= to
                })
                .cloned()
                .collect())
        })
    }

    async fn estimate_gas(&self, _call: &CallRequest) -> RpcResult<U256> {
        self.with(|s| match s.estimate_failures.pop_front() {
            Some(e) => Err(e),
            None => Ok(U256::from(60_000)),
        })
    }

    async fn transaction_count(&self, _address: Address) -> RpcResult<U256> {
        Ok(self.with(|s| {
            s.events.push(LedgerEvent::NonceRead(s.nonce));
            U256::from(s.nonce)
        }))
    }

    async fn gas_price(&self) -> RpcResult<U256> {
        Ok(U256::from(1_000_000_000u64))
    }

    async fn balance(&self, _address: Address) -> RpcResult<U256> {
        Ok(U256::exp10(18))
    }

    async fn send_raw_transaction(&self, raw: &Bytes) -> RpcResult<H256> {
        self.with(|s| {
            let hash = keccak256(raw.as_slice());
            s.events.push(LedgerEvent::Sent { nonce: raw_nonce(raw) });
            s.sent.push(raw.clone());
            s.nonce += 1;

            let logs = match (s.fulfilled_emitter, fulfill_args(raw)) {
                (Some(emitter), Some((id, result))) => vec![fulfilled_log(emitter, id, result, s.head + 1)],
                _ => vec![],
            };
            s.receipts.insert(
                hash,
                Receipt {
                    transaction_hash: hash,
                    block_number: Some(U256::from(s.head + 1)),
                    gas_used: U256::from(48_000),
                    status: s.receipt_status.map(U256::from),
                    logs,
                },
            );
            Ok(hash)
        })
    }

    async fn transaction_receipt(&self, hash: H256) -> RpcResult<Option<Receipt>> {
        self.with(|s| {
            if s.pending_polls > 0 {
                s.pending_polls -= 1;
                return Ok(None);
            }
            let receipt = s.receipts.get(&hash).cloned();
            if receipt.is_some() {
                s.events.push(LedgerEvent::ReceiptDelivered);
            }
            Ok(receipt)
        })
    }
}

pub fn rate_limited() -> RpcError {
    RpcError::Rpc {
        code: -32005,
        message: "limit exceeded".into(),
    }
}

pub fn request_id(n: u8) -> H256 {
    H256::from([n; 32])
}

/// A `PredictionRequested` log from the oracle contract.
pub fn request_log(block: u64, index: u64, id: u8, payload: &[u8]) -> Log {
    Log {
        address: oracle(),
        topics: vec![
            prediction_requested_topic(),
            request_id(id),
            Address::from_bytes([0xaa; 20]).to_word(),
        ],
        data: Bytes::from_vec(abi::encode(&[Token::Bytes(Bytes::from_slice(payload))])),
        block_number: Some(U256::from(block)),
        transaction_hash: Some(H256::from([id; 32])),
        log_index: Some(U256::from(index)),
        removed: false,
    }
}

/// `PredictionFulfilled(requestId, result)` emitted by `emitter`.
pub fn fulfilled_log(emitter: Address, id: H256, result: U256, block: u64) -> Log {
    Log {
        address: emitter,
        topics: vec![prediction_fulfilled_topic(), id],
        data: Bytes::from_vec(abi::encode(&[Token::Uint(result)])),
        block_number: Some(U256::from(block)),
        transaction_hash: None,
        log_index: Some(U256::zero()),
        removed: false,
    }
}

/// Nonce of a signed legacy transaction: the first item of its RLP list.
pub fn raw_nonce(raw: &[u8]) -> u64 {
    let start = match raw[0] {
        0xc0..=0xf7 => 1,
        long => 1 + usize::from(long - 0xf7),
    };
    match raw[start] {
        small @ 0x00..=0x7f => u64::from(small),
        prefix => {
            let len = usize::from(prefix - 0x80);
            raw[start + 1..start + 1 + len]
                .iter()
                .fold(0, |acc, &b| (acc << 8) | u64::from(b))
        }
    }
}

/// Request id and scaled prediction carried by a fulfillment transaction.
pub fn fulfill_args(raw: &[u8]) -> Option<(H256, U256)> {
    let selector = fulfill_selector();
    let at = raw.windows(4).position(|w| w == selector)?;
    let args = raw.get(at + 4..at + 68)?;
    Some((H256::from_slice(&args[..32]), U256::from_big_endian(&args[32..])))
}

pub fn settings() -> BridgeSettings {
    BridgeSettings {
        poll_interval: Duration::from_millis(10),
        error_cooldown: Duration::from_millis(20),
        rate_limit_cooldown: Duration::from_secs(60),
        max_block_range: None,
    }
}

pub fn submitter_settings() -> SubmitterSettings {
    SubmitterSettings {
        chain_id: CHAIN_ID,
        gas_multiplier: 1.2,
        gas_limit_ceiling: 300_000,
        gas_price: None,
        receipt_poll_interval: Duration::from_millis(1),
        receipt_timeout: None,
    }
}

pub fn build_bridge(
    ledger: Arc<MockLedger>,
    cursor: u64,
    allow_raw_fallback: bool,
    settings: BridgeSettings,
    submitter: SubmitterSettings,
) -> Bridge {
    let engine = load_model(demo_model_path()).unwrap();
    let client: Arc<dyn LedgerClient> = ledger;
    Bridge::new(
        client.clone(),
        BlockCursor::new(cursor),
        EventFetcher::new(client.clone(), oracle()),
        InputDecoder::new(allow_raw_fallback),
        PredictionCache::new(engine),
        Submitter::new(client, Signer::random(), oracle(), oracle(), submitter),
        settings,
    )
}

pub fn demo_bridge(ledger: Arc<MockLedger>, cursor: u64) -> Bridge {
    build_bridge(ledger, cursor, true, settings(), submitter_settings())
}

pub fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Whether `raw` carries the fulfillment calldata for these values.
pub fn carries_fulfillment(raw: &Bytes, id: H256, scaled: i64, confidence: u8) -> bool {
    let calldata = fulfill_calldata(id, scaled, confidence);
    raw.windows(calldata.len()).any(|w| w == calldata.as_slice())
}

pub fn contains_id(raw: &Bytes, id: H256) -> bool {
    raw.windows(32).any(|w| w == id.as_bytes())
}
