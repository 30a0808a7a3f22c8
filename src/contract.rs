//! Bindings for the on-chain oracle contract: event topics, the
//! fulfillment call, and log decoding.

use oracle_core::abi::{self, AbiError, ParamType, Token};
use oracle_crypto::{keccak256, selector};
use oracle_rpc::{Log, Receipt};
use oracle_types::{Address, Bytes, UintExt, H256, U256};
use thiserror::Error;

pub const PREDICTION_REQUESTED: &str = "PredictionRequested(bytes32,address,bytes)";
pub const PREDICTION_FULFILLED: &str = "PredictionFulfilled(bytes32,uint256)";
pub const FULFILL_PREDICTION: &str = "fulfillPrediction(bytes32,int256,uint256)";

pub fn prediction_requested_topic() -> H256 {
    keccak256(PREDICTION_REQUESTED.as_bytes())
}

pub fn prediction_fulfilled_topic() -> H256 {
    keccak256(PREDICTION_FULFILLED.as_bytes())
}

pub fn fulfill_selector() -> [u8; 4] {
    selector(FULFILL_PREDICTION)
}

#[derive(Debug, Error)]
pub enum LogDecodeError {
    #[error("Unexpected event signature {0:x}")]
    WrongSignature(H256),

    #[error("Expected {expected} topics, got {actual}")]
    MissingTopics { expected: usize, actual: usize },

    #[error("Log has no block number or log index")]
    Pending,

    #[error("ABI error: {0}")]
    Abi(#[from] AbiError),
}

/// A decoded `PredictionRequested` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictionRequest {
    pub request_id: H256,
    pub requester: Address,
    pub input_payload: Bytes,
    pub observed_block: u64,
    pub log_index: u64,
    pub transaction_hash: Option<H256>,
}

impl PredictionRequest {
    pub fn from_log(log: &Log) -> Result<Self, LogDecodeError> {
        let topic0 = log.topics.first().copied().unwrap_or_default();
        if topic0 != prediction_requested_topic() {
            return Err(LogDecodeError::WrongSignature(topic0));
        }
        if log.topics.len() < 3 {
            return Err(LogDecodeError::MissingTopics {
                expected: 3,
                actual: log.topics.len(),
            });
        }

        let (observed_block, log_index) = match (log.block_number, log.log_index) {
            (Some(block), Some(index)) => (block, index),
            _ => return Err(LogDecodeError::Pending),
        };
        let observed_block = observed_block.try_to_u64().map_err(|_| LogDecodeError::Pending)?;
        let log_index = log_index.try_to_u64().map_err(|_| LogDecodeError::Pending)?;

        let requester = match abi::decode_topic(ParamType::Address, &log.topics[2])? {
            Token::Address(address) => address,
            _ => Address::zero(),
        };
        let input_payload = abi::decode(&[ParamType::Bytes], &log.data)?
            .into_iter()
            .next()
            .and_then(Token::into_bytes)
            .unwrap_or_default();

        Ok(Self {
            request_id: log.topics[1],
            requester,
            input_payload,
            observed_block,
            log_index,
            transaction_hash: log.transaction_hash,
        })
    }
}

/// Calldata for `fulfillPrediction(requestId, scaledPrediction, confidence)`.
pub fn fulfill_calldata(request_id: H256, scaled_prediction: i64, confidence: u8) -> Bytes {
    abi::encode_call(
        fulfill_selector(),
        &[
            Token::FixedBytes32(request_id),
            Token::Int(scaled_prediction),
            Token::Uint(U256::from(confidence)),
        ],
    )
}

/// Result value of a `PredictionFulfilled` event for `request_id` emitted
/// by `contract` in this receipt, if any.
pub fn find_fulfillment(receipt: &Receipt, contract: Address, request_id: H256) -> Option<U256> {
    let topic = prediction_fulfilled_topic();
    receipt
        .logs
        .iter()
        .filter(|log| log.address == contract)
        .filter(|log| log.topics.first() == Some(&topic))
        .filter(|log| log.topics.get(1) == Some(&request_id))
        .find_map(|log| {
            abi::decode(&[ParamType::Uint], &log.data)
                .ok()?
                .into_iter()
                .next()?
                .into_uint()
        })
}
