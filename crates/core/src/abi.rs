//! Solidity ABI codec for the handful of static types and dynamic `bytes`
//! that the oracle contracts use.

use oracle_types::{Address, Bytes, UintExt, H256, U256};
use thiserror::Error;

const WORD: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AbiError {
    #[error("Data too short: need {needed} bytes at offset {offset}, have {available}")]
    OutOfBounds { offset: usize, needed: usize, available: usize },

    #[error("Invalid offset {0}")]
    InvalidOffset(U256),

    #[error("Value does not fit in int64")]
    IntOverflow,

    #[error("Non-zero padding in {0} word")]
    DirtyPadding(&'static str),
}

pub type Result<T> = std::result::Result<T, AbiError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Address,
    Uint,
    Int,
    FixedBytes32,
    Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Address(Address),
    Uint(U256),
    /// `int256`, limited to the i64 range on the Rust side.
    Int(i64),
    FixedBytes32(H256),
    Bytes(Bytes),
}

impl Token {
    pub fn into_uint(self) -> Option<U256> {
        match self {
            Token::Uint(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_bytes(self) -> Option<Bytes> {
        match self {
            Token::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }
}

/// Encode a tuple of tokens (head/tail layout).
pub fn encode(tokens: &[Token]) -> Vec<u8> {
    let head_len = tokens.len() * WORD;
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();

    for token in tokens {
        match token {
            Token::Bytes(bytes) => {
                let offset = U256::from(head_len + tail.len());
                head.extend_from_slice(&offset.to_be_word());
                tail.extend_from_slice(&U256::from(bytes.len()).to_be_word());
                tail.extend_from_slice(bytes);
                let padding = (WORD - bytes.len() % WORD) % WORD;
                tail.extend(std::iter::repeat(0u8).take(padding));
            }
            Token::Address(addr) => head.extend_from_slice(addr.to_word().as_bytes()),
            Token::Uint(value) => head.extend_from_slice(&value.to_be_word()),
            Token::Int(value) => head.extend_from_slice(&int_word(*value)),
            Token::FixedBytes32(hash) => head.extend_from_slice(hash.as_bytes()),
        }
    }

    head.extend_from_slice(&tail);
    head
}

/// Two's complement sign extension of an i64 into a 256-bit word.
fn int_word(value: i64) -> [u8; WORD] {
    let mut word = if value < 0 { [0xff; WORD] } else { [0u8; WORD] };
    word[WORD - 8..].copy_from_slice(&value.to_be_bytes());
    word
}

/// Calldata: 4-byte selector followed by the encoded arguments.
pub fn encode_call(selector: [u8; 4], tokens: &[Token]) -> Bytes {
    let mut data = selector.to_vec();
    data.extend_from_slice(&encode(tokens));
    Bytes::from_vec(data)
}

/// Decode a tuple of the given types.
pub fn decode(types: &[ParamType], data: &[u8]) -> Result<Vec<Token>> {
    types
        .iter()
        .enumerate()
        .map(|(i, kind)| {
            let word = read_word(data, i * WORD)?;
            decode_param(*kind, word, data)
        })
        .collect()
}

/// Decode a single indexed topic.
pub fn decode_topic(kind: ParamType, topic: &H256) -> Result<Token> {
    decode_param(kind, topic.as_bytes(), &[])
}

fn decode_param(kind: ParamType, word: &[u8], data: &[u8]) -> Result<Token> {
    match kind {
        ParamType::Address => {
            if word[..12].iter().any(|&b| b != 0) {
                return Err(AbiError::DirtyPadding("address"));
            }
            Ok(Token::Address(Address::from_word(&H256::from_slice(word))))
        }
        ParamType::Uint => Ok(Token::Uint(U256::from_big_endian(word))),
        ParamType::Int => {
            let fill = if word[WORD - 8] & 0x80 != 0 { 0xff } else { 0x00 };
            if word[..WORD - 8].iter().any(|&b| b != fill) {
                return Err(AbiError::IntOverflow);
            }
            let mut low = [0u8; 8];
            low.copy_from_slice(&word[WORD - 8..]);
            Ok(Token::Int(i64::from_be_bytes(low)))
        }
        ParamType::FixedBytes32 => Ok(Token::FixedBytes32(H256::from_slice(word))),
        ParamType::Bytes => {
            let offset = to_usize(word)?;
            let len = to_usize(read_word(data, offset)?)?;
            let start = offset + WORD;
            let body = read_slice(data, start, len)?;
            Ok(Token::Bytes(Bytes::from_slice(body)))
        }
    }
}

fn to_usize(word: &[u8]) -> Result<usize> {
    let value = U256::from_big_endian(word);
    if value > U256::from(u32::MAX) {
        return Err(AbiError::InvalidOffset(value));
    }
    Ok(value.low_u64() as usize)
}

fn read_word(data: &[u8], offset: usize) -> Result<&[u8]> {
    read_slice(data, offset, WORD)
}

fn read_slice(data: &[u8], offset: usize, len: usize) -> Result<&[u8]> {
    offset
        .checked_add(len)
        .filter(|end| *end <= data.len())
        .map(|end| &data[offset..end])
        .ok_or(AbiError::OutOfBounds {
            offset,
            needed: len,
            available: data.len(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_layout() {
        let id = H256::from([0x11; 32]);
        let encoded = encode(&[Token::FixedBytes32(id), Token::Int(-1), Token::Uint(U256::from(87))]);
        assert_eq!(encoded.len(), 96);
        assert_eq!(&encoded[..32], id.as_bytes());
        assert!(encoded[32..64].iter().all(|&b| b == 0xff));
        assert_eq!(encoded[95], 87);
    }

    #[test]
    fn test_bytes_layout() {
        let payload = Bytes::from("[50.0, 750.0, 3.0]");
        let encoded = encode(&[Token::Bytes(payload.clone())]);
        // offset, length, one padded word of data
        assert_eq!(encoded.len(), 96);
        assert_eq!(encoded[31], 0x20);
        assert_eq!(encoded[63], payload.len() as u8);

        let decoded = decode(&[ParamType::Bytes], &encoded).unwrap();
        assert_eq!(decoded, vec![Token::Bytes(payload)]);
    }

    #[test]
    fn test_mixed_decode() {
        let tokens = vec![
            Token::Address(Address::from_bytes([0x22; 20])),
            Token::Bytes(Bytes::from_vec(vec![1, 2, 3])),
            Token::Int(-1500),
        ];
        let encoded = encode(&tokens);
        let decoded = decode(&[ParamType::Address, ParamType::Bytes, ParamType::Int], &encoded).unwrap();
        assert_eq!(decoded, tokens);
    }

    #[test]
    fn test_truncated_data_rejected() {
        let encoded = encode(&[Token::Bytes(Bytes::from_vec(vec![7; 40]))]);
        let truncated = &encoded[..encoded.len() - 40];
        assert!(matches!(
            decode(&[ParamType::Bytes], truncated),
            Err(AbiError::OutOfBounds { .. })
        ));
        assert!(decode(&[ParamType::Uint], &[0u8; 10]).is_err());
    }

    #[test]
    fn test_huge_offset_rejected() {
        let mut data = vec![0xff; 32];
        data.extend_from_slice(&[0u8; 32]);
        assert!(matches!(
            decode(&[ParamType::Bytes], &data),
            Err(AbiError::InvalidOffset(_))
        ));
    }

    #[test]
    fn test_int_out_of_range() {
        let mut word = [0u8; 32];
        word[0] = 1;
        assert_eq!(decode(&[ParamType::Int], &word), Err(AbiError::IntOverflow));
    }

    #[test]
    fn test_call_selector_prefix() {
        let data = encode_call([0xde, 0xad, 0xbe, 0xef], &[Token::Uint(U256::one())]);
        assert_eq!(&data[..4], &[0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(data.len(), 36);
    }
}
