pub mod address;
pub mod bytes;
pub mod hash;
pub mod uint;

pub use address::Address;
pub use bytes::Bytes;
pub use hash::{H160, H256};
pub use uint::{UintExt, U256};

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypesError {
    #[error("Invalid hex string: {0}")]
    InvalidHex(String),

    #[error("Invalid length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Invalid address checksum")]
    InvalidChecksum,

    #[error("Quantity does not fit in {0} bits")]
    Overflow(u32),
}

pub type Result<T> = std::result::Result<T, TypesError>;

/// Strip an optional `0x`/`0X` prefix from a hex string.
pub fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}
