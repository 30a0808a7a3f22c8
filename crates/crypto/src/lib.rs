use oracle_types::H256;
use sha3::{Digest, Keccak256};
use thiserror::Error;

pub mod signer;
pub use signer::*;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("Secp256k1 error: {0}")]
    Secp256k1(#[from] secp256k1::Error),
}

pub type Result<T> = std::result::Result<T, CryptoError>;

/// Compute the Keccak-256 hash of the input data
pub fn keccak256(data: &[u8]) -> H256 {
    H256::from_slice(&Keccak256::digest(data))
}

/// First four bytes of the Keccak-256 hash of a canonical function signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    let mut out = [0u8; 4];
    out.copy_from_slice(&hash.as_bytes()[..4]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keccak256_empty() {
        let hash = keccak256(b"");
        let expected = "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470";
        assert_eq!(format!("{:x}", hash), expected);
    }

    #[test]
    fn test_selector() {
        // ERC-20 transfer
        assert_eq!(selector("transfer(address,uint256)"), [0xa9, 0x05, 0x9c, 0xbb]);
    }
}
