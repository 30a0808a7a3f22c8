use crate::{strip_hex_prefix, Result, TypesError, H160, H256};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use std::fmt;
use std::str::FromStr;

/// 20-byte account or contract address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(H160);

impl Address {
    pub const ZERO: Address = Address(H160::zero());

    pub fn zero() -> Self {
        Self::ZERO
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        if slice.len() != 20 {
            return Err(TypesError::InvalidLength {
                expected: 20,
                actual: slice.len(),
            });
        }
        Ok(Address(H160::from_slice(slice)))
    }

    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Address(H160::from(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn to_bytes(&self) -> [u8; 20] {
        self.0.to_fixed_bytes()
    }

    /// Left-pad the address into a 32-byte word, as it appears in
    /// indexed event topics and ABI-encoded arguments.
    pub fn to_word(&self) -> H256 {
        let mut word = [0u8; 32];
        word[12..].copy_from_slice(self.as_bytes());
        H256::from(word)
    }

    /// Take the low 20 bytes of a 32-byte word.
    pub fn from_word(word: &H256) -> Self {
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&word.as_bytes()[12..]);
        Address::from_bytes(bytes)
    }

    /// EIP-55 mixed-case checksum encoding.
    pub fn checksum(&self) -> String {
        let lower = hex::encode(self.0.as_bytes());
        let hash = Keccak256::digest(lower.as_bytes());

        let mut out = String::with_capacity(42);
        out.push_str("0x");
        for (i, ch) in lower.chars().enumerate() {
            let nibble = if i % 2 == 0 {
                hash[i / 2] >> 4
            } else {
                hash[i / 2] & 0x0f
            };
            if ch.is_ascii_alphabetic() && nibble >= 8 {
                out.push(ch.to_ascii_uppercase());
            } else {
                out.push(ch);
            }
        }
        out
    }
}

impl FromStr for Address {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self> {
        let digits = strip_hex_prefix(s);
        if digits.len() != 40 {
            return Err(TypesError::InvalidLength {
                expected: 40,
                actual: digits.len(),
            });
        }

        let bytes = hex::decode(digits).map_err(|_| TypesError::InvalidHex(s.to_string()))?;
        let addr = Address::from_slice(&bytes)?;

        // All-lowercase and all-uppercase inputs carry no checksum
        let mixed = digits.chars().any(|c| c.is_ascii_uppercase())
            && digits.chars().any(|c| c.is_ascii_lowercase());
        if mixed && addr.checksum()[2..] != *digits {
            return Err(TypesError::InvalidChecksum);
        }

        Ok(addr)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.checksum())
    }
}

impl fmt::LowerHex for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0.as_bytes()))
    }
}

impl From<H160> for Address {
    fn from(hash: H160) -> Self {
        Address(hash)
    }
}

impl From<[u8; 20]> for Address {
    fn from(bytes: [u8; 20]) -> Self {
        Address::from_bytes(bytes)
    }
}
