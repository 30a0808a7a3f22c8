use crate::{Result, TypesError};
use primitive_types::U256 as PrimitiveU256;

pub type U256 = PrimitiveU256;

pub trait UintExt: Sized {
    /// Minimal big-endian bytes; zero encodes as an empty vector.
    fn to_be_bytes_trimmed(&self) -> Vec<u8>;

    /// Full 32-byte big-endian word.
    fn to_be_word(&self) -> [u8; 32];

    /// Narrow to `u64`, failing instead of panicking on overflow.
    fn try_to_u64(&self) -> Result<u64>;
}

impl UintExt for U256 {
    fn to_be_bytes_trimmed(&self) -> Vec<u8> {
        let word = self.to_be_word();
        match word.iter().position(|&b| b != 0) {
            Some(first) => word[first..].to_vec(),
            None => Vec::new(),
        }
    }

    fn to_be_word(&self) -> [u8; 32] {
        let mut word = [0u8; 32];
        self.to_big_endian(&mut word);
        word
    }

    fn try_to_u64(&self) -> Result<u64> {
        if *self > U256::from(u64::MAX) {
            return Err(TypesError::Overflow(64));
        }
        Ok(self.low_u64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trimmed_bytes() {
        assert_eq!(U256::from(0x12345678u64).to_be_bytes_trimmed(), vec![0x12, 0x34, 0x56, 0x78]);
        assert!(U256::zero().to_be_bytes_trimmed().is_empty());
    }

    #[test]
    fn test_u64_narrowing() {
        assert_eq!(U256::from(42u64).try_to_u64().unwrap(), 42);
        assert_eq!((U256::from(u64::MAX) + 1).try_to_u64(), Err(TypesError::Overflow(64)));
    }
}
