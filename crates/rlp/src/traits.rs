use crate::Encoder;
use oracle_types::{Address, Bytes, UintExt, H256, U256};

pub trait Encode {
    fn encode(&self, encoder: &mut Encoder);
}

impl Encode for u64 {
    fn encode(&self, encoder: &mut Encoder) {
        encoder.append_u64(*self);
    }
}

impl Encode for [u8] {
    fn encode(&self, encoder: &mut Encoder) {
        encoder.append_bytes(self);
    }
}

impl Encode for str {
    fn encode(&self, encoder: &mut Encoder) {
        encoder.append_bytes(self.as_bytes());
    }
}

impl Encode for Bytes {
    fn encode(&self, encoder: &mut Encoder) {
        encoder.append_bytes(self.as_slice());
    }
}

impl Encode for U256 {
    fn encode(&self, encoder: &mut Encoder) {
        encoder.append_bytes(&self.to_be_bytes_trimmed());
    }
}

impl Encode for H256 {
    fn encode(&self, encoder: &mut Encoder) {
        encoder.append_bytes(self.as_bytes());
    }
}

impl Encode for Address {
    fn encode(&self, encoder: &mut Encoder) {
        encoder.append_bytes(self.as_bytes());
    }
}

/// `None` encodes as the empty string (contract creation `to`).
impl<T: Encode> Encode for Option<T> {
    fn encode(&self, encoder: &mut Encoder) {
        match self {
            Some(value) => value.encode(encoder),
            None => encoder.append_bytes(&[]),
        }
    }
}
