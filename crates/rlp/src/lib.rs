//! Recursive Length Prefix encoding.
//!
//! Only the encoding direction is needed: transactions are built and
//! signed locally, while everything read back from the ledger arrives as
//! JSON-RPC.

pub mod encode;
pub mod traits;

pub use encode::Encoder;
pub use traits::Encode;

/// Encode a single value.
pub fn encode<T: Encode + ?Sized>(value: &T) -> Vec<u8> {
    let mut encoder = Encoder::new();
    value.encode(&mut encoder);
    encoder.finish()
}

/// Encode a list whose items have already been RLP-encoded.
pub fn encode_list(items: &[Vec<u8>]) -> Vec<u8> {
    let mut encoder = Encoder::new();
    encoder.append_list(items);
    encoder.finish()
}
