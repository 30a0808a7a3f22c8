use crate::{keccak256, CryptoError, Result};
use oracle_types::{strip_hex_prefix, Address, H256};
use secp256k1::{
    ecdsa::{RecoverableSignature, RecoveryId},
    Message, PublicKey, Secp256k1, SecretKey,
};
use std::fmt;

/// ECDSA signature with recovery ID
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub r: H256,
    pub s: H256,
    /// Recovery id (0 or 1).
    pub recovery_id: u8,
}

/// Largest chain ID whose EIP-155 `v` still fits in a `u64`.
pub const MAX_CHAIN_ID: u64 = (u64::MAX - 36) / 2;

/// `chain_id * 2 + 35`, or `None` on overflow.
pub fn eip155_v_base(chain_id: u64) -> Option<u64> {
    chain_id.checked_mul(2)?.checked_add(35)
}

impl Signature {
    /// `v` for an EIP-155 replay-protected legacy transaction.
    pub fn eip155_v(&self, chain_id: u64) -> Option<u64> {
        eip155_v_base(chain_id)?.checked_add(u64::from(self.recovery_id))
    }
}

/// Sign a 32-byte digest
pub fn sign_hash(digest: &H256, secret: &SecretKey) -> Result<Signature> {
    let secp = Secp256k1::signing_only();
    let message = Message::from_slice(digest.as_bytes())?;
    let (recovery_id, compact) = secp
        .sign_ecdsa_recoverable(&message, secret)
        .serialize_compact();

    Ok(Signature {
        r: H256::from_slice(&compact[..32]),
        s: H256::from_slice(&compact[32..]),
        recovery_id: recovery_id.to_i32() as u8,
    })
}

/// Recover the signer address of a digest
pub fn recover_address(digest: &H256, signature: &Signature) -> Result<Address> {
    let secp = Secp256k1::verification_only();
    let message = Message::from_slice(digest.as_bytes())?;
    let recovery_id = RecoveryId::from_i32(signature.recovery_id as i32)
        .map_err(|_| CryptoError::InvalidSignature)?;

    let mut compact = [0u8; 64];
    compact[..32].copy_from_slice(signature.r.as_bytes());
    compact[32..].copy_from_slice(signature.s.as_bytes());

    let recoverable = RecoverableSignature::from_compact(&compact, recovery_id)?;
    let public_key = secp.recover_ecdsa(&message, &recoverable)?;
    Ok(public_key_to_address(&public_key))
}

/// Convert a public key to an Ethereum address
pub fn public_key_to_address(public_key: &PublicKey) -> Address {
    let uncompressed = public_key.serialize_uncompressed();
    // Skip the 0x04 tag, keep the last 20 bytes of the hash
    let hash = keccak256(&uncompressed[1..]);
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&hash.as_bytes()[12..]);
    Address::from_bytes(bytes)
}

/// The oracle's signing credential. The secret never appears in `Debug`.
#[derive(Clone)]
pub struct Signer {
    secret: SecretKey,
    address: Address,
}

impl Signer {
    pub fn new(secret: SecretKey) -> Self {
        let secp = Secp256k1::signing_only();
        let public_key = PublicKey::from_secret_key(&secp, &secret);
        Self {
            secret,
            address: public_key_to_address(&public_key),
        }
    }

    /// Parse a hex private key, with or without `0x`.
    pub fn from_hex(key: &str) -> Result<Self> {
        let bytes = hex::decode(strip_hex_prefix(key.trim()))
            .map_err(|e| CryptoError::InvalidPrivateKey(e.to_string()))?;
        let secret = SecretKey::from_slice(&bytes)
            .map_err(|e| CryptoError::InvalidPrivateKey(e.to_string()))?;
        Ok(Self::new(secret))
    }

    pub fn random() -> Self {
        Self::new(SecretKey::new(&mut rand::thread_rng()))
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn sign_hash(&self, digest: &H256) -> Result<Signature> {
        sign_hash(digest, &self.secret)
    }
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}
