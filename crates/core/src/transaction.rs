use oracle_crypto::{eip155_v_base, keccak256, recover_address, Signature, Signer, MAX_CHAIN_ID};
use oracle_types::{Address, Bytes, UintExt, H256, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Invalid chain ID: {0}")]
    InvalidChainId(u64),
    #[error("Crypto error: {0}")]
    Crypto(#[from] oracle_crypto::CryptoError),
}

pub type Result<T> = std::result::Result<T, TransactionError>;

/// Pre-EIP-2718 transaction, signed with EIP-155 replay protection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyTransaction {
    pub nonce: U256,
    pub gas_price: U256,
    pub gas_limit: U256,
    pub to: Option<Address>,
    pub value: U256,
    pub data: Bytes,
}

impl LegacyTransaction {
    fn payload_items(&self) -> Vec<Vec<u8>> {
        vec![
            oracle_rlp::encode(&self.nonce),
            oracle_rlp::encode(&self.gas_price),
            oracle_rlp::encode(&self.gas_limit),
            oracle_rlp::encode(&self.to),
            oracle_rlp::encode(&self.value),
            oracle_rlp::encode(&self.data),
        ]
    }

    /// RLP of `[nonce, gasPrice, gas, to, value, data, chainId, 0, 0]`.
    pub fn signing_payload(&self, chain_id: u64) -> Vec<u8> {
        let mut items = self.payload_items();
        items.push(oracle_rlp::encode(&chain_id));
        items.push(oracle_rlp::encode(&0u64));
        items.push(oracle_rlp::encode(&0u64));
        oracle_rlp::encode_list(&items)
    }

    pub fn signing_hash(&self, chain_id: u64) -> H256 {
        keccak256(&self.signing_payload(chain_id))
    }

    /// Sign for `chain_id`, producing the raw bytes ready for broadcast.
    pub fn sign(self, signer: &Signer, chain_id: u64) -> Result<SignedTransaction> {
        if chain_id == 0 || chain_id > MAX_CHAIN_ID {
            return Err(TransactionError::InvalidChainId(chain_id));
        }

        let signature = signer.sign_hash(&self.signing_hash(chain_id))?;
        let v = signature
            .eip155_v(chain_id)
            .ok_or(TransactionError::InvalidChainId(chain_id))?;
        let r = U256::from_big_endian(signature.r.as_bytes());
        let s = U256::from_big_endian(signature.s.as_bytes());

        let mut items = self.payload_items();
        items.push(oracle_rlp::encode(&v));
        items.push(oracle_rlp::encode(&r));
        items.push(oracle_rlp::encode(&s));
        let raw = oracle_rlp::encode_list(&items);

        Ok(SignedTransaction {
            hash: keccak256(&raw),
            raw: Bytes::from_vec(raw),
            chain_id,
            v,
            r,
            s,
            tx: self,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub tx: LegacyTransaction,
    pub chain_id: u64,
    pub v: u64,
    pub r: U256,
    pub s: U256,
    pub raw: Bytes,
    pub hash: H256,
}

impl SignedTransaction {
    /// Recover the sending address from the signature.
    pub fn sender(&self) -> Result<Address> {
        let recovery_id = eip155_v_base(self.chain_id)
            .and_then(|base| self.v.checked_sub(base))
            .filter(|id| *id <= 1)
            .ok_or(TransactionError::InvalidSignature)? as u8;

        let signature = Signature {
            r: H256::from(self.r.to_be_word()),
            s: H256::from(self.s.to_be_word()),
            recovery_id,
        };
        Ok(recover_address(&self.tx.signing_hash(self.chain_id), &signature)?)
    }
}
