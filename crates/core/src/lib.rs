pub mod abi;
pub mod transaction;

pub use abi::{AbiError, ParamType, Token};
pub use transaction::{LegacyTransaction, SignedTransaction, TransactionError};
