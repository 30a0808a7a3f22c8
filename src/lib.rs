// Core modules
pub mod bridge;
pub mod config;
pub mod contract;
pub mod cursor;
pub mod decoder;
pub mod error;
pub mod fetcher;
pub mod metrics;
pub mod submitter;

// Re-export commonly used types
pub use bridge::{Bridge, BridgeSettings, RequestOutcome, TickOutcome, TickReport};
pub use config::Config;
pub use contract::PredictionRequest;
pub use cursor::{BlockCursor, BlockRange};
pub use decoder::{DecodePath, DecodedInput, InputDecoder};
pub use error::BridgeError;
pub use fetcher::{EventFetcher, FetchError, FetchedEvents};
pub use submitter::{FulfillmentTx, SubmitOutcome, Submitter, SubmitterSettings};

// Re-export crate modules
pub use oracle_core as core;
pub use oracle_crypto as crypto;
pub use oracle_inference as inference;
pub use oracle_rpc as rpc;
pub use oracle_types as types;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
