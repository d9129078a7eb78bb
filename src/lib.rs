//! An educational proof-of-work ledger.
//!
//! Blocks of balance transfers are linked by SHA-256 hashes, mined against a
//! self-adjusting difficulty and exported as a single JSON snapshot.

pub mod blockchain;
pub mod config;

pub use blockchain::{Address, Block, Blockchain, BlockchainError, Transaction};
pub use config::ChainConfig;
