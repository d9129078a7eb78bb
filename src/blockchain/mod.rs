// Blockchain module
//
// This module contains the core ledger implementation including:
// - Block structure and proof of work
// - Blockchain structure (balances, mining, validation, difficulty)
// - Transaction structure
// - Address type and hashing utilities
// - Balance replay
// - JSON snapshot import/export

pub mod account;
pub mod block;
pub mod chain;
pub mod crypto;
pub mod storage;
pub mod transaction;

// Re-export main components for easier access
pub use block::Block;
pub use chain::{
    Blockchain, BlockchainError, HistoryEntry, IntegrityError, MiningStats, ValidationReport,
};
pub use crypto::Address;
pub use storage::{ChainSnapshot, StorageError};
pub use transaction::{Transaction, TransactionError};
