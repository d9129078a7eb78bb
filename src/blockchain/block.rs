use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use std::time::{Duration, Instant};

use super::crypto::{hash_canonical, meets_difficulty};
use super::transaction::Transaction;

/// Previous hash carried by the genesis block
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// Represents a block in the blockchain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Index of the block in the chain
    pub index: u64,

    /// Timestamp when the block was created
    pub timestamp: DateTime<Utc>,

    /// List of transactions included in this block
    pub transactions: Vec<Transaction>,

    /// Hash of the previous block
    pub previous_hash: String,

    /// Hash of the current block (calculated)
    pub hash: String,

    /// Proof of work counter
    pub nonce: u64,

    /// Number of leading zero hex characters the hash must carry
    pub difficulty: u32,
}

/// The hashed part of a block, in its fixed field order
#[derive(Serialize)]
struct BlockContents<'a> {
    index: u64,
    timestamp: &'a DateTime<Utc>,
    transactions: &'a [Transaction],
    previous_hash: &'a str,
    nonce: u64,
    difficulty: u32,
}

impl Block {
    /// Creates a new unmined block
    ///
    /// # Arguments
    ///
    /// * `index` - The index of the block in the chain
    /// * `timestamp` - The creation time of the block
    /// * `transactions` - The list of transactions to include in the block
    /// * `previous_hash` - The hash of the previous block
    /// * `difficulty` - The proof of work difficulty
    ///
    /// # Returns
    ///
    /// A new Block instance with a zero nonce and its provisional hash
    pub fn new(
        index: u64,
        timestamp: DateTime<Utc>,
        transactions: Vec<Transaction>,
        previous_hash: String,
        difficulty: u32,
    ) -> Self {
        let mut block = Block {
            index,
            timestamp,
            transactions,
            previous_hash,
            hash: String::new(),
            nonce: 0,
            difficulty,
        };

        block.hash = block.calculate_hash();
        block
    }

    /// Creates the unmined genesis block
    pub fn genesis(difficulty: u32) -> Self {
        let timestamp = Utc::now();

        Block::new(
            0,
            timestamp,
            vec![Transaction::genesis(timestamp)],
            GENESIS_PREVIOUS_HASH.to_string(),
            difficulty,
        )
    }

    /// Calculates the hash of the block
    ///
    /// Only index, timestamp, transactions, previous hash, nonce and
    /// difficulty contribute; the stored hash does not.
    ///
    /// # Returns
    ///
    /// The SHA-256 hash of the block as a hexadecimal string
    pub fn calculate_hash(&self) -> String {
        hash_canonical(&BlockContents {
            index: self.index,
            timestamp: &self.timestamp,
            transactions: &self.transactions,
            previous_hash: &self.previous_hash,
            nonce: self.nonce,
            difficulty: self.difficulty,
        })
    }

    /// Searches for a nonce that satisfies the block's difficulty
    ///
    /// # Returns
    ///
    /// The wall-clock time spent searching
    pub fn mine(&mut self) -> Duration {
        let start = Instant::now();

        while !self.meets_target() {
            self.nonce += 1;
            self.hash = self.calculate_hash();
        }

        let elapsed = start.elapsed();
        debug!(
            "Mined block {} at difficulty {} with nonce {} in {:.3}s",
            self.index,
            self.difficulty,
            self.nonce,
            elapsed.as_secs_f64()
        );

        elapsed
    }

    /// Checks if the stored hash satisfies the block's difficulty
    pub fn meets_target(&self) -> bool {
        meets_difficulty(&self.hash, self.difficulty)
    }

    /// Gets the number of transactions in the block
    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }

    /// Gets the sum of all transaction amounts in the block
    pub fn total_amount(&self) -> f64 {
        self.transactions.iter().map(|tx| tx.amount).sum()
    }
}
