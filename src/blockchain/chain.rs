use chrono::Utc;
use log::{debug, info, warn};
use thiserror::Error;

use std::collections::BTreeMap;

use crate::config::{ChainConfig, MAX_DIFFICULTY, MIN_DIFFICULTY};

use super::account::BalanceSheet;
use super::block::{Block, GENESIS_PREVIOUS_HASH};
use super::crypto::Address;
use super::transaction::{Transaction, TransactionError};

/// Errors that can occur during blockchain operations
#[derive(Debug, Error)]
pub enum BlockchainError {
    #[error("Invalid transaction: {0}")]
    Validation(#[from] TransactionError),

    #[error("Insufficient balance for {address}: available {balance}, requested {requested}")]
    InsufficientBalance {
        address: Address,
        balance: f64,
        requested: f64,
    },

    #[error("No pending transactions to mine")]
    NoPendingTransactions,

    #[error("Invalid chain configuration: {0}")]
    InvalidConfig(String),

    #[error("Block index overflow after block {0}")]
    IndexOverflow(u64),
}

/// A failed integrity check, located by the block's position in the chain
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IntegrityError {
    #[error("hash mismatch at index {index}")]
    HashMismatch { index: usize },

    #[error("broken link at index {index}")]
    BrokenLink { index: usize },

    #[error("insufficient proof of work at index {index}")]
    InsufficientProofOfWork { index: usize },

    #[error("invalid transaction in block {index}: {reason}")]
    InvalidTransaction { index: usize, reason: String },
}

impl IntegrityError {
    /// Gets the position of the offending block
    pub fn index(&self) -> usize {
        match self {
            IntegrityError::HashMismatch { index }
            | IntegrityError::BrokenLink { index }
            | IntegrityError::InsufficientProofOfWork { index }
            | IntegrityError::InvalidTransaction { index, .. } => *index,
        }
    }
}

/// Outcome of a chain validation pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    failures: Vec<IntegrityError>,
}

impl ValidationReport {
    /// Checks if no integrity check failed
    pub fn is_valid(&self) -> bool {
        self.failures.is_empty()
    }

    /// Gets every recorded failure in chain order
    pub fn failures(&self) -> &[IntegrityError] {
        &self.failures
    }

    /// Gets the first recorded failure
    pub fn first_failure(&self) -> Option<&IntegrityError> {
        self.failures.first()
    }

    fn record(&mut self, failure: IntegrityError) {
        warn!("Chain validation failed: {}", failure);
        self.failures.push(failure);
    }
}

/// A transaction touching an address, with the block that holds it
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    /// Index of the mined block, `None` while pending
    pub block: Option<u64>,

    pub transaction: Transaction,
}

/// Mining performance derived from block timestamps
#[derive(Debug, Clone, PartialEq)]
pub struct MiningStats {
    pub total_blocks: usize,

    /// Seconds between each block and its predecessor
    pub block_times: Vec<f64>,

    pub avg_block_time: f64,
    pub min_block_time: f64,
    pub max_block_time: f64,
    pub current_difficulty: u32,

    /// Mean difficulty of every block after genesis
    pub avg_difficulty: f64,

    pub target_block_time: f64,
}

/// Represents the blockchain
///
/// A single owned aggregate: every mutation goes through `&mut self`.
/// Callers sharing it across threads must put it behind their own lock.
#[derive(Debug, Clone)]
pub struct Blockchain {
    /// The chain of blocks
    pub(crate) chain: Vec<Block>,

    /// Pending transactions to be included in the next block
    pub(crate) pending_transactions: Vec<Transaction>,

    /// Mining difficulty (number of leading zeros required in hash)
    pub(crate) difficulty: u32,

    /// Desired seconds between blocks
    pub(crate) target_block_time: f64,

    /// Blocks between difficulty recalculations
    pub(crate) adjustment_interval: u64,

    /// Starting balances, fixed at creation
    pub(crate) initial_balances: BTreeMap<String, f64>,

    /// Mining reward
    pub(crate) mining_reward: f64,
}

impl Default for Blockchain {
    fn default() -> Self {
        Self::new()
    }
}

impl Blockchain {
    /// Creates a new blockchain with default parameters and a mined genesis block
    pub fn new() -> Self {
        Self::build(ChainConfig::default())
    }

    /// Creates a new blockchain from creation parameters
    ///
    /// # Arguments
    ///
    /// * `config` - Difficulty, timing, reward and initial balances
    ///
    /// # Returns
    ///
    /// Result with the new Blockchain, or an error if a parameter is out of range
    pub fn with_config(config: ChainConfig) -> Result<Self, BlockchainError> {
        config.validate().map_err(BlockchainError::InvalidConfig)?;
        Ok(Self::build(config))
    }

    fn build(config: ChainConfig) -> Self {
        let mut genesis = Block::genesis(config.difficulty);
        genesis.mine();

        info!(
            "Created blockchain with genesis {} at difficulty {}",
            genesis.hash, config.difficulty
        );

        Blockchain {
            chain: vec![genesis],
            pending_transactions: Vec::new(),
            difficulty: config.difficulty,
            target_block_time: config.target_block_time,
            adjustment_interval: config.adjustment_interval,
            initial_balances: config.initial_balances,
            mining_reward: config.mining_reward,
        }
    }

    /// Gets the parameters needed to recreate this chain from scratch
    pub fn config(&self) -> ChainConfig {
        ChainConfig {
            difficulty: self.difficulty,
            target_block_time: self.target_block_time,
            adjustment_interval: self.adjustment_interval,
            mining_reward: self.mining_reward,
            initial_balances: self.initial_balances.clone(),
        }
    }

    /// Gets the last block in the chain
    pub fn last_block(&self) -> &Block {
        self.chain
            .last()
            .expect("chain always holds the genesis block")
    }

    /// Gets a block by its position
    pub fn get_block(&self, index: usize) -> Option<&Block> {
        self.chain.get(index)
    }

    /// Gets the entire blockchain
    pub fn blocks(&self) -> &[Block] {
        &self.chain
    }

    /// Gets the number of blocks, genesis included
    pub fn len(&self) -> usize {
        self.chain.len()
    }

    /// Always false: a chain holds at least its genesis block
    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    /// Gets all pending transactions
    pub fn pending_transactions(&self) -> &[Transaction] {
        &self.pending_transactions
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn target_block_time(&self) -> f64 {
        self.target_block_time
    }

    pub fn adjustment_interval(&self) -> u64 {
        self.adjustment_interval
    }

    pub fn mining_reward(&self) -> f64 {
        self.mining_reward
    }

    pub fn initial_balances(&self) -> &BTreeMap<String, f64> {
        &self.initial_balances
    }

    /// Replays the chain, and optionally the pending pool, into a balance table
    fn balance_sheet(&self, include_pending: bool) -> BalanceSheet {
        let mut sheet = BalanceSheet::from_initial(&self.initial_balances);

        for block in &self.chain {
            sheet.apply_all(&block.transactions);
        }

        if include_pending {
            sheet.apply_all(&self.pending_transactions);
        }

        sheet
    }

    /// Gets the balance of an address
    ///
    /// Always a full recomputation from the initial balances.
    ///
    /// # Arguments
    ///
    /// * `address` - The address to look up
    /// * `include_pending` - Whether to also fold the pending pool
    pub fn balance_of(&self, address: &Address, include_pending: bool) -> f64 {
        self.balance_sheet(include_pending).balance(address)
    }

    /// Gets the balance a new pending transaction may spend
    pub fn spendable_balance(&self, address: &Address) -> f64 {
        self.balance_of(address, true)
    }

    /// Gets every user's confirmed balance, sorted by address
    pub fn balances(&self) -> Vec<(Address, f64)> {
        self.balance_sheet(false).into_sorted()
    }

    /// Gets the sum of all confirmed balances
    pub fn total_supply(&self) -> f64 {
        self.balances().iter().map(|(_, amount)| amount).sum()
    }

    /// Adds a new transaction to the pending transactions
    ///
    /// # Arguments
    ///
    /// * `sender` - The sender's address
    /// * `receiver` - The receiver's address
    /// * `amount` - The amount to transfer
    ///
    /// # Returns
    ///
    /// Result with the accepted transaction. Nothing is changed on error.
    pub fn create_transaction(
        &mut self,
        sender: &str,
        receiver: &str,
        amount: f64,
    ) -> Result<Transaction, BlockchainError> {
        let transaction = Transaction::new(Address::user(sender)?, Address::user(receiver)?, amount);
        transaction.is_valid()?;

        let spendable = self.spendable_balance(&transaction.sender);
        if amount > spendable {
            return Err(BlockchainError::InsufficientBalance {
                address: transaction.sender.clone(),
                balance: spendable,
                requested: amount,
            });
        }

        debug!(
            "Accepted transaction {} ({})",
            transaction.transaction_id, transaction
        );
        self.pending_transactions.push(transaction.clone());

        Ok(transaction)
    }

    /// Mines a new block with the pending transactions
    ///
    /// # Arguments
    ///
    /// * `miner_address` - The address of the miner (to receive mining reward)
    ///
    /// # Returns
    ///
    /// Result with the newly mined block
    pub fn mine_pending_transactions(&mut self, miner_address: &str) -> Result<Block, BlockchainError> {
        if self.pending_transactions.is_empty() {
            return Err(BlockchainError::NoPendingTransactions);
        }

        let miner = Address::user(miner_address)?;

        let mut transactions = self.pending_transactions.clone();
        transactions.push(Transaction::new_reward(miner, self.mining_reward));

        let last_block = self.last_block();
        let index = last_block
            .index
            .checked_add(1)
            .ok_or(BlockchainError::IndexOverflow(last_block.index))?;

        let mut block = Block::new(
            index,
            Utc::now(),
            transactions,
            last_block.hash.clone(),
            self.difficulty,
        );

        let elapsed = block.mine();
        info!(
            "Mined block {} with {} transactions in {:.3}s (nonce {}, difficulty {})",
            block.index,
            block.transaction_count(),
            elapsed.as_secs_f64(),
            block.nonce,
            block.difficulty
        );

        self.chain.push(block.clone());
        self.pending_transactions.clear();
        self.adjust_difficulty();

        Ok(block)
    }

    /// Recalculates difficulty when the chain length hits the interval
    ///
    /// Compares the mean gap between the most recent `adjustment_interval`
    /// blocks against the target and steps difficulty by one within bounds.
    fn adjust_difficulty(&mut self) {
        let interval = self.adjustment_interval as usize;

        if interval == 0 || self.chain.len() % interval != 0 {
            return;
        }

        let recent = &self.chain[self.chain.len() - interval..];
        let block_times = block_intervals(recent);

        if block_times.is_empty() {
            return;
        }

        let avg_block_time = block_times.iter().sum::<f64>() / block_times.len() as f64;
        let previous = self.difficulty;

        if avg_block_time < 0.75 * self.target_block_time {
            self.difficulty = (self.difficulty + 1).min(MAX_DIFFICULTY);
        } else if avg_block_time > 1.5 * self.target_block_time {
            self.difficulty = self.difficulty.saturating_sub(1).max(MIN_DIFFICULTY);
        }

        info!(
            "Difficulty adjustment at {} blocks: avg {:.2}s vs target {}s, {} -> {}",
            self.chain.len(),
            avg_block_time,
            self.target_block_time,
            previous,
            self.difficulty
        );
    }

    /// Validates the blockchain
    ///
    /// Checks, for every block in order: hash integrity, link continuity,
    /// proof of work and transaction legality against balances replayed up to
    /// the previous block.
    ///
    /// # Arguments
    ///
    /// * `verbose` - Collect every failure instead of stopping at the first
    pub fn validate_chain(&self, verbose: bool) -> ValidationReport {
        let mut report = ValidationReport::default();

        for (index, block) in self.chain.iter().enumerate() {
            let failures_before = report.failures.len();

            if block.hash != block.calculate_hash() {
                report.record(IntegrityError::HashMismatch { index });
                if !verbose {
                    return report;
                }
            }

            let expected_previous = match index {
                0 => GENESIS_PREVIOUS_HASH,
                _ => self.chain[index - 1].hash.as_str(),
            };
            if block.previous_hash != expected_previous {
                report.record(IntegrityError::BrokenLink { index });
                if !verbose {
                    return report;
                }
            }

            if !block.meets_target() {
                report.record(IntegrityError::InsufficientProofOfWork { index });
                if !verbose {
                    return report;
                }
            }

            if let Err(reason) = self.check_block_transactions(index) {
                report.record(IntegrityError::InvalidTransaction { index, reason });
                if !verbose {
                    return report;
                }
            }

            if verbose && report.failures.len() == failures_before {
                debug!("Block {} valid (nonce {})", index, block.nonce);
            }
        }

        report
    }

    /// Checks if the blockchain is valid
    pub fn is_chain_valid(&self, verbose: bool) -> bool {
        self.validate_chain(verbose).is_valid()
    }

    // Balances are replayed from the initial allocation for every block checked.
    fn check_block_transactions(&self, index: usize) -> Result<(), String> {
        let mut sheet = BalanceSheet::from_initial(&self.initial_balances);

        for block in &self.chain[..index] {
            sheet.apply_all(&block.transactions);
        }

        for transaction in &self.chain[index].transactions {
            if !transaction.has_valid_id() {
                return Err(format!(
                    "transaction {} does not match its contents",
                    transaction.transaction_id
                ));
            }

            transaction.is_valid().map_err(|e| e.to_string())?;
            sheet.apply_checked(transaction).map_err(|e| e.to_string())?;
        }

        Ok(())
    }

    /// Gets every transaction sent or received by an address
    ///
    /// Mined transactions come first in chain order, then pending ones in
    /// pool order.
    pub fn get_transaction_history(&self, address: &Address) -> Vec<HistoryEntry> {
        let mined = self.chain.iter().flat_map(|block| {
            block.transactions.iter().map(move |transaction| HistoryEntry {
                block: Some(block.index),
                transaction: transaction.clone(),
            })
        });

        let pending = self.pending_transactions.iter().map(|transaction| HistoryEntry {
            block: None,
            transaction: transaction.clone(),
        });

        mined
            .chain(pending)
            .filter(|entry| entry.transaction.involves(address))
            .collect()
    }

    /// Gets statistics about mining performance
    ///
    /// # Returns
    ///
    /// The statistics, or `None` while the chain holds only genesis
    pub fn get_mining_stats(&self) -> Option<MiningStats> {
        if self.chain.len() < 2 {
            return None;
        }

        let block_times = block_intervals(&self.chain);
        let mined = &self.chain[1..];

        let avg_block_time = block_times.iter().sum::<f64>() / block_times.len() as f64;
        let min_block_time = block_times.iter().copied().fold(f64::INFINITY, f64::min);
        let max_block_time = block_times.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let avg_difficulty =
            mined.iter().map(|block| block.difficulty as f64).sum::<f64>() / mined.len() as f64;

        Some(MiningStats {
            total_blocks: self.chain.len(),
            block_times,
            avg_block_time,
            min_block_time,
            max_block_time,
            current_difficulty: self.difficulty,
            avg_difficulty,
            target_block_time: self.target_block_time,
        })
    }
}

/// Seconds between each consecutive pair of blocks
fn block_intervals(blocks: &[Block]) -> Vec<f64> {
    blocks
        .windows(2)
        .map(|pair| (pair[1].timestamp - pair[0].timestamp).num_milliseconds() as f64 / 1000.0)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn user(name: &str) -> Address {
        Address::User(name.to_string())
    }

    // Difficulty 1 and a long interval keep the tests fast.
    fn test_chain() -> Blockchain {
        Blockchain::with_config(
            ChainConfig::default()
                .with_difficulty(1)
                .with_adjustment(10.0, 1000)
                .with_balance("Alice", 100.0)
                .with_balance("Bob", 50.0),
        )
        .unwrap()
    }

    fn three_block_chain() -> Blockchain {
        let mut blockchain = test_chain();

        blockchain.create_transaction("Alice", "Bob", 30.0).unwrap();
        blockchain.mine_pending_transactions("Miner1").unwrap();
        blockchain.create_transaction("Bob", "Charlie", 15.0).unwrap();
        blockchain.mine_pending_transactions("Miner1").unwrap();

        blockchain
    }

    #[test]
    fn test_new_blockchain() {
        let blockchain = test_chain();
        let genesis = &blockchain.blocks()[0];

        assert_eq!(blockchain.len(), 1);
        assert_eq!(genesis.index, 0);
        assert_eq!(genesis.previous_hash, GENESIS_PREVIOUS_HASH);
        assert_eq!(genesis.transaction_count(), 1);
        assert_eq!(genesis.transactions[0].sender, Address::System);
        assert_eq!(genesis.transactions[0].receiver, user("Genesis"));
        assert!(genesis.meets_target());
        assert!(blockchain.is_chain_valid(false));
    }

    #[test]
    fn test_with_config_rejects_bad_difficulty() {
        let result = Blockchain::with_config(ChainConfig::default().with_difficulty(9));
        assert!(matches!(result, Err(BlockchainError::InvalidConfig(_))));
    }

    #[test]
    fn test_create_transaction() {
        let mut blockchain = test_chain();
        let transaction = blockchain.create_transaction("Alice", "Bob", 50.0).unwrap();

        assert_eq!(transaction.sender, user("Alice"));
        assert_eq!(transaction.receiver, user("Bob"));
        assert_eq!(transaction.amount, 50.0);
        assert_eq!(blockchain.pending_transactions().len(), 1);
        assert_eq!(blockchain.balance_of(&user("Alice"), false), 100.0);
        assert_eq!(blockchain.balance_of(&user("Alice"), true), 50.0);
    }

    #[test]
    fn test_rejects_malformed_transactions() {
        let mut blockchain = test_chain();

        assert!(matches!(
            blockchain.create_transaction("Alice", "Bob", 0.0),
            Err(BlockchainError::Validation(TransactionError::InvalidAmount(_)))
        ));
        assert!(matches!(
            blockchain.create_transaction("Alice", "Alice", 10.0),
            Err(BlockchainError::Validation(TransactionError::SelfTransfer(_)))
        ));
        assert!(matches!(
            blockchain.create_transaction("System", "Bob", 10.0),
            Err(BlockchainError::Validation(TransactionError::ReservedAddress(_)))
        ));
        assert!(matches!(
            blockchain.create_transaction("", "Bob", 10.0),
            Err(BlockchainError::Validation(TransactionError::InvalidAddress(_)))
        ));
        assert!(blockchain.pending_transactions().is_empty());
    }

    #[test]
    fn test_pending_transactions_cannot_jointly_overspend() {
        let mut blockchain = Blockchain::with_config(
            ChainConfig::default()
                .with_difficulty(1)
                .with_balance("Alice", 100.0),
        )
        .unwrap();

        blockchain.create_transaction("Alice", "Bob", 80.0).unwrap();
        let result = blockchain.create_transaction("Alice", "Charlie", 80.0);

        match result {
            Err(BlockchainError::InsufficientBalance {
                address,
                balance,
                requested,
            }) => {
                assert_eq!(address, user("Alice"));
                assert_eq!(balance, 20.0);
                assert_eq!(requested, 80.0);
            }
            other => panic!("expected insufficient balance, got {:?}", other),
        }
        assert_eq!(blockchain.pending_transactions().len(), 1);
    }

    #[test]
    fn test_mine_with_no_pending_transactions() {
        let mut blockchain = test_chain();
        let result = blockchain.mine_pending_transactions("Miner1");

        assert!(matches!(result, Err(BlockchainError::NoPendingTransactions)));
        assert_eq!(blockchain.len(), 1);
    }

    #[test]
    fn test_mine_rejects_exhausted_index() {
        let mut blockchain = test_chain();
        blockchain.chain[0].index = u64::MAX;
        blockchain.create_transaction("Alice", "Bob", 10.0).unwrap();

        assert!(matches!(
            blockchain.mine_pending_transactions("Miner1"),
            Err(BlockchainError::IndexOverflow(u64::MAX))
        ));
        assert_eq!(blockchain.len(), 1);
        assert_eq!(blockchain.pending_transactions().len(), 1);
    }

    #[test]
    fn test_mine_rejects_reserved_miner() {
        let mut blockchain = test_chain();
        blockchain.create_transaction("Alice", "Bob", 10.0).unwrap();

        assert!(blockchain.mine_pending_transactions("System").is_err());
        assert_eq!(blockchain.len(), 1);
        assert_eq!(blockchain.pending_transactions().len(), 1);
    }

    #[test]
    fn test_mine_block() {
        let mut blockchain = test_chain();
        blockchain.create_transaction("Alice", "Bob", 30.0).unwrap();
        blockchain.create_transaction("Bob", "Charlie", 20.0).unwrap();

        let block = blockchain.mine_pending_transactions("Miner1").unwrap();

        assert_eq!(block.index, 1);
        assert_eq!(block.transaction_count(), 3); // Two transfers + mining reward
        assert_eq!(block.previous_hash, blockchain.blocks()[0].hash);
        assert!(blockchain.pending_transactions().is_empty());

        let reward = block.transactions.last().unwrap();
        assert_eq!(reward.sender, Address::System);
        assert_eq!(reward.receiver, user("Miner1"));
        assert_eq!(reward.amount, blockchain.mining_reward());
        assert_eq!(blockchain.last_block(), &block);
    }

    #[test]
    fn test_end_to_end_balances() {
        let mut blockchain = test_chain();

        blockchain.create_transaction("Alice", "Bob", 30.0).unwrap();
        blockchain.create_transaction("Bob", "Charlie", 15.0).unwrap();
        blockchain.mine_pending_transactions("Miner1").unwrap();

        assert_eq!(blockchain.balance_of(&user("Alice"), false), 70.0);
        assert_eq!(blockchain.balance_of(&user("Bob"), false), 65.0);
        assert_eq!(blockchain.balance_of(&user("Charlie"), false), 15.0);
        assert_eq!(blockchain.balance_of(&user("Miner1"), false), 10.0);
        assert_eq!(blockchain.balance_of(&user("Nobody"), false), 0.0);
        assert!(blockchain.is_chain_valid(false));
    }

    #[test]
    fn test_chain_linkage() {
        let mut blockchain = test_chain();

        for _ in 0..4 {
            blockchain.create_transaction("Alice", "Bob", 1.0).unwrap();
            blockchain.mine_pending_transactions("Miner1").unwrap();
        }

        for pair in blockchain.blocks().windows(2) {
            assert_eq!(pair[1].previous_hash, pair[0].hash);
            assert_eq!(pair[1].index, pair[0].index + 1);
        }
        assert!(blockchain.is_chain_valid(true));
    }

    #[test]
    fn test_balance_conservation() {
        let mut blockchain = test_chain();
        let names = ["Alice", "Bob", "Charlie", "Dave"];
        let mut rng = rand::thread_rng();

        for _ in 0..40 {
            let sender = names[rng.gen_range(0..names.len())];
            let receiver = names[rng.gen_range(0..names.len())];
            let amount = rng.gen_range(1..=30) as f64;

            // Rejected transfers leave the pool untouched
            let _ = blockchain.create_transaction(sender, receiver, amount);

            let total: f64 = names
                .iter()
                .map(|name| blockchain.balance_of(&user(name), true))
                .sum();
            assert_eq!(total, 150.0);
        }

        let mut mined_blocks = 0.0;
        if !blockchain.pending_transactions().is_empty() {
            blockchain.mine_pending_transactions("Miner1").unwrap();
            mined_blocks += 1.0;
        }

        assert_eq!(blockchain.total_supply(), 150.0 + blockchain.mining_reward() * mined_blocks);
        assert!(blockchain.is_chain_valid(false));
    }

    #[test]
    fn test_tampered_amount_is_detected() {
        let mut blockchain = three_block_chain();
        assert!(blockchain.is_chain_valid(false));

        blockchain.chain[1].transactions[0].amount = 1000.0;

        let report = blockchain.validate_chain(false);
        assert!(!report.is_valid());
        assert_eq!(report.failures().len(), 1);
        assert_eq!(
            report.first_failure(),
            Some(&IntegrityError::HashMismatch { index: 1 })
        );
    }

    #[test]
    fn test_rehashed_tamper_is_detected() {
        let mut blockchain = three_block_chain();

        blockchain.chain[1].transactions[0].amount = 1000.0;
        blockchain.chain[1].hash = blockchain.chain[1].calculate_hash();

        let report = blockchain.validate_chain(false);
        assert!(!report.is_valid());
        assert!(report.first_failure().unwrap().index() >= 1);
    }

    #[test]
    fn test_broken_link_is_detected() {
        let mut blockchain = three_block_chain();
        blockchain.chain[2].previous_hash = "0".repeat(64);

        let report = blockchain.validate_chain(true);
        assert!(report
            .failures()
            .contains(&IntegrityError::BrokenLink { index: 2 }));
    }

    #[test]
    fn test_overspend_in_block_is_detected() {
        let mut blockchain = test_chain();
        blockchain.create_transaction("Bob", "Alice", 50.0).unwrap();

        // Forge a second spend that was never balance-checked
        blockchain
            .pending_transactions
            .push(Transaction::new(user("Bob"), user("Charlie"), 10.0));
        blockchain.mine_pending_transactions("Miner1").unwrap();

        let report = blockchain.validate_chain(false);
        assert!(matches!(
            report.first_failure(),
            Some(IntegrityError::InvalidTransaction { index: 1, .. })
        ));
    }

    #[test]
    fn test_verbose_collects_every_failure() {
        let mut blockchain = three_block_chain();
        blockchain.chain[1].transactions[0].amount = 1000.0;
        blockchain.chain[2].transactions[0].amount = 1000.0;

        let quick = blockchain.validate_chain(false);
        let full = blockchain.validate_chain(true);

        assert_eq!(quick.failures().len(), 1);
        assert!(full.failures().len() >= 2);
        assert!(full.failures().iter().any(|failure| failure.index() == 2));
        assert!(!blockchain.is_chain_valid(true));
    }

    #[test]
    fn test_transaction_history() {
        let mut blockchain = three_block_chain();
        blockchain.create_transaction("Bob", "Alice", 5.0).unwrap();

        let history = blockchain.get_transaction_history(&user("Bob"));

        assert_eq!(history.len(), 3);
        assert_eq!(history[0].block, Some(1));
        assert_eq!(history[1].block, Some(2));
        assert_eq!(history[2].block, None);
        assert!(blockchain.get_transaction_history(&user("Nobody")).is_empty());
    }

    #[test]
    fn test_mining_stats() {
        assert!(test_chain().get_mining_stats().is_none());

        let blockchain = three_block_chain();
        let stats = blockchain.get_mining_stats().unwrap();

        assert_eq!(stats.total_blocks, 3);
        assert_eq!(stats.block_times.len(), 2);
        assert!(stats.min_block_time <= stats.avg_block_time);
        assert!(stats.avg_block_time <= stats.max_block_time);
        assert_eq!(stats.current_difficulty, 1);
        assert_eq!(stats.avg_difficulty, 1.0);
        assert_eq!(stats.target_block_time, 10.0);
    }

    #[test]
    fn test_balances_listing() {
        let blockchain = three_block_chain();

        assert_eq!(
            blockchain.balances(),
            vec![
                (user("Alice"), 70.0),
                (user("Bob"), 65.0),
                (user("Charlie"), 15.0),
                (user("Genesis"), 0.0),
                (user("Miner1"), 20.0),
            ]
        );
        assert_eq!(blockchain.total_supply(), 170.0);
    }

    /// Builds a five-block chain whose timestamps are `spacing` seconds apart
    fn chain_with_spacing(spacing: i64, difficulty: u32) -> Blockchain {
        let mut blockchain = Blockchain::with_config(
            ChainConfig::default()
                .with_difficulty(1)
                .with_adjustment(10.0, 5),
        )
        .unwrap();
        blockchain.difficulty = difficulty;

        let start = blockchain.chain[0].timestamp;
        for index in 1..5u64 {
            let block = Block::new(
                index,
                start + chrono::Duration::seconds(spacing * index as i64),
                Vec::new(),
                blockchain.last_block().hash.clone(),
                difficulty,
            );
            blockchain.chain.push(block);
        }

        blockchain
    }

    #[test]
    fn test_difficulty_increases_when_mining_fast() {
        let mut blockchain = chain_with_spacing(4, 3);
        blockchain.adjust_difficulty();
        assert_eq!(blockchain.difficulty(), 4);
    }

    #[test]
    fn test_difficulty_decreases_when_mining_slow() {
        let mut blockchain = chain_with_spacing(20, 3);
        blockchain.adjust_difficulty();
        assert_eq!(blockchain.difficulty(), 2);
    }

    #[test]
    fn test_difficulty_unchanged_on_target() {
        let mut blockchain = chain_with_spacing(10, 3);
        blockchain.adjust_difficulty();
        assert_eq!(blockchain.difficulty(), 3);
    }

    #[test]
    fn test_difficulty_bounds() {
        let mut fast = chain_with_spacing(4, MAX_DIFFICULTY);
        fast.adjust_difficulty();
        assert_eq!(fast.difficulty(), MAX_DIFFICULTY);

        let mut slow = chain_with_spacing(20, MIN_DIFFICULTY);
        slow.adjust_difficulty();
        assert_eq!(slow.difficulty(), MIN_DIFFICULTY);
    }

    #[test]
    fn test_adjust_difficulty_only_at_intervals() {
        let mut blockchain = chain_with_spacing(4, 3);
        blockchain.chain.pop();
        blockchain.adjust_difficulty();
        assert_eq!(blockchain.difficulty(), 3);
    }

    #[test]
    fn test_mining_triggers_adjustment() {
        // Blocks mined back to back are far below a 1000 second target
        let mut blockchain = Blockchain::with_config(
            ChainConfig::default()
                .with_difficulty(1)
                .with_adjustment(1000.0, 2)
                .with_balance("Alice", 100.0),
        )
        .unwrap();

        blockchain.create_transaction("Alice", "Bob", 10.0).unwrap();
        let block = blockchain.mine_pending_transactions("Miner1").unwrap();

        assert_eq!(block.difficulty, 1);
        assert_eq!(blockchain.difficulty(), 2);

        blockchain.create_transaction("Alice", "Bob", 10.0).unwrap();
        let next = blockchain.mine_pending_transactions("Miner1").unwrap();
        assert_eq!(next.difficulty, 2);
        assert!(next.hash.starts_with("00"));
        assert!(blockchain.is_chain_valid(false));
    }
}
