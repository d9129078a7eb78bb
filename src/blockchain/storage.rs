use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{validate_initial_balances, MAX_DIFFICULTY, MIN_DIFFICULTY};

use super::block::Block;
use super::chain::Blockchain;
use super::transaction::Transaction;

/// Errors that can occur during snapshot import and export
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Malformed snapshot: {0}")]
    Json(#[from] serde_json::Error),

    #[error("File error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),
}

/// The JSON document a chain is exported to and imported from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainSnapshot {
    pub chain: Vec<Block>,
    pub pending_transactions: Vec<Transaction>,
    pub difficulty: u32,
    pub target_block_time: f64,
    pub adjustment_interval: u64,
    pub initial_balances: BTreeMap<String, f64>,
    pub mining_reward: f64,
}

impl From<&Blockchain> for ChainSnapshot {
    fn from(blockchain: &Blockchain) -> Self {
        ChainSnapshot {
            chain: blockchain.chain.clone(),
            pending_transactions: blockchain.pending_transactions.clone(),
            difficulty: blockchain.difficulty,
            target_block_time: blockchain.target_block_time,
            adjustment_interval: blockchain.adjustment_interval,
            initial_balances: blockchain.initial_balances.clone(),
            mining_reward: blockchain.mining_reward,
        }
    }
}

impl TryFrom<ChainSnapshot> for Blockchain {
    type Error = StorageError;

    /// Rebuilds a chain without validating it
    ///
    /// Only the fields future mining depends on are checked; integrity is
    /// left to `Blockchain::validate_chain`.
    fn try_from(snapshot: ChainSnapshot) -> Result<Self, Self::Error> {
        if snapshot.chain.is_empty() {
            return Err(StorageError::InvalidSnapshot(
                "chain must contain a genesis block".to_string(),
            ));
        }

        if !(MIN_DIFFICULTY..=MAX_DIFFICULTY).contains(&snapshot.difficulty) {
            return Err(StorageError::InvalidSnapshot(format!(
                "difficulty must be between {} and {}, got {}",
                MIN_DIFFICULTY, MAX_DIFFICULTY, snapshot.difficulty
            )));
        }

        if snapshot.adjustment_interval == 0 {
            return Err(StorageError::InvalidSnapshot(
                "adjustment interval must be at least 1".to_string(),
            ));
        }

        validate_initial_balances(&snapshot.initial_balances).map_err(StorageError::InvalidSnapshot)?;

        Ok(Blockchain {
            chain: snapshot.chain,
            pending_transactions: snapshot.pending_transactions,
            difficulty: snapshot.difficulty,
            target_block_time: snapshot.target_block_time,
            adjustment_interval: snapshot.adjustment_interval,
            initial_balances: snapshot.initial_balances,
            mining_reward: snapshot.mining_reward,
        })
    }
}

impl Blockchain {
    /// Serializes the chain to a JSON document
    ///
    /// # Arguments
    ///
    /// * `pretty` - Indent the output for people to read
    pub fn to_json(&self, pretty: bool) -> Result<String, StorageError> {
        let snapshot = ChainSnapshot::from(self);

        let json = if pretty {
            serde_json::to_string_pretty(&snapshot)?
        } else {
            serde_json::to_string(&snapshot)?
        };

        Ok(json)
    }

    /// Parses a chain from a JSON document
    ///
    /// The result is not validated; call `is_chain_valid` afterwards.
    pub fn from_json(json: &str) -> Result<Self, StorageError> {
        let snapshot: ChainSnapshot = serde_json::from_str(json)?;
        Blockchain::try_from(snapshot)
    }

    /// Writes the whole chain to a file, replacing its contents
    pub fn export_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), StorageError> {
        let path = path.as_ref();
        fs::write(path, self.to_json(true)?)?;

        info!(
            "Exported {} blocks and {} pending transactions to {}",
            self.len(),
            self.pending_transactions().len(),
            path.display()
        );
        Ok(())
    }

    /// Reads a chain from a file written by `export_to_file`
    pub fn import_from_file<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let blockchain = Self::from_json(&fs::read_to_string(path)?)?;

        info!("Imported {} blocks from {}", blockchain.len(), path.display());
        Ok(blockchain)
    }
}
