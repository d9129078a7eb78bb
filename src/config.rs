use serde::{Deserialize, Serialize};

use std::collections::BTreeMap;

use crate::blockchain::crypto::SYSTEM_ADDRESS;

/// Lowest difficulty the chain will mine at
pub const MIN_DIFFICULTY: u32 = 1;

/// Highest difficulty the chain will mine at
pub const MAX_DIFFICULTY: u32 = 8;

pub const DEFAULT_DIFFICULTY: u32 = 2;
pub const DEFAULT_TARGET_BLOCK_TIME: f64 = 10.0;
pub const DEFAULT_ADJUSTMENT_INTERVAL: u64 = 5;
pub const DEFAULT_MINING_REWARD: f64 = 10.0;

/// Parameters a chain is created with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Initial mining difficulty
    pub difficulty: u32,

    /// Desired seconds between consecutive blocks
    pub target_block_time: f64,

    /// Number of blocks between difficulty recalculations
    pub adjustment_interval: u64,

    /// Amount credited to the miner of each block
    pub mining_reward: f64,

    /// Starting balance per address
    pub initial_balances: BTreeMap<String, f64>,
}

impl Default for ChainConfig {
    fn default() -> Self {
        ChainConfig {
            difficulty: DEFAULT_DIFFICULTY,
            target_block_time: DEFAULT_TARGET_BLOCK_TIME,
            adjustment_interval: DEFAULT_ADJUSTMENT_INTERVAL,
            mining_reward: DEFAULT_MINING_REWARD,
            initial_balances: BTreeMap::new(),
        }
    }
}

impl ChainConfig {
    /// Sets the initial mining difficulty
    pub fn with_difficulty(mut self, difficulty: u32) -> Self {
        self.difficulty = difficulty;
        self
    }

    /// Sets the target block time and the adjustment interval
    pub fn with_adjustment(mut self, target_block_time: f64, adjustment_interval: u64) -> Self {
        self.target_block_time = target_block_time;
        self.adjustment_interval = adjustment_interval;
        self
    }

    /// Sets the mining reward
    pub fn with_mining_reward(mut self, mining_reward: f64) -> Self {
        self.mining_reward = mining_reward;
        self
    }

    /// Sets the starting balance of an address
    ///
    /// The name is trimmed the same way user addresses are.
    pub fn with_balance(mut self, address: &str, amount: f64) -> Self {
        self.initial_balances.insert(address.trim().to_string(), amount);
        self
    }

    /// Checks that the parameters keep mining tractable and balances sane
    ///
    /// # Returns
    ///
    /// Ok(()) or a description of the first offending parameter
    pub fn validate(&self) -> Result<(), String> {
        if !(MIN_DIFFICULTY..=MAX_DIFFICULTY).contains(&self.difficulty) {
            return Err(format!(
                "difficulty must be between {} and {}, got {}",
                MIN_DIFFICULTY, MAX_DIFFICULTY, self.difficulty
            ));
        }

        if !(self.target_block_time.is_finite() && self.target_block_time > 0.0) {
            return Err(format!(
                "target block time must be positive, got {}",
                self.target_block_time
            ));
        }

        if self.adjustment_interval == 0 {
            return Err("adjustment interval must be at least 1".to_string());
        }

        if !(self.mining_reward.is_finite() && self.mining_reward >= 0.0) {
            return Err(format!(
                "mining reward cannot be negative, got {}",
                self.mining_reward
            ));
        }

        validate_initial_balances(&self.initial_balances)
    }
}

/// Checks that every starting balance belongs to a reachable user address
///
/// Keys must be non-empty, already trimmed and not the reserved issuer;
/// amounts must be finite and non-negative.
pub fn validate_initial_balances(balances: &BTreeMap<String, f64>) -> Result<(), String> {
    for (address, amount) in balances {
        if address.is_empty() || address.trim() != address || address == SYSTEM_ADDRESS {
            return Err(format!("invalid initial balance address: {:?}", address));
        }

        if !(amount.is_finite() && *amount >= 0.0) {
            return Err(format!(
                "balance cannot be negative: {} has {}",
                address, amount
            ));
        }
    }

    Ok(())
}
