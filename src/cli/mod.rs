// Command-line front end
//
// Parses arguments, loads the chain from the data file, dispatches to a
// handler and writes the snapshot back after commands that change state.

pub mod handlers;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{debug, info};

use edu_chain::config::{
    ChainConfig, DEFAULT_ADJUSTMENT_INTERVAL, DEFAULT_DIFFICULTY, DEFAULT_MINING_REWARD,
    DEFAULT_TARGET_BLOCK_TIME,
};
use edu_chain::Blockchain;

#[derive(Debug, Parser)]
#[command(name = "edu-chain")]
#[command(about = "Educational proof-of-work ledger", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Snapshot file the chain is kept in between runs
    #[arg(long, global = true, env = "EDU_CHAIN_DATA", default_value = "blockchain_data.json")]
    pub data_file: PathBuf,

    /// Initial difficulty for a fresh chain
    #[arg(long, global = true, env = "EDU_CHAIN_DIFFICULTY", default_value_t = DEFAULT_DIFFICULTY)]
    pub difficulty: u32,

    /// Target seconds between blocks for a fresh chain
    #[arg(long, global = true, default_value_t = DEFAULT_TARGET_BLOCK_TIME)]
    pub target_block_time: f64,

    /// Blocks between difficulty adjustments for a fresh chain
    #[arg(long, global = true, default_value_t = DEFAULT_ADJUSTMENT_INTERVAL)]
    pub adjustment_interval: u64,

    /// Mining reward for a fresh chain
    #[arg(long, global = true, default_value_t = DEFAULT_MINING_REWARD)]
    pub mining_reward: f64,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub debug: bool,
}

impl Cli {
    /// Creation parameters for a chain started by this invocation
    pub fn chain_config(&self) -> ChainConfig {
        ChainConfig::default()
            .with_difficulty(self.difficulty)
            .with_adjustment(self.target_block_time, self.adjustment_interval)
            .with_mining_reward(self.mining_reward)
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Set the initial balance of an address (fresh chains only)
    InitBalance {
        address: String,

        #[arg(allow_negative_numbers = true)]
        amount: f64,
    },

    /// Create a new pending transaction
    Transaction {
        sender: String,
        receiver: String,

        #[arg(allow_negative_numbers = true)]
        amount: f64,
    },

    /// Mine pending transactions into a new block
    Mine {
        /// Address that receives the mining reward
        miner: String,
    },

    /// View the blockchain
    View {
        #[arg(long)]
        detail: bool,
    },

    /// Check the balance of an address
    Balance {
        address: String,

        /// Include pending transactions
        #[arg(long)]
        pending: bool,
    },

    /// View the transaction history of an address
    History { address: String },

    /// Validate blockchain integrity
    Validate {
        /// Report every failure instead of the first
        #[arg(long)]
        verbose: bool,
    },

    /// Show mining statistics
    Stats,

    /// View pending transactions
    Pending,

    /// Reset the blockchain to a fresh genesis block
    Reset {
        #[arg(long)]
        confirm: bool,
    },

    /// Export the blockchain to a JSON file
    Export { filename: PathBuf },

    /// Import the blockchain from a JSON file
    Import { filename: PathBuf },

    /// Show a blockchain summary
    Summary,

    /// Show the transactions of one block
    Details { block_index: usize },
}

/// What a handler did to the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// State changed and must be saved
    Modified,

    /// Read-only command
    Unchanged,

    /// The chain failed validation
    Invalid,
}

/// Loads the chain from the data file, or starts a fresh one
pub fn load_blockchain(cli: &Cli) -> Result<Blockchain> {
    if cli.data_file.exists() {
        debug!("Loading blockchain from {}", cli.data_file.display());
        return Blockchain::import_from_file(&cli.data_file)
            .with_context(|| format!("failed to load {}", cli.data_file.display()));
    }

    info!("No data file at {}, starting a new chain", cli.data_file.display());
    Ok(Blockchain::with_config(cli.chain_config())?)
}

fn save_blockchain(blockchain: &Blockchain, path: &Path) -> Result<()> {
    blockchain
        .export_to_file(path)
        .with_context(|| format!("failed to save {}", path.display()))
}

/// Runs one command against the persisted chain
pub fn run(cli: Cli) -> Result<Outcome> {
    let mut blockchain = load_blockchain(&cli)?;

    let outcome = match &cli.command {
        Commands::InitBalance { address, amount } => {
            handlers::init_balance(&mut blockchain, address, *amount)?
        }
        Commands::Transaction {
            sender,
            receiver,
            amount,
        } => handlers::transaction(&mut blockchain, sender, receiver, *amount)?,
        Commands::Mine { miner } => handlers::mine(&mut blockchain, miner)?,
        Commands::View { detail } => handlers::view(&blockchain, *detail),
        Commands::Balance { address, pending } => handlers::balance(&blockchain, address, *pending)?,
        Commands::History { address } => handlers::history(&blockchain, address)?,
        Commands::Validate { verbose } => handlers::validate(&blockchain, *verbose),
        Commands::Stats => handlers::stats(&blockchain),
        Commands::Pending => handlers::pending(&blockchain),
        Commands::Reset { confirm } => handlers::reset(&mut blockchain, *confirm, cli.chain_config())?,
        Commands::Export { filename } => handlers::export(&blockchain, filename)?,
        Commands::Import { filename } => handlers::import(&mut blockchain, filename)?,
        Commands::Summary => handlers::summary(&blockchain),
        Commands::Details { block_index } => handlers::details(&blockchain, *block_index)?,
    };

    if outcome == Outcome::Modified {
        save_blockchain(&blockchain, &cli.data_file)?;
    }

    Ok(outcome)
}
