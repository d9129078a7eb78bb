use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};

use edu_chain::blockchain::{Address, Blockchain, Transaction};
use edu_chain::config::ChainConfig;

use super::Outcome;

const RULE: &str = "======================================================================";

fn format_time(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

// Imported ids are arbitrary strings, so cut on a char boundary.
fn short(hash: &str) -> &str {
    hash.char_indices().nth(16).map_or(hash, |(end, _)| &hash[..end])
}

fn print_transaction(position: usize, transaction: &Transaction, detail: bool) {
    println!("      {}. {}", position, transaction);
    if detail {
        println!("         ID: {}...", short(&transaction.transaction_id));
    }
}

pub fn init_balance(blockchain: &mut Blockchain, address: &str, amount: f64) -> Result<Outcome> {
    let address = address.trim();

    if blockchain.len() > 1 || !blockchain.pending_transactions().is_empty() {
        bail!("initial balances are fixed once the chain has transactions; run `reset --confirm` first");
    }

    if let Some(previous) = blockchain.initial_balances().get(address) {
        println!("[WARNING] {} already has initial balance of {}", address, previous);
        println!("   Updating to {}...", amount);
    }

    let config = blockchain.config().with_balance(address, amount);
    *blockchain = Blockchain::with_config(config)?;

    println!("[OK] Set initial balance: {} = {}", address, amount);
    Ok(Outcome::Modified)
}

pub fn transaction(
    blockchain: &mut Blockchain,
    sender: &str,
    receiver: &str,
    amount: f64,
) -> Result<Outcome> {
    let transaction = blockchain
        .create_transaction(sender, receiver, amount)
        .context("transaction failed")?;

    println!("[OK] Transaction created:");
    println!("   {}", transaction);
    println!("   Transaction ID: {}...", short(&transaction.transaction_id));
    println!("   Pending transactions: {}", blockchain.pending_transactions().len());

    Ok(Outcome::Modified)
}

pub fn mine(blockchain: &mut Blockchain, miner: &str) -> Result<Outcome> {
    let pending_count = blockchain.pending_transactions().len();
    if pending_count == 0 {
        println!("[WARNING] No pending transactions to mine");
        return Ok(Outcome::Unchanged);
    }

    println!("[MINING] Mining {} transaction(s)...", pending_count);
    let block = blockchain.mine_pending_transactions(miner)?;

    println!("[OK] Block #{} mined successfully!", block.index);
    println!("   Hash: {}", block.hash);
    println!("   Nonce: {}", block.nonce);
    println!("   Transactions: {}", block.transaction_count());
    println!("   Reward sent to: {}", miner);
    println!("   Next difficulty: {}", blockchain.difficulty());

    Ok(Outcome::Modified)
}

pub fn view(blockchain: &Blockchain, detail: bool) -> Outcome {
    println!("\n{}", RULE);
    println!("{:^70}", "BLOCKCHAIN");
    println!("{}", RULE);
    println!("Total blocks: {}", blockchain.len());
    println!("Difficulty: {}", blockchain.difficulty());
    println!("Pending transactions: {}", blockchain.pending_transactions().len());
    println!("{}", RULE);

    for block in blockchain.blocks() {
        println!("\n[Block #{}]", block.index);
        println!("   Timestamp: {}", format_time(&block.timestamp));
        println!("   Hash: {}", block.hash);

        if detail {
            println!("   Previous Hash: {}", block.previous_hash);
            println!("   Nonce: {}", block.nonce);
            println!("   Difficulty: {}", block.difficulty);
        }

        println!("   Transactions ({}):", block.transaction_count());
        for (i, transaction) in block.transactions.iter().enumerate() {
            print_transaction(i + 1, transaction, detail);
        }
    }

    println!("\n{}\n", RULE);
    Outcome::Unchanged
}

pub fn balance(blockchain: &Blockchain, address: &str, include_pending: bool) -> Result<Outcome> {
    let account = Address::user(address)?;
    let balance = blockchain.balance_of(&account, include_pending);

    println!("\nBalance for {}", account);
    println!("   {:.2}", balance);

    if include_pending {
        let confirmed = blockchain.balance_of(&account, false);
        if confirmed != balance {
            println!("   Confirmed: {:.2}", confirmed);
            println!("   Pending: {:+.2}", balance - confirmed);
        }
    }

    if balance == 0.0 {
        println!("   [INFO] Zero balance");
    }

    println!();
    Ok(Outcome::Unchanged)
}

pub fn history(blockchain: &Blockchain, address: &str) -> Result<Outcome> {
    let account = Address::user(address)?;
    let history = blockchain.get_transaction_history(&account);

    if history.is_empty() {
        println!("No transaction history for {}", account);
        return Ok(Outcome::Unchanged);
    }

    println!("\nTransaction History for {}", account);
    println!("{}", RULE);

    for entry in &history {
        let transaction = &entry.transaction;
        let outgoing = transaction.sender == account;
        let (direction, other_party, sign) = if outgoing {
            ("->", &transaction.receiver, "-")
        } else {
            ("<-", &transaction.sender, "+")
        };

        let block = match entry.block {
            Some(index) => format!("Block #{:3}", index),
            None => "Pending   ".to_string(),
        };

        println!(
            "{} | {} {:15} | {:>10}",
            block,
            direction,
            other_party.as_str(),
            format!("{}{:.2}", sign, transaction.amount)
        );
    }

    println!("{}\n", RULE);
    Ok(Outcome::Unchanged)
}

pub fn validate(blockchain: &Blockchain, verbose: bool) -> Outcome {
    println!("Validating blockchain...");

    let report = blockchain.validate_chain(verbose);
    if report.is_valid() {
        println!("[OK] Blockchain is valid!");
        println!("   Total blocks: {}", blockchain.len());
        println!("   Current difficulty: {}", blockchain.difficulty());
        return Outcome::Unchanged;
    }

    println!("[ERROR] Blockchain validation failed!");
    for failure in report.failures() {
        println!("   {}", failure);
    }

    Outcome::Invalid
}

pub fn stats(blockchain: &Blockchain) -> Outcome {
    let Some(stats) = blockchain.get_mining_stats() else {
        println!("[WARNING] Not enough data for statistics");
        return Outcome::Unchanged;
    };

    println!("\nMining Statistics");
    println!("{}", &RULE[..50]);
    println!("Total blocks:       {}", stats.total_blocks);
    println!("Current difficulty: {}", stats.current_difficulty);
    println!("Average difficulty: {:.2}", stats.avg_difficulty);
    println!("Target block time:  {}s", stats.target_block_time);
    println!("Average block time: {:.2}s", stats.avg_block_time);
    println!("Min block time:     {:.2}s", stats.min_block_time);
    println!("Max block time:     {:.2}s", stats.max_block_time);

    let ratio = stats.avg_block_time / stats.target_block_time;
    if (0.8..=1.2).contains(&ratio) {
        println!("\n[OK] Mining on target");
    } else if ratio < 0.8 {
        println!("\n[FAST] Mining too fast");
    } else {
        println!("\n[SLOW] Mining too slow");
    }

    println!("{}\n", &RULE[..50]);
    Outcome::Unchanged
}

pub fn pending(blockchain: &Blockchain) -> Outcome {
    let pending = blockchain.pending_transactions();

    if pending.is_empty() {
        println!("No pending transactions");
        return Outcome::Unchanged;
    }

    println!("\nPending Transactions ({})", pending.len());
    println!("{}", RULE);

    for (i, transaction) in pending.iter().enumerate() {
        println!("{}. {}", i + 1, transaction);
    }

    let volume: f64 = pending.iter().map(|tx| tx.amount).sum();
    println!("{}", RULE);
    println!("Total volume: {:.2}\n", volume);

    Outcome::Unchanged
}

pub fn reset(blockchain: &mut Blockchain, confirm: bool, config: ChainConfig) -> Result<Outcome> {
    if !confirm {
        println!("[WARNING] This will reset the blockchain to a genesis block!");
        println!("   Use --confirm flag to proceed");
        return Ok(Outcome::Unchanged);
    }

    *blockchain = Blockchain::with_config(config)?;
    println!("[OK] Blockchain reset to genesis block");

    Ok(Outcome::Modified)
}

pub fn export(blockchain: &Blockchain, filename: &Path) -> Result<Outcome> {
    blockchain.export_to_file(filename)?;

    println!("[OK] Blockchain exported to {}", filename.display());
    println!("   Total blocks: {}", blockchain.len());
    println!("   Pending transactions: {}", blockchain.pending_transactions().len());

    Ok(Outcome::Unchanged)
}

pub fn import(blockchain: &mut Blockchain, filename: &Path) -> Result<Outcome> {
    let imported = Blockchain::import_from_file(filename)
        .with_context(|| format!("failed to import {}", filename.display()))?;

    println!("[OK] Blockchain imported from {}", filename.display());
    println!("   Total blocks: {}", imported.len());
    println!("   Pending transactions: {}", imported.pending_transactions().len());
    println!("   Difficulty: {}", imported.difficulty());

    if imported.is_chain_valid(false) {
        println!("   Validation: [VALID]");
    } else {
        println!("   Validation: [INVALID - chain may be corrupted]");
    }

    *blockchain = imported;
    Ok(Outcome::Modified)
}

pub fn summary(blockchain: &Blockchain) -> Outcome {
    let transaction_count: usize = blockchain.blocks().iter().map(|b| b.transaction_count()).sum();
    let volume: f64 = blockchain.blocks().iter().map(|b| b.total_amount()).sum();

    println!("\n{}", RULE);
    println!("{:^70}", "BLOCKCHAIN SUMMARY");
    println!("{}", RULE);
    println!("Blocks:               {}", blockchain.len());
    println!("Mined transactions:   {}", transaction_count);
    println!("Transaction volume:   {:.2}", volume);
    println!("Pending transactions: {}", blockchain.pending_transactions().len());
    println!("Difficulty:           {}", blockchain.difficulty());
    println!("Mining reward:        {}", blockchain.mining_reward());
    println!("Total supply:         {:.2}", blockchain.total_supply());
    println!(
        "Valid:                {}",
        if blockchain.is_chain_valid(false) { "yes" } else { "no" }
    );

    let balances = blockchain.balances();
    if !balances.is_empty() {
        println!("\nBalances:");
        for (address, amount) in balances {
            println!("   {:15} {:>12.2}", address.as_str(), amount);
        }
    }

    println!("{}\n", RULE);
    Outcome::Unchanged
}

pub fn details(blockchain: &Blockchain, block_index: usize) -> Result<Outcome> {
    let Some(block) = blockchain.get_block(block_index) else {
        bail!(
            "block {} does not exist (chain has {} blocks)",
            block_index,
            blockchain.len()
        );
    };

    println!("\n[Block #{}]", block.index);
    println!("   Timestamp: {}", format_time(&block.timestamp));
    println!("   Hash: {}", block.hash);
    println!("   Previous Hash: {}", block.previous_hash);
    println!("   Nonce: {}", block.nonce);
    println!("   Difficulty: {}", block.difficulty);
    println!("   Total amount: {:.2}", block.total_amount());
    println!("   Transactions ({}):", block.transaction_count());

    for (i, transaction) in block.transactions.iter().enumerate() {
        println!("      {}. {}", i + 1, transaction);
        println!("         ID: {}", transaction.transaction_id);
        println!("         Time: {}", format_time(&transaction.timestamp));
    }

    println!();
    Ok(Outcome::Unchanged)
}
