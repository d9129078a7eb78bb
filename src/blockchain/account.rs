use thiserror::Error;

use std::collections::{BTreeMap, HashMap};

use super::crypto::Address;
use super::transaction::Transaction;

/// Errors that can occur while applying transactions to balances
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AccountError {
    #[error("Insufficient funds for {address}: required {required}, available {available}")]
    InsufficientFunds {
        address: Address,
        required: f64,
        available: f64,
    },
}

/// Running balance table built by replaying transactions
///
/// Starts from the initial balances. The system issuer is never debited.
#[derive(Debug, Clone, Default)]
pub struct BalanceSheet {
    balances: HashMap<Address, f64>,
}

impl BalanceSheet {
    /// Creates a balance table from the initial allocation
    pub fn from_initial(initial_balances: &BTreeMap<String, f64>) -> Self {
        let balances = initial_balances
            .iter()
            .map(|(name, amount)| (Address::User(name.clone()), *amount))
            .collect();

        BalanceSheet { balances }
    }

    /// Gets the balance of an address, zero if it was never seen
    pub fn balance(&self, address: &Address) -> f64 {
        self.balances.get(address).copied().unwrap_or(0.0)
    }

    /// Applies a transaction without checking the sender's funds
    pub fn apply(&mut self, transaction: &Transaction) {
        if !transaction.is_system() {
            *self.balances.entry(transaction.sender.clone()).or_insert(0.0) -= transaction.amount;
        }

        *self.balances.entry(transaction.receiver.clone()).or_insert(0.0) += transaction.amount;
    }

    /// Applies a transaction if the sender can cover it
    ///
    /// # Returns
    ///
    /// Result indicating success, or the shortfall if the sender's balance
    /// would go negative. The table is left untouched on failure.
    pub fn apply_checked(&mut self, transaction: &Transaction) -> Result<(), AccountError> {
        if !transaction.is_system() {
            let available = self.balance(&transaction.sender);

            if available < transaction.amount {
                return Err(AccountError::InsufficientFunds {
                    address: transaction.sender.clone(),
                    required: transaction.amount,
                    available,
                });
            }
        }

        self.apply(transaction);
        Ok(())
    }

    /// Applies every transaction in order without checking funds
    pub fn apply_all<'a, I>(&mut self, transactions: I)
    where
        I: IntoIterator<Item = &'a Transaction>,
    {
        for transaction in transactions {
            self.apply(transaction);
        }
    }

    /// Gets all user balances sorted by address
    pub fn into_sorted(self) -> Vec<(Address, f64)> {
        let mut balances: Vec<(Address, f64)> = self
            .balances
            .into_iter()
            .filter(|(address, _)| !address.is_system())
            .collect();

        balances.sort_by(|a, b| a.0.cmp(&b.0));
        balances
    }
}
