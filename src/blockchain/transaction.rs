use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use std::fmt;

use super::crypto::{hash_canonical, Address};

/// Receiver of the genesis transaction
pub const GENESIS_RECEIVER: &str = "Genesis";

/// Errors that can occur during transaction operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransactionError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid transfer: self-transfer by {0}")]
    SelfTransfer(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Address is reserved for system issuance: {0}")]
    ReservedAddress(String),
}

/// Represents a value transfer between two addresses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Sender's address
    pub sender: Address,

    /// Receiver's address
    pub receiver: Address,

    /// Amount being transferred
    pub amount: f64,

    /// Timestamp when the transaction was created
    pub timestamp: DateTime<Utc>,

    /// Content hash of sender, receiver, amount and timestamp
    pub transaction_id: String,
}

/// The hashed part of a transaction, in its fixed field order
#[derive(Serialize)]
struct TransactionBody<'a> {
    sender: &'a Address,
    receiver: &'a Address,
    amount: f64,
    timestamp: &'a DateTime<Utc>,
}

impl Transaction {
    /// Creates a new transaction stamped with the current time
    ///
    /// # Arguments
    ///
    /// * `sender` - The address of the sender
    /// * `receiver` - The address of the receiver
    /// * `amount` - The amount to transfer
    ///
    /// # Returns
    ///
    /// A new Transaction instance
    pub fn new(sender: Address, receiver: Address, amount: f64) -> Self {
        Self::with_timestamp(sender, receiver, amount, Utc::now())
    }

    /// Creates a new transaction with an explicit timestamp
    pub fn with_timestamp(
        sender: Address,
        receiver: Address,
        amount: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let transaction_id = Self::compute_id(&sender, &receiver, amount, &timestamp);

        Transaction {
            sender,
            receiver,
            amount,
            timestamp,
            transaction_id,
        }
    }

    /// Creates a reward transaction issued by the system
    ///
    /// # Arguments
    ///
    /// * `receiver` - The address of the miner
    /// * `amount` - The reward amount
    pub fn new_reward(receiver: Address, amount: f64) -> Self {
        Self::new(Address::System, receiver, amount)
    }

    /// Creates the zero-value transaction carried by the genesis block
    pub fn genesis(timestamp: DateTime<Utc>) -> Self {
        Self::with_timestamp(
            Address::System,
            Address::User(GENESIS_RECEIVER.to_string()),
            0.0,
            timestamp,
        )
    }

    fn compute_id(
        sender: &Address,
        receiver: &Address,
        amount: f64,
        timestamp: &DateTime<Utc>,
    ) -> String {
        hash_canonical(&TransactionBody {
            sender,
            receiver,
            amount,
            timestamp,
        })
    }

    /// Recomputes the identifier from the current field values
    pub fn calculate_id(&self) -> String {
        Self::compute_id(&self.sender, &self.receiver, self.amount, &self.timestamp)
    }

    /// Checks if the stored identifier matches the content
    pub fn has_valid_id(&self) -> bool {
        self.transaction_id == self.calculate_id()
    }

    /// Checks that the transaction is well-formed
    ///
    /// The amount must be strictly positive (the system may issue zero) and
    /// the sender must differ from the receiver. Balances are not checked here.
    pub fn is_valid(&self) -> Result<(), TransactionError> {
        let positive = if self.is_system() {
            self.amount >= 0.0
        } else {
            self.amount > 0.0
        };

        if !positive || !self.amount.is_finite() {
            return Err(TransactionError::InvalidAmount(format!(
                "non-positive amount: {}",
                self.amount
            )));
        }

        if self.sender == self.receiver {
            return Err(TransactionError::SelfTransfer(self.sender.to_string()));
        }

        Ok(())
    }

    /// Checks if the transaction is issued by the system
    pub fn is_system(&self) -> bool {
        self.sender.is_system()
    }

    /// Checks if the address is the sender or the receiver
    pub fn involves(&self, address: &Address) -> bool {
        &self.sender == address || &self.receiver == address
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}: {}", self.sender, self.receiver, self.amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn user(name: &str) -> Address {
        Address::User(name.to_string())
    }

    #[test]
    fn test_new_transaction() {
        let transaction = Transaction::new(user("Alice"), user("Bob"), 10.5);

        assert_eq!(transaction.sender, user("Alice"));
        assert_eq!(transaction.receiver, user("Bob"));
        assert_eq!(transaction.amount, 10.5);
        assert_eq!(transaction.transaction_id.len(), 64);
        assert!(transaction.is_valid().is_ok());
    }

    #[test]
    fn test_id_is_deterministic() {
        let timestamp = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let first = Transaction::with_timestamp(user("Alice"), user("Bob"), 30.0, timestamp);
        let second = Transaction::with_timestamp(user("Alice"), user("Bob"), 30.0, timestamp);
        let other = Transaction::with_timestamp(user("Alice"), user("Bob"), 31.0, timestamp);

        assert_eq!(first.transaction_id, second.transaction_id);
        assert_ne!(first.transaction_id, other.transaction_id);
        assert!(first.has_valid_id());
    }

    #[test]
    fn test_invalid_transactions() {
        let zero = Transaction::new(user("Alice"), user("Bob"), 0.0);
        assert!(matches!(zero.is_valid(), Err(TransactionError::InvalidAmount(_))));

        let negative = Transaction::new(user("Alice"), user("Bob"), -5.0);
        assert!(matches!(negative.is_valid(), Err(TransactionError::InvalidAmount(_))));

        let nan = Transaction::new(user("Alice"), user("Bob"), f64::NAN);
        assert!(matches!(nan.is_valid(), Err(TransactionError::InvalidAmount(_))));

        let own = Transaction::new(user("Alice"), user("Alice"), 10.0);
        assert!(matches!(own.is_valid(), Err(TransactionError::SelfTransfer(_))));

        // The amount is checked before the addresses
        let both = Transaction::new(user("Alice"), user("Alice"), 0.0);
        assert!(matches!(both.is_valid(), Err(TransactionError::InvalidAmount(_))));
    }

    #[test]
    fn test_rejection_reasons() {
        let zero = Transaction::new(user("Alice"), user("Bob"), 0.0);
        let reason = zero.is_valid().unwrap_err().to_string();
        assert!(reason.contains("non-positive amount"), "{}", reason);

        let own = Transaction::new(user("Alice"), user("Alice"), 10.0);
        let reason = own.is_valid().unwrap_err().to_string();
        assert!(reason.contains("self-transfer"), "{}", reason);
        assert!(reason.contains("Alice"), "{}", reason);
    }

    #[test]
    fn test_system_transactions() {
        let genesis = Transaction::genesis(Utc::now());
        assert!(genesis.is_system());
        assert_eq!(genesis.receiver, user(GENESIS_RECEIVER));
        assert!(genesis.is_valid().is_ok());

        let reward = Transaction::new_reward(user("Miner1"), 10.0);
        assert!(reward.is_system());
        assert!(reward.involves(&user("Miner1")));
        assert!(!reward.involves(&user("Alice")));
    }

    #[test]
    fn test_serialization_keeps_id() {
        let transaction = Transaction::new(user("Alice"), user("Bob"), 12.25);
        let json = serde_json::to_string(&transaction).unwrap();
        let restored: Transaction = serde_json::from_str(&json).unwrap();

        assert_eq!(restored, transaction);
        assert!(restored.has_valid_id());
    }

    #[test]
    fn test_tampered_id_is_detected() {
        let mut transaction = Transaction::new(user("Alice"), user("Bob"), 12.0);
        transaction.amount = 1200.0;

        assert!(!transaction.has_valid_id());
    }
}
