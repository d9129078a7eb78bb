use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use std::fmt;

use super::transaction::TransactionError;

/// Text form of the reserved issuer used for genesis and mining rewards
pub const SYSTEM_ADDRESS: &str = "System";

/// Represents a ledger address
///
/// Addresses are opaque names. User input only ever produces `User`; the
/// reserved issuer exists as its own variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Address {
    /// The reserved issuer of genesis and reward value
    System,

    /// An ordinary participant
    User(String),
}

impl Address {
    /// Creates a user address from untrusted input
    ///
    /// # Arguments
    ///
    /// * `name` - The address text
    ///
    /// # Returns
    ///
    /// The address, or an error if the name is empty or reserved
    pub fn user(name: &str) -> Result<Self, TransactionError> {
        let name = name.trim();

        if name.is_empty() {
            return Err(TransactionError::InvalidAddress(
                "address cannot be empty".to_string(),
            ));
        }

        if name == SYSTEM_ADDRESS {
            return Err(TransactionError::ReservedAddress(name.to_string()));
        }

        Ok(Address::User(name.to_string()))
    }

    /// Checks if this is the reserved issuer
    pub fn is_system(&self) -> bool {
        matches!(self, Address::System)
    }

    /// Gets the address text
    pub fn as_str(&self) -> &str {
        match self {
            Address::System => SYSTEM_ADDRESS,
            Address::User(name) => name,
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// Snapshots store addresses as plain strings.
impl From<String> for Address {
    fn from(value: String) -> Self {
        if value == SYSTEM_ADDRESS {
            Address::System
        } else {
            Address::User(value)
        }
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        match address {
            Address::System => SYSTEM_ADDRESS.to_string(),
            Address::User(name) => name,
        }
    }
}

/// Hashes the canonical JSON form of a value
///
/// The value is serialized with its derived field order, which is the same
/// encoding used for snapshots.
///
/// # Returns
///
/// The SHA-256 digest as a lowercase hexadecimal string
pub fn hash_canonical<T: Serialize>(value: &T) -> String {
    let mut hasher = Sha256::new();

    // Writing into a hasher never fails and every hashed type has string keys.
    serde_json::to_writer(&mut hasher, value).expect("canonical form is always serializable");

    hex::encode(hasher.finalize())
}

/// Checks if a hexadecimal hash starts with `difficulty` zero characters
pub fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
    let difficulty = difficulty as usize;

    hash.len() >= difficulty && hash.bytes().take(difficulty).all(|b| b == b'0')
}
