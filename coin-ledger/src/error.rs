//! Error types for the coin ledger

use thiserror::Error;
use uuid::Uuid;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Account, entry or request not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Debit would push the balance below the allowed floor
    #[error("Insufficient balance for account {account_id}: have {available}, need {required}")]
    InsufficientBalance {
        /// Account that was short
        account_id: Uuid,
        /// Balance at the time of the attempt
        available: i64,
        /// Coins the operation required
        required: i64,
    },

    /// A (account, code) redemption entry already exists
    #[error("Code {code} already redeemed by account {account_id}")]
    AlreadyRedeemed {
        /// Redeeming account
        account_id: Uuid,
        /// Redemption code
        code: String,
    },

    /// Concurrent-update race exhausted the bounded retries
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Entry draft violates a structural rule (zero amount, missing code, ...)
    #[error("Invalid entry: {0}")]
    InvalidEntry(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}
