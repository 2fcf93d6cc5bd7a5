//! Error types for the reward engine

use thiserror::Error;

/// Result type for reward-engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Reward-engine errors
///
/// Business-rule failures are expected outcomes returned to the caller
/// and never retried internally.
#[derive(Error, Debug)]
pub enum Error {
    /// Ledger error (balance, storage, redemption uniqueness)
    #[error("Ledger error: {0}")]
    Ledger(#[from] coin_ledger::Error),

    /// Daily link limit reached
    #[error("Daily link quota exceeded: {used}/{limit}")]
    QuotaExceeded {
        /// Links already issued today
        used: u32,
        /// Daily limit
        limit: u32,
    },

    /// Code is not in the issued set
    #[error("Invalid code: {0}")]
    InvalidCode(String),

    /// Withdrawal amount under the configured floor
    #[error("Withdrawal below minimum: requested {requested}, minimum {minimum}")]
    BelowMinimum {
        /// Configured floor
        minimum: i64,
        /// Amount requested
        requested: i64,
    },

    /// Illegal state-machine move
    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition {
        /// Current status
        from: String,
        /// Requested status
        to: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
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
