//! Error types for the ledger engine.

use thiserror::Error;

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in ledger operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The tree has no root; bootstrap one from the owner account
    #[error("placement tree has no root")]
    RootMissing,

    /// Every drawn referral code was already taken
    #[error("referral code allocation exhausted after {attempts} attempts")]
    AllocationExhausted { attempts: u32 },

    /// Another transaction committed a conflicting write first
    #[error("concurrent conflict: {0}")]
    ConcurrentConflict(String),

    /// Transaction did not finish in time
    #[error("transaction timed out: {0}")]
    Timeout(String),

    /// Unknown participant
    #[error("participant not found: {0}")]
    ParticipantNotFound(String),

    /// Unknown order
    #[error("order not found: {0}")]
    OrderNotFound(String),

    /// Unknown withdrawal request
    #[error("withdrawal request not found: {0}")]
    WithdrawalNotFound(String),

    /// Sponsor code does not belong to anyone
    #[error("unknown referral code: {0}")]
    UnknownReferralCode(String),

    /// Wallet cannot cover a debit
    #[error("insufficient balance for {participant_id}: have {balance}, need {requested}")]
    InsufficientBalance {
        participant_id: String,
        balance: i64,
        requested: u64,
    },

    /// Withdrawal status change that is not allowed
    #[error("withdrawal {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: &'static str,
        to: &'static str,
    },

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invalid configuration
    #[error("Config error: {0}")]
    Config(String),

    /// Matrix value or table error
    #[error("Matrix error: {0}")]
    Matrix(#[from] trellis_matrix::Error),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether re-running the whole operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::ConcurrentConflict(_) | Error::Timeout(_))
    }
}

impl From<rocksdb::Error> for Error {
    fn from(e: rocksdb::Error) -> Self {
        match e.kind() {
            rocksdb::ErrorKind::Busy | rocksdb::ErrorKind::TryAgain => {
                Error::ConcurrentConflict(e.to_string())
            }
            rocksdb::ErrorKind::TimedOut => Error::Timeout(e.to_string()),
            _ => Error::Storage(e.to_string()),
        }
    }
}
