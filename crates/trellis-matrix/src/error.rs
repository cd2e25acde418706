//! Error types for the placement matrix.

use thiserror::Error;

/// Result type for matrix operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by matrix value types and tables.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Position outside `1..=3`
    #[error("invalid position {0}: must be 1, 2 or 3")]
    InvalidPosition(u8),

    /// Referral code with wrong length or characters
    #[error("invalid referral code: {0}")]
    InvalidCode(String),

    /// Commission table that does not cover every depth or pays out too much
    #[error("invalid commission table: {0}")]
    InvalidCommissionTable(String),

    /// Level table that is empty or not strictly ascending
    #[error("invalid level table: {0}")]
    InvalidLevelTable(String),
}
