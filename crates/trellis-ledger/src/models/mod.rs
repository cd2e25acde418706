//! Persistent records for the Trellis engine.
//!
//! # Core Types
//!
//! - [`Participant`] - Member with wallet, code, counters and level
//! - [`MatrixNode`] - A member's fixed place in the ternary tree
//! - [`HierarchyEdge`] - Ancestor/descendant pair up to depth 5
//! - [`LedgerEntry`] - Immutable monetary record
//!
//! # Event and Batch Types
//!
//! - [`PaymentConfirmed`] - Purchase trigger consumed by the commission engine
//! - [`OrderRecord`] - Processed-order marker with the entries it produced
//! - [`PayoutPlan`] / [`PoolPayoutRun`] - Frozen plan and completion marker
//! - [`WithdrawalRequest`] - Pending/approved/rejected payout request

mod ledger_entry;
mod order;
mod participant;
mod payout;
mod placement;
mod withdrawal;

pub use ledger_entry::{EntryCause, LedgerEntry, LedgerKind};
pub use order::{OrderRecord, PaymentConfirmed};
pub use participant::Participant;
pub use payout::{PayoutPlan, PoolPayoutRun};
pub use placement::{HierarchyEdge, MatrixNode};
pub use withdrawal::{WithdrawalRequest, WithdrawalStatus};

use crate::error::{Error, Result};
use std::time::{SystemTime, UNIX_EPOCH};

/// Longest accepted participant or order id.
pub const MAX_ID_LEN: usize = 128;

/// Current time in milliseconds since the unix epoch.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Current time in seconds since the unix epoch.
pub fn unix_secs() -> u64 {
    unix_millis() / 1000
}

/// Check an externally supplied id before it becomes part of a storage key.
///
/// Ids are non-empty, at most [`MAX_ID_LEN`] bytes, and contain no `:` or
/// whitespace (`:` separates key segments).
pub fn validate_id(kind: &str, id: &str) -> Result<()> {
    if id.is_empty() || id.len() > MAX_ID_LEN {
        return Err(Error::InvalidInput(format!(
            "{} id must be 1..={} bytes",
            kind, MAX_ID_LEN
        )));
    }
    if id.contains(':') || id.chars().any(char::is_whitespace) {
        return Err(Error::InvalidInput(format!(
            "{} id {:?} contains ':' or whitespace",
            kind, id
        )));
    }
    Ok(())
}

/// Convert an unsigned amount to a signed ledger amount.
pub fn signed(amount: u64) -> Result<i64> {
    i64::try_from(amount).map_err(|_| Error::InvalidInput(format!("amount {} too large", amount)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_validation() {
        assert!(validate_id("participant", "alice").is_ok());
        assert!(validate_id("participant", "").is_err());
        assert!(validate_id("participant", "a:b").is_err());
        assert!(validate_id("participant", "a b").is_err());
        assert!(validate_id("participant", &"x".repeat(MAX_ID_LEN + 1)).is_err());
    }

    #[test]
    fn signed_rejects_overflow() {
        assert_eq!(signed(42).unwrap(), 42);
        assert!(signed(u64::MAX).is_err());
    }
}
