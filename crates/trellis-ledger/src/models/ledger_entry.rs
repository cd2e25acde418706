//! Ledger entries.
//!
//! Entries are append-only. The id is a Blake3 digest of kind, participant
//! and cause, so replaying the same cause produces the same id and storage
//! refuses the second write.

use serde::{Deserialize, Serialize};

/// Kind of monetary movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerKind {
    Commission,
    PoolPayout,
    Bonus,
    Withdrawal,
}

impl LedgerKind {
    /// Stable name used in entry ids.
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerKind::Commission => "commission",
            LedgerKind::PoolPayout => "pool_payout",
            LedgerKind::Bonus => "bonus",
            LedgerKind::Withdrawal => "withdrawal",
        }
    }
}

/// What caused an entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntryCause {
    /// Commission from an order; depth 0 marks an unclaimed-share credit
    Order { order_id: String, depth: u8 },
    /// Pool payout for a period
    PayoutRun { period: u64 },
    /// Manual bonus with an external reference
    Bonus { reference: String },
    /// Approved withdrawal request
    Withdrawal { request_id: String },
}

impl EntryCause {
    /// Canonical text form, used for hashing.
    pub fn display(&self) -> String {
        match self {
            EntryCause::Order { order_id, depth } => format!("order#{}#{}", order_id, depth),
            EntryCause::PayoutRun { period } => format!("payout#{}", period),
            EntryCause::Bonus { reference } => format!("bonus#{}", reference),
            EntryCause::Withdrawal { request_id } => format!("withdrawal#{}", request_id),
        }
    }
}

/// An immutable monetary record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerEntry {
    /// Deterministic id (hex)
    pub id: String,

    /// Credited or debited participant
    pub participant_id: String,

    /// Signed amount in minor units
    pub amount: i64,

    /// Entry kind
    pub kind: LedgerKind,

    /// Causal reference
    pub cause: EntryCause,

    /// Creation time (unix millis)
    pub created_at: u64,
}

impl LedgerEntry {
    /// Create an entry stamped with the current time.
    pub fn new(participant_id: String, amount: i64, kind: LedgerKind, cause: EntryCause) -> Self {
        let id = Self::entry_id(kind, &participant_id, &cause);
        Self {
            id,
            participant_id,
            amount,
            kind,
            cause,
            created_at: super::unix_millis(),
        }
    }

    /// Deterministic id for a (kind, participant, cause) triple.
    pub fn entry_id(kind: LedgerKind, participant_id: &str, cause: &EntryCause) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(kind.as_str().as_bytes());
        hasher.update(b":");
        hasher.update(participant_id.as_bytes());
        hasher.update(b":");
        hasher.update(cause.display().as_bytes());
        hex::encode(&hasher.finalize().as_bytes()[..16])
    }
}
