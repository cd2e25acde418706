//! Withdrawal requests.

use serde::{Deserialize, Serialize};

/// Withdrawal lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalStatus {
    Pending,
    Approved,
    Rejected,
}

impl WithdrawalStatus {
    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalStatus::Pending => "pending",
            WithdrawalStatus::Approved => "approved",
            WithdrawalStatus::Rejected => "rejected",
        }
    }
}

/// A request to pay out part of a wallet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WithdrawalRequest {
    /// Request id
    pub id: String,

    /// Requesting participant
    pub participant_id: String,

    /// Requested amount in minor units
    pub amount: u64,

    /// Current state
    pub status: WithdrawalStatus,

    /// Request time (unix millis)
    pub created_at: u64,

    /// Approval or rejection time
    pub decided_at: Option<u64>,

    /// Ledger entry written on approval
    pub entry_id: Option<String>,
}

impl WithdrawalRequest {
    /// Create a pending request.
    pub fn new(id: String, participant_id: String, amount: u64) -> Self {
        Self {
            id,
            participant_id,
            amount,
            status: WithdrawalStatus::Pending,
            created_at: super::unix_millis(),
            decided_at: None,
            entry_id: None,
        }
    }
}
