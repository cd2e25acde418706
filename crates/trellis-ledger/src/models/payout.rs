//! Pool payout plan and completion marker.

use serde::{Deserialize, Serialize};

/// Frozen snapshot of a period's payout, written before any entry.
///
/// Resumed runs reuse the stored plan; late orders for the period do not
/// change it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PayoutPlan {
    /// Period id
    pub period: u64,

    /// Pool collected for the period
    pub pool_total: u64,

    /// Eligible participants, sorted by id
    pub eligible: Vec<String>,

    /// Amount paid to each eligible participant
    pub share: u64,

    /// Remainder left in the pool after equal shares
    pub unallocated: u64,

    /// Planning time (unix millis)
    pub planned_at: u64,
}

impl PayoutPlan {
    /// Split `pool_total` equally across `eligible`.
    pub fn new(period: u64, pool_total: u64, mut eligible: Vec<String>) -> Self {
        eligible.sort();
        eligible.dedup();
        let (share, unallocated) = if eligible.is_empty() {
            (0, pool_total)
        } else {
            let n = eligible.len() as u64;
            (pool_total / n, pool_total % n)
        };
        Self {
            period,
            pool_total,
            eligible,
            share,
            unallocated,
            planned_at: super::unix_millis(),
        }
    }
}

/// Completion marker for a period. Written last.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PoolPayoutRun {
    /// Period id
    pub period: u64,

    /// Participants paid
    pub paid_count: usize,

    /// Sum of all payout entries
    pub total_paid: u64,

    /// Per-participant share
    pub share: u64,

    /// Pool left unpaid
    pub unallocated: u64,

    /// Completion time (unix millis)
    pub completed_at: u64,
}
