//! Per-depth commission rates in basis points.

use crate::error::{Error, Result};
use crate::MAX_DEPTH;

/// Basis points in 100%.
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Apply a basis-point rate to an amount, rounding down.
#[inline]
pub fn apply_bps(amount: u64, bps: u16) -> u64 {
    ((amount as u128 * bps as u128) / BPS_DENOMINATOR as u128) as u64
}

/// Commission rate for each ancestor depth `1..=MAX_DEPTH`.
///
/// No default: rates are supplied by the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CommissionTable {
    bps: [u16; MAX_DEPTH as usize],
}

impl CommissionTable {
    /// Create a table, rejecting totals above 100%.
    pub fn new(bps: [u16; MAX_DEPTH as usize]) -> Result<Self> {
        let total: u64 = bps.iter().map(|b| *b as u64).sum();
        if total > BPS_DENOMINATOR {
            return Err(Error::InvalidCommissionTable(format!(
                "total {} bps exceeds {}",
                total, BPS_DENOMINATOR
            )));
        }
        Ok(Self { bps })
    }

    /// Parse a comma-separated list of 5 rates, e.g. `"1000,500,300,200,100"`.
    pub fn parse(s: &str) -> Result<Self> {
        let rates = s
            .split(',')
            .map(|p| {
                p.trim()
                    .parse::<u16>()
                    .map_err(|e| Error::InvalidCommissionTable(format!("{:?}: {}", p.trim(), e)))
            })
            .collect::<Result<Vec<_>>>()?;

        let bps: [u16; MAX_DEPTH as usize] = rates.as_slice().try_into().map_err(|_| {
            Error::InvalidCommissionTable(format!(
                "expected {} rates, got {}",
                MAX_DEPTH,
                rates.len()
            ))
        })?;
        Self::new(bps)
    }

    /// Rate for an ancestor depth, `None` outside `1..=MAX_DEPTH`.
    pub fn rate(&self, depth: u8) -> Option<u16> {
        if depth == 0 {
            return None;
        }
        self.bps.get(depth as usize - 1).copied()
    }

    /// Commission owed to the ancestor at `depth` for an order of `amount`.
    pub fn share(&self, amount: u64, depth: u8) -> u64 {
        self.rate(depth).map(|bps| apply_bps(amount, bps)).unwrap_or(0)
    }

    /// Sum of all rates.
    pub fn total_bps(&self) -> u64 {
        self.bps.iter().map(|b| *b as u64).sum()
    }

    /// Shares for the depths that have an ancestor: `1..=present`.
    pub fn split(&self, amount: u64, present: u8) -> Vec<(u8, u64)> {
        (1..=present.min(MAX_DEPTH))
            .map(|depth| (depth, self.share(amount, depth)))
            .collect()
    }

    /// Shares of the depths with no ancestor: `present + 1..=MAX_DEPTH`.
    pub fn unclaimed(&self, amount: u64, present: u8) -> u64 {
        (present.saturating_add(1)..=MAX_DEPTH)
            .map(|depth| self.share(amount, depth))
            .sum()
    }

    /// Raw rates, depth 1 first.
    pub fn rates(&self) -> &[u16] {
        &self.bps
    }
}
