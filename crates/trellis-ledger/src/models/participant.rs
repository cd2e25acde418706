//! Participant model.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use trellis_matrix::{Level, ReferralCode};

/// A network member.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Participant {
    /// Unique identifier (no `:`)
    pub id: String,

    /// Whose code was used at signup; does not affect tree position
    pub sponsor_id: Option<String>,

    /// Wallet balance in minor currency units
    pub wallet_balance: i64,

    /// Set once the joining order has been processed
    pub active: bool,

    /// Issued on activation
    pub referral_code: Option<ReferralCode>,

    /// Descendants within the indexed depth
    pub team_size: u64,

    /// Immediate children in the tree (0..=3)
    pub direct_children: u8,

    /// Current rank, never lowered
    pub level: Level,

    /// Confirmed payments processed so far
    pub confirmed_payments: u64,

    /// Signup time (unix millis)
    pub created_at: u64,

    /// Activation time (unix millis)
    pub activated_at: Option<u64>,
}

impl Participant {
    /// Create an inactive participant.
    pub fn new(id: String, sponsor_id: Option<String>) -> Self {
        Self {
            id,
            sponsor_id,
            wallet_balance: 0,
            active: false,
            referral_code: None,
            team_size: 0,
            direct_children: 0,
            level: 0,
            confirmed_payments: 0,
            created_at: super::unix_millis(),
            activated_at: None,
        }
    }

    /// Add a signed amount to the wallet.
    pub fn credit(&mut self, amount: i64) -> Result<()> {
        self.wallet_balance = self.wallet_balance.checked_add(amount).ok_or_else(|| {
            Error::InvalidInput(format!("wallet overflow for {}", self.id))
        })?;
        Ok(())
    }

    /// Remove an amount from the wallet, refusing to go negative.
    pub fn debit(&mut self, amount: u64) -> Result<()> {
        let signed = super::signed(amount)?;
        if self.wallet_balance < signed {
            return Err(Error::InsufficientBalance {
                participant_id: self.id.clone(),
                balance: self.wallet_balance,
                requested: amount,
            });
        }
        self.wallet_balance -= signed;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_participant_is_inactive() {
        let p = Participant::new("alice".into(), Some("root".into()));
        assert!(!p.active);
        assert!(p.referral_code.is_none());
        assert_eq!(p.level, 0);
        assert_eq!(p.sponsor_id.as_deref(), Some("root"));
    }

    #[test]
    fn debit_refuses_overdraft() {
        let mut p = Participant::new("alice".into(), None);
        p.credit(500).unwrap();
        assert!(matches!(p.debit(600), Err(Error::InsufficientBalance { .. })));
        p.debit(500).unwrap();
        assert_eq!(p.wallet_balance, 0);
    }

    #[test]
    fn serialize_deserialize() {
        let mut p = Participant::new("bob".into(), None);
        p.referral_code = Some(ReferralCode::parse("ABCD2345").unwrap());
        let json = serde_json::to_string(&p).unwrap();
        let parsed: Participant = serde_json::from_str(&json).unwrap();
        assert_eq!(p, parsed);
    }
}
