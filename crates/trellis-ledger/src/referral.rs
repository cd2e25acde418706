//! Referral code allocation.
//!
//! Codes are random draws from the unambiguous alphabet. Each draw is claimed
//! by reading `code:{CODE}` for update and writing the owner, so two
//! transactions that draw the same code cannot both commit.

use crate::error::{Error, Result};
use crate::models::Participant;
use crate::storage::Txn;
use trellis_matrix::{CodeSource, ReferralCode};

/// Outcome of one claim attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimAttempt {
    /// The code now belongs to the participant
    Claimed,
    /// Another participant already holds it
    Taken,
}

/// Draws and claims unique referral codes.
pub struct ReferralCodeAllocator {
    max_attempts: u32,
}

impl ReferralCodeAllocator {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    /// Try to bind `code` to `participant_id`.
    pub fn try_claim(&self, txn: &Txn<'_>, code: &ReferralCode, participant_id: &str) -> Result<ClaimAttempt> {
        match txn.code_owner(code)? {
            Some(owner) if owner == participant_id => Ok(ClaimAttempt::Claimed),
            Some(_) => Ok(ClaimAttempt::Taken),
            None => {
                txn.put_code_owner(code, participant_id)?;
                Ok(ClaimAttempt::Claimed)
            }
        }
    }

    /// Give `participant` a code, drawing until one is free.
    ///
    /// A participant that already holds a code keeps it and nothing is
    /// written. Otherwise the code is set on `participant`; the caller
    /// stores the record.
    pub fn generate<S>(&self, txn: &Txn<'_>, participant: &mut Participant, source: &mut S) -> Result<ReferralCode>
    where
        S: CodeSource + ?Sized,
    {
        if let Some(code) = &participant.referral_code {
            return Ok(code.clone());
        }

        for attempt in 1..=self.max_attempts {
            let code = source.draw();
            match self.try_claim(txn, &code, &participant.id)? {
                ClaimAttempt::Claimed => {
                    tracing::debug!("Assigned code {} to {} (attempt {})", code, participant.id, attempt);
                    participant.referral_code = Some(code.clone());
                    return Ok(code);
                }
                ClaimAttempt::Taken => {
                    tracing::debug!("Code {} already taken, drawing again", code);
                }
            }
        }

        tracing::warn!(
            "No free referral code for {} after {} draws",
            participant.id,
            self.max_attempts
        );
        Err(Error::AllocationExhausted {
            attempts: self.max_attempts,
        })
    }

    /// Owner of a code, or `UnknownReferralCode`.
    pub fn resolve(txn: &Txn<'_>, code: &str) -> Result<String> {
        let parsed = ReferralCode::parse(code).map_err(|_| Error::UnknownReferralCode(code.to_string()))?;
        txn.code_owner(&parsed)?
            .ok_or_else(|| Error::UnknownReferralCode(code.to_string()))
    }
}
