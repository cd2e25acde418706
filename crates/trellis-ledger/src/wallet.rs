//! Manual bonuses and withdrawal requests.
//!
//! Both move money through the same append-only ledger as commissions.
//! A withdrawal only touches the wallet when it is approved: the approval
//! writes a negative `Withdrawal` entry and debits the balance in one
//! transaction.

use crate::error::{Error, Result};
use crate::models::{
    signed, unix_millis, validate_id, EntryCause, LedgerEntry, LedgerKind, WithdrawalRequest,
    WithdrawalStatus,
};
use crate::storage::Txn;

/// Result of a bonus grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BonusOutcome {
    Granted(LedgerEntry),
    /// The same participant and reference were granted before
    AlreadyProcessed(String),
}

/// Credit a one-off bonus. `reference` makes the grant idempotent.
pub fn grant_bonus(txn: &Txn<'_>, participant_id: &str, amount: u64, reference: &str) -> Result<BonusOutcome> {
    validate_id("bonus reference", reference)?;
    if amount == 0 {
        return Err(Error::InvalidInput("bonus amount must be positive".into()));
    }

    let cause = EntryCause::Bonus {
        reference: reference.to_string(),
    };
    let entry_id = LedgerEntry::entry_id(LedgerKind::Bonus, participant_id, &cause);
    if txn.entry_exists(&entry_id)? {
        tracing::info!("Bonus {} for {} already granted", reference, participant_id);
        return Ok(BonusOutcome::AlreadyProcessed(entry_id));
    }

    let amount = signed(amount)?;
    let mut participant = txn.require_participant(participant_id)?;
    participant.credit(amount)?;

    let entry = LedgerEntry::new(participant_id.to_string(), amount, LedgerKind::Bonus, cause);
    txn.append_entry(&entry)?;
    txn.put_participant(&participant)?;

    tracing::info!("Granted bonus {} of {} to {}", reference, amount, participant_id);
    Ok(BonusOutcome::Granted(entry))
}

/// File a pending withdrawal request.
///
/// The balance is checked here and again at approval, since other
/// withdrawals may be approved in between.
pub fn request_withdrawal(txn: &Txn<'_>, participant_id: &str, amount: u64) -> Result<WithdrawalRequest> {
    if amount == 0 {
        return Err(Error::InvalidInput("withdrawal amount must be positive".into()));
    }
    let participant = txn.require_participant(participant_id)?;
    if participant.wallet_balance < signed(amount)? {
        return Err(Error::InsufficientBalance {
            participant_id: participant.id,
            balance: participant.wallet_balance,
            requested: amount,
        });
    }

    let seq = txn.next_withdrawal_seq()?;
    let request = WithdrawalRequest::new(format!("w{:010}", seq), participant.id, amount);
    txn.put_withdrawal(&request)?;

    tracing::info!(
        "Withdrawal {} of {} requested by {}",
        request.id,
        amount,
        request.participant_id
    );
    Ok(request)
}

fn pending(txn: &Txn<'_>, id: &str, to: WithdrawalStatus) -> Result<WithdrawalRequest> {
    let request = txn
        .withdrawal(id)?
        .ok_or_else(|| Error::WithdrawalNotFound(id.to_string()))?;
    if request.status != WithdrawalStatus::Pending {
        return Err(Error::InvalidTransition {
            id: id.to_string(),
            from: request.status.as_str(),
            to: to.as_str(),
        });
    }
    Ok(request)
}

/// Approve a pending request, debiting the wallet.
pub fn approve_withdrawal(txn: &Txn<'_>, id: &str) -> Result<(WithdrawalRequest, LedgerEntry)> {
    let mut request = pending(txn, id, WithdrawalStatus::Approved)?;

    let mut participant = txn.require_participant(&request.participant_id)?;
    participant.debit(request.amount)?;

    let entry = LedgerEntry::new(
        request.participant_id.clone(),
        -signed(request.amount)?,
        LedgerKind::Withdrawal,
        EntryCause::Withdrawal {
            request_id: request.id.clone(),
        },
    );
    txn.append_entry(&entry)?;
    txn.put_participant(&participant)?;

    request.status = WithdrawalStatus::Approved;
    request.decided_at = Some(unix_millis());
    request.entry_id = Some(entry.id.clone());
    txn.put_withdrawal(&request)?;

    tracing::info!("Withdrawal {} approved for {}", request.id, request.participant_id);
    Ok((request, entry))
}

/// Reject a pending request. The wallet is untouched.
pub fn reject_withdrawal(txn: &Txn<'_>, id: &str) -> Result<WithdrawalRequest> {
    let mut request = pending(txn, id, WithdrawalStatus::Rejected)?;
    request.status = WithdrawalStatus::Rejected;
    request.decided_at = Some(unix_millis());
    txn.put_withdrawal(&request)?;

    tracing::info!("Withdrawal {} rejected", request.id);
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Participant;
    use crate::storage::Storage;
    use tempfile::tempdir;

    fn with_balance(storage: &Storage, id: &str, balance: u64) {
        let txn = storage.begin();
        txn.put_participant(&Participant::new(id.into(), None)).unwrap();
        if balance > 0 {
            grant_bonus(&txn, id, balance, "seed").unwrap();
        }
        txn.commit().unwrap();
    }

    #[test]
    fn bonus_is_granted_once() {
        let dir = tempdir().unwrap();
        let storage = Storage::open(dir.path()).unwrap();
        with_balance(&storage, "a", 0);

        let txn = storage.begin();
        assert!(matches!(grant_bonus(&txn, "a", 250, "promo-1").unwrap(), BonusOutcome::Granted(_)));
        txn.commit().unwrap();

        let txn = storage.begin();
        assert!(matches!(
            grant_bonus(&txn, "a", 250, "promo-1").unwrap(),
            BonusOutcome::AlreadyProcessed(_)
        ));
        txn.commit().unwrap();

        assert_eq!(storage.get_participant("a").unwrap().unwrap().wallet_balance, 250);
        assert_eq!(storage.ledger_for("a").unwrap().len(), 1);
    }

    #[test]
    fn approval_debits_wallet() {
        let dir = tempdir().unwrap();
        let storage = Storage::open(dir.path()).unwrap();
        with_balance(&storage, "a", 1_000);

        let txn = storage.begin();
        let request = request_withdrawal(&txn, "a", 400).unwrap();
        txn.commit().unwrap();
        assert_eq!(request.status, WithdrawalStatus::Pending);
        assert_eq!(storage.get_participant("a").unwrap().unwrap().wallet_balance, 1_000);

        let txn = storage.begin();
        let (approved, entry) = approve_withdrawal(&txn, &request.id).unwrap();
        txn.commit().unwrap();

        assert_eq!(approved.status, WithdrawalStatus::Approved);
        assert_eq!(entry.amount, -400);
        assert_eq!(storage.get_participant("a").unwrap().unwrap().wallet_balance, 600);
        let sum: i64 = storage.ledger_for("a").unwrap().iter().map(|e| e.amount).sum();
        assert_eq!(sum, 600);
    }

    #[test]
    fn decided_requests_cannot_change() {
        let dir = tempdir().unwrap();
        let storage = Storage::open(dir.path()).unwrap();
        with_balance(&storage, "a", 1_000);

        let txn = storage.begin();
        let request = request_withdrawal(&txn, "a", 100).unwrap();
        reject_withdrawal(&txn, &request.id).unwrap();
        txn.commit().unwrap();

        let txn = storage.begin();
        let err = approve_withdrawal(&txn, &request.id).unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { from: "rejected", .. }));
        assert!(matches!(
            reject_withdrawal(&txn, "w9999999999"),
            Err(Error::WithdrawalNotFound(_))
        ));
    }

    #[test]
    fn overdraft_is_refused() {
        let dir = tempdir().unwrap();
        let storage = Storage::open(dir.path()).unwrap();
        with_balance(&storage, "a", 500);

        let txn = storage.begin();
        assert!(matches!(
            request_withdrawal(&txn, "a", 501),
            Err(Error::InsufficientBalance { .. })
        ));

        // Two requests fit individually but not together
        let first = request_withdrawal(&txn, "a", 300).unwrap();
        let second = request_withdrawal(&txn, "a", 300).unwrap();
        approve_withdrawal(&txn, &first.id).unwrap();
        assert!(matches!(
            approve_withdrawal(&txn, &second.id),
            Err(Error::InsufficientBalance { .. })
        ));
    }
}
