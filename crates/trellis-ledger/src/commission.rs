//! Payment processing: activation, placement and commission postings.
//!
//! A confirmed payment is handled in one transaction:
//!
//! 1. An order id seen before returns [`PaymentOutcome::AlreadyProcessed`].
//! 2. A joining order (the buyer's first confirmed payment) activates the
//!    buyer, assigns a referral code and places them in the tree.
//! 3. Each indexed ancestor is credited its depth's share, shallowest first.
//! 4. Shares of missing depths follow the [`UnclaimedPolicy`].
//! 5. The pool contribution and the buyer's period volume are recorded. A
//!    contribution for a period whose payout is already planned goes to the
//!    first period that is still open.
//!
//! The joining flag is read once at the start and kept in the order record.

use crate::config::{NetworkConfig, UnclaimedPolicy};
use crate::error::{Error, Result};
use crate::hierarchy::HierarchyIndex;
use crate::models::{
    signed, unix_millis, unix_secs, validate_id, EntryCause, LedgerEntry, LedgerKind, MatrixNode, OrderRecord,
    Participant, PaymentConfirmed,
};
use crate::placement::TreePlacementEngine;
use crate::referral::ReferralCodeAllocator;
use crate::storage::Txn;
use trellis_matrix::{apply_bps, CodeSource, ReferralCode};

/// Everything a processed payment changed.
#[derive(Debug, Clone)]
pub struct PaymentReceipt {
    pub order: OrderRecord,
    /// Set when this order activated the buyer
    pub placement: Option<MatrixNode>,
    pub referral_code: Option<ReferralCode>,
    /// Commission entries, by increasing depth
    pub entries: Vec<LedgerEntry>,
    /// Commission with no recipient under the forfeit policy
    pub forfeited: u64,
    pub pool_contribution: u64,
    /// Period whose pool received the contribution
    pub pool_period: u64,
}

/// Result of handling a payment event.
#[derive(Debug, Clone)]
pub enum PaymentOutcome {
    Processed(PaymentReceipt),
    /// The order id was handled before; nothing was written
    AlreadyProcessed(OrderRecord),
}

impl PaymentOutcome {
    /// The stored order record.
    pub fn order(&self) -> &OrderRecord {
        match self {
            PaymentOutcome::Processed(receipt) => &receipt.order,
            PaymentOutcome::AlreadyProcessed(order) => order,
        }
    }
}

/// Applies payment events to the ledger.
pub struct CommissionEngine<'c> {
    config: &'c NetworkConfig,
}

impl<'c> CommissionEngine<'c> {
    pub fn new(config: &'c NetworkConfig) -> Self {
        Self { config }
    }

    /// Whether the next confirmed payment of `participant` is a joining order.
    pub fn is_joining(participant: &Participant) -> bool {
        participant.confirmed_payments == 0
    }

    /// Handle a confirmed payment inside `txn`.
    pub fn process<S>(&self, txn: &Txn<'_>, event: &PaymentConfirmed, codes: &mut S) -> Result<PaymentOutcome>
    where
        S: CodeSource + ?Sized,
    {
        validate_id("participant", &event.participant_id)?;
        validate_id("order", &event.order_id)?;
        if event.amount == 0 {
            return Err(Error::InvalidInput(format!("order {} has zero amount", event.order_id)));
        }
        signed(event.amount)?;

        if let Some(existing) = txn.order(&event.order_id)? {
            tracing::info!("Order {} already processed, skipping", event.order_id);
            return Ok(PaymentOutcome::AlreadyProcessed(existing));
        }

        let mut buyer = txn.require_participant(&event.participant_id)?;
        let joining = Self::is_joining(&buyer);

        let mut placement = None;
        let mut referral_code = None;
        if joining && !buyer.active {
            let allocator = ReferralCodeAllocator::new(self.config.code_max_attempts);
            referral_code = Some(allocator.generate(txn, &mut buyer, codes)?);
            placement = Some(TreePlacementEngine::new(&self.config.levels).place(txn, &buyer.id)?);
            buyer.active = true;
            buyer.activated_at = Some(unix_millis());
            tracing::info!("Activated {} with order {}", buyer.id, event.order_id);
        } else if joining {
            tracing::debug!("{} is already active, no placement for {}", buyer.id, event.order_id);
        }

        buyer.confirmed_payments += 1;
        txn.put_participant(&buyer)?;

        let ancestors = HierarchyIndex::ancestors(txn, &buyer.id)?;
        let mut entries = Vec::with_capacity(ancestors.len() + 1);
        for edge in &ancestors {
            let share = self.config.commission.share(event.amount, edge.depth);
            if share == 0 {
                continue;
            }
            entries.push(self.post(txn, &edge.ancestor_id, share, &event.order_id, edge.depth)?);
        }

        let unclaimed = self
            .config
            .commission
            .unclaimed(event.amount, ancestors.len() as u8);
        let mut forfeited = unclaimed;
        if unclaimed > 0 && self.config.unclaimed == UnclaimedPolicy::CreditRoot {
            match txn.root_id()? {
                Some(root) if root != buyer.id => {
                    entries.push(self.post(txn, &root, unclaimed, &event.order_id, 0)?);
                    forfeited = 0;
                }
                _ => {}
            }
        }
        if forfeited > 0 {
            tracing::debug!("Order {}: {} commission forfeited", event.order_id, forfeited);
        }

        let period = self.config.pool.period_of(event.confirmed_at);
        let pool_contribution = apply_bps(event.amount, self.config.pool.contribution_bps);
        let mut pool_period = period;
        if pool_contribution > 0 {
            pool_period = self.open_pool_period(txn, period)?;
            if pool_period != period {
                tracing::info!(
                    "Order {}: pool of period {} is frozen, contribution goes to period {}",
                    event.order_id,
                    period,
                    pool_period
                );
            }
            txn.add_pool(pool_period, pool_contribution)?;
        }
        txn.add_volume(period, &buyer.id, event.amount)?;

        let order = OrderRecord {
            order_id: event.order_id.clone(),
            participant_id: buyer.id.clone(),
            amount: event.amount,
            joining,
            period,
            entry_ids: entries.iter().map(|e| e.id.clone()).collect(),
            processed_at: unix_millis(),
        };
        txn.put_order(&order)?;

        tracing::info!(
            "Processed order {} for {}: {} commission entries",
            order.order_id,
            order.participant_id,
            entries.len()
        );

        Ok(PaymentOutcome::Processed(PaymentReceipt {
            order,
            placement,
            referral_code,
            entries,
            forfeited,
            pool_contribution,
            pool_period,
        }))
    }

    /// First period at or after `period` with no payout plan yet.
    fn open_pool_period(&self, txn: &Txn<'_>, period: u64) -> Result<u64> {
        let current = self.config.pool.period_of(unix_secs());
        let mut target = period;
        while txn.plan(target)?.is_some() {
            target = target.saturating_add(1).max(current);
        }
        Ok(target)
    }

    /// Credit one commission share.
    fn post(&self, txn: &Txn<'_>, recipient: &str, amount: u64, order_id: &str, depth: u8) -> Result<LedgerEntry> {
        let mut participant = txn.require_participant(recipient)?;
        participant.credit(signed(amount)?)?;

        let entry = LedgerEntry::new(
            recipient.to_string(),
            signed(amount)?,
            LedgerKind::Commission,
            EntryCause::Order {
                order_id: order_id.to_string(),
                depth,
            },
        );
        txn.append_entry(&entry)?;
        txn.put_participant(&participant)?;

        tracing::debug!("Credited {} to {} for order {} at depth {}", amount, recipient, order_id, depth);
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PayoutPlan;
    use crate::storage::Storage;
    use tempfile::tempdir;
    use trellis_matrix::{CommissionTable, RandomCodes};

    fn config(dir: &std::path::Path, policy: UnclaimedPolicy) -> NetworkConfig {
        let mut config = NetworkConfig::new(dir, CommissionTable::new([1000, 500, 300, 200, 100]).unwrap());
        config.unclaimed = policy;
        config.pool.contribution_bps = 500;
        config
    }

    fn bootstrap(storage: &Storage, config: &NetworkConfig) {
        let txn = storage.begin();
        let mut root = Participant::new("R".into(), None);
        root.active = true;
        root.confirmed_payments = 1;
        ReferralCodeAllocator::new(5)
            .generate(&txn, &mut root, &mut RandomCodes::thread())
            .unwrap();
        txn.put_participant(&root).unwrap();
        TreePlacementEngine::new(&config.levels)
            .bootstrap_root(&txn, &root)
            .unwrap();
        txn.commit().unwrap();
    }

    fn pay(storage: &Storage, config: &NetworkConfig, who: &str, order: &str, amount: u64) -> PaymentOutcome {
        let txn = storage.begin();
        if txn.participant(who).unwrap().is_none() {
            txn.put_participant(&Participant::new(who.into(), None)).unwrap();
        }
        let event = PaymentConfirmed {
            participant_id: who.into(),
            order_id: order.into(),
            amount,
            confirmed_at: 1_000,
        };
        let outcome = CommissionEngine::new(config)
            .process(&txn, &event, &mut RandomCodes::thread())
            .unwrap();
        txn.commit().unwrap();
        outcome
    }

    #[test]
    fn joining_order_activates_and_places() {
        let dir = tempdir().unwrap();
        let config = config(dir.path(), UnclaimedPolicy::Forfeit);
        let storage = Storage::open(dir.path()).unwrap();
        bootstrap(&storage, &config);

        let PaymentOutcome::Processed(receipt) = pay(&storage, &config, "A", "o1", 10_000) else {
            panic!("expected processed");
        };
        assert!(receipt.order.joining);
        assert_eq!(receipt.placement.unwrap().parent_id.as_deref(), Some("R"));
        assert!(receipt.referral_code.is_some());

        let a = storage.get_participant("A").unwrap().unwrap();
        assert!(a.active);
        assert_eq!(a.confirmed_payments, 1);

        // Root is the only ancestor: 10% of 10_000
        assert_eq!(receipt.entries.len(), 1);
        assert_eq!(receipt.entries[0].amount, 1_000);
        assert_eq!(receipt.forfeited, 1_000);
        assert_eq!(storage.get_participant("R").unwrap().unwrap().wallet_balance, 1_000);
    }

    #[test]
    fn repeat_order_is_not_joining() {
        let dir = tempdir().unwrap();
        let config = config(dir.path(), UnclaimedPolicy::Forfeit);
        let storage = Storage::open(dir.path()).unwrap();
        bootstrap(&storage, &config);

        pay(&storage, &config, "A", "o1", 100);
        let PaymentOutcome::Processed(receipt) = pay(&storage, &config, "A", "o2", 100) else {
            panic!("expected processed");
        };
        assert!(!receipt.order.joining);
        assert!(receipt.placement.is_none());
        assert!(storage.get_order("o1").unwrap().unwrap().joining);
    }

    #[test]
    fn duplicate_order_writes_nothing() {
        let dir = tempdir().unwrap();
        let config = config(dir.path(), UnclaimedPolicy::Forfeit);
        let storage = Storage::open(dir.path()).unwrap();
        bootstrap(&storage, &config);

        pay(&storage, &config, "A", "o1", 10_000);
        let before = storage.get_participant("R").unwrap().unwrap().wallet_balance;
        assert!(matches!(
            pay(&storage, &config, "A", "o1", 10_000),
            PaymentOutcome::AlreadyProcessed(_)
        ));
        assert_eq!(storage.get_participant("R").unwrap().unwrap().wallet_balance, before);
        assert_eq!(storage.ledger_for("R").unwrap().len(), 1);
    }

    #[test]
    fn credit_root_policy_routes_missing_depths() {
        let dir = tempdir().unwrap();
        let config = config(dir.path(), UnclaimedPolicy::CreditRoot);
        let storage = Storage::open(dir.path()).unwrap();
        bootstrap(&storage, &config);

        let PaymentOutcome::Processed(receipt) = pay(&storage, &config, "A", "o1", 10_000) else {
            panic!("expected processed");
        };
        assert_eq!(receipt.forfeited, 0);
        let total: i64 = receipt.entries.iter().map(|e| e.amount).sum();
        assert_eq!(total, 2_100);
        assert_eq!(storage.get_participant("R").unwrap().unwrap().wallet_balance, 2_100);
    }

    #[test]
    fn ancestors_are_credited_by_depth() {
        let dir = tempdir().unwrap();
        let config = config(dir.path(), UnclaimedPolicy::Forfeit);
        let storage = Storage::open(dir.path()).unwrap();
        bootstrap(&storage, &config);

        for (i, id) in ["A", "B", "C", "D"].iter().enumerate() {
            pay(&storage, &config, id, &format!("join-{}", i), 100);
        }
        // D sits under A, so A is depth 1 and R depth 2
        let PaymentOutcome::Processed(receipt) = pay(&storage, &config, "D", "big", 10_000) else {
            panic!("expected processed");
        };
        let credited: Vec<_> = receipt
            .entries
            .iter()
            .map(|e| (e.participant_id.as_str(), e.amount))
            .collect();
        assert_eq!(credited, vec![("A", 1_000), ("R", 500)]);
    }

    #[test]
    fn pool_and_volume_are_recorded() {
        let dir = tempdir().unwrap();
        let config = config(dir.path(), UnclaimedPolicy::Forfeit);
        let storage = Storage::open(dir.path()).unwrap();
        bootstrap(&storage, &config);

        pay(&storage, &config, "A", "o1", 10_000);
        pay(&storage, &config, "A", "o2", 2_000);
        let period = config.pool.period_of(1_000);
        assert_eq!(storage.pool_total(period).unwrap(), 600);
        assert_eq!(storage.period_volume(period, "A").unwrap(), 12_000);
    }

    #[test]
    fn late_contribution_skips_frozen_pool() {
        let dir = tempdir().unwrap();
        let config = config(dir.path(), UnclaimedPolicy::Forfeit);
        let storage = Storage::open(dir.path()).unwrap();
        bootstrap(&storage, &config);

        pay(&storage, &config, "A", "o1", 10_000);
        let period = config.pool.period_of(1_000);
        let txn = storage.begin();
        txn.put_plan(&PayoutPlan::new(period, 500, vec!["A".into()])).unwrap();
        txn.commit().unwrap();

        let PaymentOutcome::Processed(receipt) = pay(&storage, &config, "A", "o2", 2_000) else {
            panic!("expected processed");
        };
        let open = config.pool.period_of(unix_secs());
        assert_eq!(receipt.pool_period, open);
        assert_eq!(storage.pool_total(period).unwrap(), 500);
        assert_eq!(storage.pool_total(open).unwrap(), 100);
        // Volume stays with the order's own period
        assert_eq!(storage.period_volume(period, "A").unwrap(), 12_000);
    }

    #[test]
    fn missing_root_aborts_activation() {
        let dir = tempdir().unwrap();
        let config = config(dir.path(), UnclaimedPolicy::Forfeit);
        let storage = Storage::open(dir.path()).unwrap();

        let txn = storage.begin();
        txn.put_participant(&Participant::new("A".into(), None)).unwrap();
        let event = PaymentConfirmed {
            participant_id: "A".into(),
            order_id: "o1".into(),
            amount: 100,
            confirmed_at: 0,
        };
        let err = CommissionEngine::new(&config)
            .process(&txn, &event, &mut RandomCodes::thread())
            .unwrap_err();
        assert!(matches!(err, Error::RootMissing));
    }
}
