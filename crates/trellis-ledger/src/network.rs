//! Network facade.
//!
//! [`Network`] owns the shared storage and configuration. Every mutating
//! call opens its own transaction, runs the relevant engine against it and
//! commits, re-running the whole operation on a retryable conflict.
//! Queries read committed state directly from [`Storage`].

use crate::commission::{CommissionEngine, PaymentOutcome};
use crate::config::NetworkConfig;
use crate::error::{Error, Result};
use crate::hierarchy::HierarchyIndex;
use crate::models::{
    validate_id, HierarchyEdge, LedgerEntry, MatrixNode, Participant, PaymentConfirmed,
    WithdrawalRequest,
};
use crate::payout::{PayoutOutcome, PoolPayoutScheduler};
use crate::placement::TreePlacementEngine;
use crate::referral::ReferralCodeAllocator;
use crate::retry::with_retries;
use crate::storage::{Storage, Txn};
use crate::wallet::{self, BonusOutcome};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use trellis_matrix::{CodeSource, Level, RandomCodes, ReferralCode};

/// Balance and rank of a participant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WalletSummary {
    pub participant_id: String,
    pub balance: i64,
    pub active: bool,
    pub level: Level,
    pub team_size: u64,
    pub direct_children: u8,
}

impl From<&Participant> for WalletSummary {
    fn from(p: &Participant) -> Self {
        Self {
            participant_id: p.id.clone(),
            balance: p.wallet_balance,
            active: p.active,
            level: p.level,
            team_size: p.team_size,
            direct_children: p.direct_children,
        }
    }
}

/// Entry point to the referral network.
#[derive(Clone)]
pub struct Network {
    storage: Arc<Storage>,
    config: Arc<NetworkConfig>,
}

impl Network {
    /// Open storage under `config.data_dir`.
    pub fn open(config: NetworkConfig) -> Result<Self> {
        config.validate()?;
        std::fs::create_dir_all(&config.data_dir)?;
        let storage = Arc::new(Storage::open(&config.data_dir)?);
        Ok(Self::new(storage, Arc::new(config)))
    }

    pub fn new(storage: Arc<Storage>, config: Arc<NetworkConfig>) -> Self {
        Self { storage, config }
    }

    pub fn storage(&self) -> Arc<Storage> {
        Arc::clone(&self.storage)
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// Run `op` in a fresh transaction per attempt and commit it.
    fn transact<T, F>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut(&Txn<'_>) -> Result<T>,
    {
        with_retries(what, self.config.conflict_retries, |_| {
            let txn = self.storage.begin();
            let value = op(&txn)?;
            txn.commit()?;
            Ok(value)
        })
    }

    // --- Mutations ---

    /// Create the tree root for the owner account.
    ///
    /// The owner is created if needed, activated and given a referral code.
    pub fn bootstrap_root(&self, owner_id: &str) -> Result<Participant> {
        validate_id("participant", owner_id)?;
        let placement = TreePlacementEngine::new(&self.config.levels);
        let allocator = ReferralCodeAllocator::new(self.config.code_max_attempts);
        let mut codes = RandomCodes::thread();

        self.transact("bootstrap root", |txn| {
            let mut owner = txn
                .participant(owner_id)?
                .unwrap_or_else(|| Participant::new(owner_id.to_string(), None));
            placement.bootstrap_root(txn, &owner)?;
            allocator.generate(txn, &mut owner, &mut codes)?;
            if !owner.active {
                owner.active = true;
                owner.activated_at = Some(crate::models::unix_millis());
            }
            txn.put_participant(&owner)?;
            Ok(owner)
        })
    }

    /// Register a participant, optionally under a sponsor's referral code.
    ///
    /// The sponsor is recorded but does not influence tree position.
    pub fn signup(&self, participant_id: &str, sponsor_code: Option<&str>) -> Result<Participant> {
        validate_id("participant", participant_id)?;
        self.transact("signup", |txn| {
            if txn.participant(participant_id)?.is_some() {
                return Err(Error::InvalidInput(format!(
                    "participant {} already exists",
                    participant_id
                )));
            }
            let sponsor = sponsor_code
                .map(|code| ReferralCodeAllocator::resolve(txn, code))
                .transpose()?;
            let participant = Participant::new(participant_id.to_string(), sponsor);
            txn.put_participant(&participant)?;
            tracing::info!(
                "Signed up {} (sponsor {:?})",
                participant.id,
                participant.sponsor_id
            );
            Ok(participant)
        })
    }

    /// Handle a "payment confirmed" event.
    pub fn payment_confirmed(&self, event: &PaymentConfirmed) -> Result<PaymentOutcome> {
        self.payment_confirmed_with(event, &mut RandomCodes::thread())
    }

    /// Handle a "payment confirmed" event drawing codes from `codes`.
    pub fn payment_confirmed_with<S>(&self, event: &PaymentConfirmed, codes: &mut S) -> Result<PaymentOutcome>
    where
        S: CodeSource + ?Sized,
    {
        let engine = CommissionEngine::new(&self.config);
        self.transact("payment", |txn| engine.process(txn, event, &mut *codes))
    }

    /// Pay out a period's pool.
    pub async fn run_pool_payout(&self, period: u64) -> Result<PayoutOutcome> {
        PoolPayoutScheduler::new(self.storage(), Arc::clone(&self.config))
            .run(period)
            .await
    }

    /// Credit a one-off bonus, idempotent per reference.
    pub fn grant_bonus(&self, participant_id: &str, amount: u64, reference: &str) -> Result<BonusOutcome> {
        self.transact("bonus", |txn| wallet::grant_bonus(txn, participant_id, amount, reference))
    }

    pub fn request_withdrawal(&self, participant_id: &str, amount: u64) -> Result<WithdrawalRequest> {
        self.transact("withdrawal request", |txn| {
            wallet::request_withdrawal(txn, participant_id, amount)
        })
    }

    pub fn approve_withdrawal(&self, id: &str) -> Result<(WithdrawalRequest, LedgerEntry)> {
        self.transact("withdrawal approval", |txn| wallet::approve_withdrawal(txn, id))
    }

    pub fn reject_withdrawal(&self, id: &str) -> Result<WithdrawalRequest> {
        self.transact("withdrawal rejection", |txn| wallet::reject_withdrawal(txn, id))
    }

    // --- Queries ---

    fn require(&self, participant_id: &str) -> Result<Participant> {
        self.storage
            .get_participant(participant_id)?
            .ok_or_else(|| Error::ParticipantNotFound(participant_id.to_string()))
    }

    pub fn participant(&self, participant_id: &str) -> Result<Participant> {
        self.require(participant_id)
    }

    /// Tree node of a participant; `None` until activation.
    pub fn placement(&self, participant_id: &str) -> Result<Option<MatrixNode>> {
        self.require(participant_id)?;
        self.storage.get_node(participant_id)
    }

    pub fn referral_code(&self, participant_id: &str) -> Result<Option<ReferralCode>> {
        Ok(self.require(participant_id)?.referral_code)
    }

    pub fn wallet(&self, participant_id: &str) -> Result<WalletSummary> {
        Ok(WalletSummary::from(&self.require(participant_id)?))
    }

    /// All ledger entries of a participant, oldest first.
    pub fn ledger(&self, participant_id: &str) -> Result<Vec<LedgerEntry>> {
        self.require(participant_id)?;
        self.storage.ledger_for(participant_id)
    }

    /// Commission entries written for an order, by increasing depth.
    pub fn order_commissions(&self, order_id: &str) -> Result<Vec<LedgerEntry>> {
        let order = self
            .storage
            .get_order(order_id)?
            .ok_or_else(|| Error::OrderNotFound(order_id.to_string()))?;
        let mut entries = Vec::with_capacity(order.entry_ids.len());
        for id in &order.entry_ids {
            let entry = self
                .storage
                .get_entry(id)?
                .ok_or_else(|| Error::Storage(format!("order {} lists missing entry {}", order_id, id)))?;
            entries.push(entry);
        }
        Ok(entries)
    }

    /// Whether the participant's next confirmed payment would be joining.
    pub fn is_joining_order(&self, participant_id: &str) -> Result<bool> {
        Ok(CommissionEngine::is_joining(&self.require(participant_id)?))
    }

    /// Ancestors of a participant, by increasing depth.
    pub fn ancestors(&self, participant_id: &str) -> Result<Vec<HierarchyEdge>> {
        self.require(participant_id)?;
        let txn = self.storage.begin();
        HierarchyIndex::ancestors(&txn, participant_id)
    }

    /// Participants exactly `depth` levels below `participant_id`.
    pub fn descendants_at(&self, participant_id: &str, depth: u8) -> Result<Vec<String>> {
        self.require(participant_id)?;
        self.storage.descendants_at(participant_id, depth)
    }

    pub fn withdrawal(&self, id: &str) -> Result<WithdrawalRequest> {
        self.storage
            .get_withdrawal(id)?
            .ok_or_else(|| Error::WithdrawalNotFound(id.to_string()))
    }

    pub fn withdrawals_for(&self, participant_id: &str) -> Result<Vec<WithdrawalRequest>> {
        self.require(participant_id)?;
        self.storage.withdrawals_for(participant_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use trellis_matrix::CommissionTable;

    fn network() -> (tempfile::TempDir, Network) {
        let dir = tempdir().unwrap();
        let config = NetworkConfig::new(dir.path(), CommissionTable::new([1000, 500, 0, 0, 0]).unwrap());
        let network = Network::open(config).unwrap();
        (dir, network)
    }

    #[test]
    fn signup_resolves_sponsor_code() {
        let (_dir, network) = network();
        let root = network.bootstrap_root("owner").unwrap();
        let code = root.referral_code.unwrap();

        let alice = network.signup("alice", Some(&code.as_str().to_lowercase())).unwrap();
        assert_eq!(alice.sponsor_id.as_deref(), Some("owner"));
        assert!(!alice.active);
        assert!(network.placement("alice").unwrap().is_none());

        assert!(matches!(
            network.signup("bob", Some("ZZZZ9999")),
            Err(Error::UnknownReferralCode(_))
        ));
        assert!(network.participant("bob").is_err());
        assert!(matches!(network.signup("alice", None), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn root_is_placed_once() {
        let (_dir, network) = network();
        network.bootstrap_root("owner").unwrap();
        assert!(network.placement("owner").unwrap().unwrap().is_root());
        assert!(network.bootstrap_root("other").is_err());
        assert!(network.participant("other").is_err());
    }

    #[test]
    fn unknown_lookups_fail() {
        let (_dir, network) = network();
        assert!(matches!(network.wallet("nobody"), Err(Error::ParticipantNotFound(_))));
        assert!(matches!(network.order_commissions("nope"), Err(Error::OrderNotFound(_))));
        assert!(matches!(network.withdrawal("w1"), Err(Error::WithdrawalNotFound(_))));
    }

    #[test]
    fn joining_flag_flips_after_first_payment() {
        let (_dir, network) = network();
        network.bootstrap_root("owner").unwrap();
        network.signup("alice", None).unwrap();
        assert!(network.is_joining_order("alice").unwrap());

        network
            .payment_confirmed(&PaymentConfirmed {
                participant_id: "alice".into(),
                order_id: "o1".into(),
                amount: 1_000,
                confirmed_at: 0,
            })
            .unwrap();
        assert!(!network.is_joining_order("alice").unwrap());

        let entries = network.order_commissions("o1").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].participant_id, "owner");
        assert_eq!(network.wallet("owner").unwrap().balance, 100);
    }
}
