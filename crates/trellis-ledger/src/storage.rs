//! Persistent storage using RocksDB.
//!
//! One `OptimisticTransactionDB` per process, shared as `Arc<Storage>`.
//! Mutations go through [`Txn`], a snapshot transaction handed explicitly to
//! each engine. Rows read with [`Txn`] getters are tracked; if another
//! transaction writes a tracked row first, [`Txn::commit`] fails with
//! [`Error::ConcurrentConflict`] and nothing from the losing transaction is
//! applied.
//!
//! # Key layout
//!
//! ```text
//! participant:{id}                       Participant
//! code:{CODE}                            participant id
//! node:{id}                              MatrixNode
//! slot:{parent}:{position}               child id (uniqueness of a slot)
//! edge_up:{descendant}:{depth}           HierarchyEdge
//! edge_down:{ancestor}:{depth}:{desc}    descendant id
//! entry:{entry_id}                       ledger index key
//! ledger:{participant}:{millis}:{id}     LedgerEntry
//! order:{order_id}                       OrderRecord
//! pool:{period}                          pool total
//! volume:{period}:{participant}          purchase volume
//! plan:{period} / run:{period}           PayoutPlan / PoolPayoutRun
//! paid:{period}:{participant}            payout entry id
//! withdrawal:{id}                        WithdrawalRequest
//! meta:root / meta:withdrawal_seq        root id / request counter
//! ```

use crate::error::{Error, Result};
use crate::models::{
    HierarchyEdge, LedgerEntry, MatrixNode, OrderRecord, Participant, PayoutPlan, PoolPayoutRun,
    WithdrawalRequest,
};
use rocksdb::{OptimisticTransactionDB, OptimisticTransactionOptions, Options, Transaction, WriteOptions};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use trellis_matrix::{Position, ReferralCode};

mod keys {
    use trellis_matrix::{Position, ReferralCode};

    pub const PARTICIPANT_PREFIX: &str = "participant:";
    pub const WITHDRAWAL_PREFIX: &str = "withdrawal:";
    pub const ROOT: &str = "meta:root";
    pub const WITHDRAWAL_SEQ: &str = "meta:withdrawal_seq";

    pub fn participant(id: &str) -> String {
        format!("participant:{}", id)
    }

    pub fn code(code: &ReferralCode) -> String {
        format!("code:{}", code)
    }

    pub fn node(id: &str) -> String {
        format!("node:{}", id)
    }

    pub fn slot(parent: &str, position: Position) -> String {
        format!("slot:{}:{}", parent, position)
    }

    pub fn slot_prefix(parent: &str) -> String {
        format!("slot:{}:", parent)
    }

    pub fn edge_up(descendant: &str, depth: u8) -> String {
        format!("edge_up:{}:{}", descendant, depth)
    }

    pub fn edge_up_prefix(descendant: &str) -> String {
        format!("edge_up:{}:", descendant)
    }

    pub fn edge_down(ancestor: &str, depth: u8, descendant: &str) -> String {
        format!("edge_down:{}:{}:{}", ancestor, depth, descendant)
    }

    pub fn edge_down_prefix(ancestor: &str, depth: u8) -> String {
        format!("edge_down:{}:{}:", ancestor, depth)
    }

    pub fn entry(entry_id: &str) -> String {
        format!("entry:{}", entry_id)
    }

    pub fn ledger(participant: &str, created_at: u64, entry_id: &str) -> String {
        format!("ledger:{}:{:020}:{}", participant, created_at, entry_id)
    }

    pub fn ledger_prefix(participant: &str) -> String {
        format!("ledger:{}:", participant)
    }

    pub fn order(order_id: &str) -> String {
        format!("order:{}", order_id)
    }

    pub fn pool(period: u64) -> String {
        format!("pool:{:020}", period)
    }

    pub fn volume(period: u64, participant: &str) -> String {
        format!("volume:{:020}:{}", period, participant)
    }

    pub fn plan(period: u64) -> String {
        format!("plan:{:020}", period)
    }

    pub fn run(period: u64) -> String {
        format!("run:{:020}", period)
    }

    pub fn paid(period: u64, participant: &str) -> String {
        format!("paid:{:020}:{}", period, participant)
    }

    pub fn withdrawal(id: &str) -> String {
        format!("withdrawal:{}", id)
    }
}

fn decode<T: DeserializeOwned>(data: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(data)?)
}

/// Storage backend for Trellis data.
pub struct Storage {
    db: OptimisticTransactionDB,
}

impl Storage {
    /// Open or create storage at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = OptimisticTransactionDB::open(&opts, path)?;
        Ok(Self { db })
    }

    /// Begin a snapshot transaction.
    pub fn begin(&self) -> Txn<'_> {
        let mut txn_opts = OptimisticTransactionOptions::new();
        txn_opts.set_snapshot(true);
        Txn {
            inner: self.db.transaction_opt(&WriteOptions::default(), &txn_opts),
        }
    }

    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.db.get(key.as_bytes())? {
            Some(data) => Ok(Some(decode(&data)?)),
            None => Ok(None),
        }
    }

    fn scan_json<T: DeserializeOwned>(&self, prefix: &str) -> Result<Vec<T>> {
        let prefix = prefix.as_bytes();
        let mut items = Vec::new();

        let iter = self.db.prefix_iterator(prefix);
        for item in iter {
            let (key, value) = item?;
            if key.starts_with(prefix) {
                items.push(decode(&value)?);
            } else {
                break;
            }
        }

        Ok(items)
    }

    // --- Participants ---

    /// Get a participant by ID.
    pub fn get_participant(&self, id: &str) -> Result<Option<Participant>> {
        self.get_json(&keys::participant(id))
    }

    /// List all participants, ordered by id.
    pub fn list_participants(&self) -> Result<Vec<Participant>> {
        self.scan_json(keys::PARTICIPANT_PREFIX)
    }

    /// Owner of a referral code.
    pub fn code_owner(&self, code: &ReferralCode) -> Result<Option<String>> {
        self.get_json(&keys::code(code))
    }

    // --- Tree ---

    /// Root participant id.
    pub fn root_id(&self) -> Result<Option<String>> {
        self.get_json(keys::ROOT)
    }

    /// Get a participant's tree node.
    pub fn get_node(&self, id: &str) -> Result<Option<MatrixNode>> {
        self.get_json(&keys::node(id))
    }

    /// Ancestor edges of a participant, by increasing depth.
    pub fn ancestors(&self, descendant: &str) -> Result<Vec<HierarchyEdge>> {
        self.scan_json(&keys::edge_up_prefix(descendant))
    }

    /// Ids exactly `depth` levels below `ancestor`.
    pub fn descendants_at(&self, ancestor: &str, depth: u8) -> Result<Vec<String>> {
        self.scan_json(&keys::edge_down_prefix(ancestor, depth))
    }

    // --- Ledger ---

    /// Ledger entries for a participant, oldest first.
    pub fn ledger_for(&self, participant: &str) -> Result<Vec<LedgerEntry>> {
        self.scan_json(&keys::ledger_prefix(participant))
    }

    /// Get a ledger entry by id.
    pub fn get_entry(&self, entry_id: &str) -> Result<Option<LedgerEntry>> {
        match self.get_json::<String>(&keys::entry(entry_id))? {
            Some(index_key) => self.get_json(&index_key),
            None => Ok(None),
        }
    }

    /// Get a processed order.
    pub fn get_order(&self, order_id: &str) -> Result<Option<OrderRecord>> {
        self.get_json(&keys::order(order_id))
    }

    // --- Pool ---

    /// Pool collected for a period.
    pub fn pool_total(&self, period: u64) -> Result<u64> {
        Ok(self.get_json(&keys::pool(period))?.unwrap_or(0))
    }

    /// A participant's purchase volume in a period.
    pub fn period_volume(&self, period: u64, participant: &str) -> Result<u64> {
        Ok(self.get_json(&keys::volume(period, participant))?.unwrap_or(0))
    }

    /// Completion marker for a period.
    pub fn get_run(&self, period: u64) -> Result<Option<PoolPayoutRun>> {
        self.get_json(&keys::run(period))
    }

    /// Stored payout plan for a period.
    pub fn get_plan(&self, period: u64) -> Result<Option<PayoutPlan>> {
        self.get_json(&keys::plan(period))
    }

    /// Payout entry id for a participant in a period, if paid.
    pub fn payout_marker(&self, period: u64, participant: &str) -> Result<Option<String>> {
        self.get_json(&keys::paid(period, participant))
    }

    // --- Withdrawals ---

    /// Get a withdrawal request.
    pub fn get_withdrawal(&self, id: &str) -> Result<Option<WithdrawalRequest>> {
        self.get_json(&keys::withdrawal(id))
    }

    /// All withdrawal requests of a participant.
    pub fn withdrawals_for(&self, participant: &str) -> Result<Vec<WithdrawalRequest>> {
        let all: Vec<WithdrawalRequest> = self.scan_json(keys::WITHDRAWAL_PREFIX)?;
        Ok(all
            .into_iter()
            .filter(|w| w.participant_id == participant)
            .collect())
    }
}

/// A snapshot transaction over [`Storage`].
///
/// Dropping a `Txn` without calling [`Txn::commit`] discards every write.
pub struct Txn<'a> {
    inner: Transaction<'a, OptimisticTransactionDB>,
}

impl<'a> Txn<'a> {
    /// Read a row and track it for conflict detection.
    fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.inner.get_for_update(key.as_bytes(), true)? {
            Some(data) => Ok(Some(decode(&data)?)),
            None => Ok(None),
        }
    }

    fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_vec(value)?;
        self.inner.put(key.as_bytes(), value)?;
        Ok(())
    }

    /// Untracked prefix scan. Sees this transaction's own writes.
    fn scan<T: DeserializeOwned>(&self, prefix: &str) -> Result<Vec<T>> {
        let prefix = prefix.as_bytes();
        let mut items = Vec::new();

        let iter = self.inner.prefix_iterator(prefix);
        for item in iter {
            let (key, value) = item?;
            if key.starts_with(prefix) {
                items.push(decode(&value)?);
            } else {
                break;
            }
        }

        Ok(items)
    }

    /// Commit every write atomically.
    pub fn commit(self) -> Result<()> {
        self.inner.commit()?;
        Ok(())
    }

    // --- Participants ---

    /// Get a participant.
    pub fn participant(&self, id: &str) -> Result<Option<Participant>> {
        self.read(&keys::participant(id))
    }

    /// Get a participant or fail with `ParticipantNotFound`.
    pub fn require_participant(&self, id: &str) -> Result<Participant> {
        self.participant(id)?
            .ok_or_else(|| Error::ParticipantNotFound(id.to_string()))
    }

    /// Store a participant.
    pub fn put_participant(&self, participant: &Participant) -> Result<()> {
        self.write(&keys::participant(&participant.id), participant)
    }

    /// All participants (untracked).
    pub fn participants(&self) -> Result<Vec<Participant>> {
        self.scan(keys::PARTICIPANT_PREFIX)
    }

    /// Owner of a referral code.
    pub fn code_owner(&self, code: &ReferralCode) -> Result<Option<String>> {
        self.read(&keys::code(code))
    }

    /// Bind a referral code to a participant.
    pub fn put_code_owner(&self, code: &ReferralCode, participant: &str) -> Result<()> {
        self.write(&keys::code(code), participant)
    }

    // --- Tree ---

    /// Root participant id.
    pub fn root_id(&self) -> Result<Option<String>> {
        self.read(keys::ROOT)
    }

    /// Record the root participant id.
    pub fn set_root_id(&self, id: &str) -> Result<()> {
        self.write(keys::ROOT, id)
    }

    /// Get a tree node.
    pub fn node(&self, id: &str) -> Result<Option<MatrixNode>> {
        self.read(&keys::node(id))
    }

    /// Store a tree node and, for non-root nodes, claim its slot.
    pub fn put_node(&self, node: &MatrixNode) -> Result<()> {
        if let (Some(parent), Some(position)) = (&node.parent_id, node.position) {
            self.write(&keys::slot(parent, position), &node.participant_id)?;
        }
        self.write(&keys::node(&node.participant_id), node)
    }

    /// Occupant of a slot (tracked).
    pub fn slot_occupant(&self, parent: &str, position: Position) -> Result<Option<String>> {
        self.read(&keys::slot(parent, position))
    }

    /// Children of a node as `(position, child)`, in position order.
    pub fn children(&self, parent: &str) -> Result<Vec<(Position, String)>> {
        let ids: Vec<String> = self.scan(&keys::slot_prefix(parent))?;
        let mut children = Vec::with_capacity(ids.len());
        for id in ids {
            let node = self
                .node(&id)?
                .ok_or_else(|| Error::Storage(format!("slot of {} points to missing node {}", parent, id)))?;
            let position = node
                .position
                .ok_or_else(|| Error::Storage(format!("child {} has no position", id)))?;
            children.push((position, id));
        }
        children.sort_by_key(|(p, _)| *p);
        Ok(children)
    }

    /// Store a closure edge in both directions.
    pub fn put_edge(&self, edge: &HierarchyEdge) -> Result<()> {
        self.write(&keys::edge_up(&edge.descendant_id, edge.depth), edge)?;
        self.write(
            &keys::edge_down(&edge.ancestor_id, edge.depth, &edge.descendant_id),
            &edge.descendant_id,
        )
    }

    /// Ancestor edges of a participant, by increasing depth.
    pub fn ancestors(&self, descendant: &str) -> Result<Vec<HierarchyEdge>> {
        self.scan(&keys::edge_up_prefix(descendant))
    }

    // --- Ledger ---

    /// Check if an entry id has been written.
    pub fn entry_exists(&self, entry_id: &str) -> Result<bool> {
        Ok(self.read::<String>(&keys::entry(entry_id))?.is_some())
    }

    /// Append an immutable entry. Fails if the id already exists.
    pub fn append_entry(&self, entry: &LedgerEntry) -> Result<()> {
        if self.entry_exists(&entry.id)? {
            return Err(Error::Storage(format!("ledger entry {} already written", entry.id)));
        }
        let index_key = keys::ledger(&entry.participant_id, entry.created_at, &entry.id);
        self.write(&index_key, entry)?;
        self.write(&keys::entry(&entry.id), &index_key)
    }

    /// Get a processed order.
    pub fn order(&self, order_id: &str) -> Result<Option<OrderRecord>> {
        self.read(&keys::order(order_id))
    }

    /// Store a processed order.
    pub fn put_order(&self, order: &OrderRecord) -> Result<()> {
        self.write(&keys::order(&order.order_id), order)
    }

    // --- Pool ---

    /// Add to a period's pool.
    pub fn add_pool(&self, period: u64, amount: u64) -> Result<u64> {
        let key = keys::pool(period);
        let total = self.read::<u64>(&key)?.unwrap_or(0).saturating_add(amount);
        self.write(&key, &total)?;
        Ok(total)
    }

    /// Pool collected for a period.
    pub fn pool_total(&self, period: u64) -> Result<u64> {
        Ok(self.read(&keys::pool(period))?.unwrap_or(0))
    }

    /// Add to a participant's purchase volume for a period.
    pub fn add_volume(&self, period: u64, participant: &str, amount: u64) -> Result<u64> {
        let key = keys::volume(period, participant);
        let total = self.read::<u64>(&key)?.unwrap_or(0).saturating_add(amount);
        self.write(&key, &total)?;
        Ok(total)
    }

    /// A participant's purchase volume for a period.
    pub fn volume(&self, period: u64, participant: &str) -> Result<u64> {
        Ok(self.read(&keys::volume(period, participant))?.unwrap_or(0))
    }

    /// Stored payout plan.
    pub fn plan(&self, period: u64) -> Result<Option<PayoutPlan>> {
        self.read(&keys::plan(period))
    }

    /// Store a payout plan.
    pub fn put_plan(&self, plan: &PayoutPlan) -> Result<()> {
        self.write(&keys::plan(plan.period), plan)
    }

    /// Completion marker.
    pub fn run(&self, period: u64) -> Result<Option<PoolPayoutRun>> {
        self.read(&keys::run(period))
    }

    /// Write the completion marker.
    pub fn put_run(&self, run: &PoolPayoutRun) -> Result<()> {
        self.write(&keys::run(run.period), run)
    }

    /// Payout entry id for a participant in a period.
    pub fn payout_marker(&self, period: u64, participant: &str) -> Result<Option<String>> {
        self.read(&keys::paid(period, participant))
    }

    /// Mark a participant as paid for a period.
    pub fn put_payout_marker(&self, period: u64, participant: &str, entry_id: &str) -> Result<()> {
        self.write(&keys::paid(period, participant), entry_id)
    }

    // --- Withdrawals ---

    /// Get a withdrawal request.
    pub fn withdrawal(&self, id: &str) -> Result<Option<WithdrawalRequest>> {
        self.read(&keys::withdrawal(id))
    }

    /// Store a withdrawal request.
    pub fn put_withdrawal(&self, request: &WithdrawalRequest) -> Result<()> {
        self.write(&keys::withdrawal(&request.id), request)
    }

    /// Next withdrawal request number.
    pub fn next_withdrawal_seq(&self) -> Result<u64> {
        let next = self.read::<u64>(keys::WITHDRAWAL_SEQ)?.unwrap_or(0) + 1;
        self.write(keys::WITHDRAWAL_SEQ, &next)?;
        Ok(next)
    }
}
