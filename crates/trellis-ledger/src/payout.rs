//! Periodic pool payouts.
//!
//! A run for a period happens in three steps, each its own transaction:
//!
//! 1. **Plan**: freeze the pool total and the eligible participants in
//!    `plan:{period}`. An existing plan is reused as-is.
//! 2. **Pay**: each eligible participant gets one `PoolPayout` entry and a
//!    `paid:{period}:{id}` marker in a single transaction. Marked
//!    participants are skipped, so a resumed run only pays the rest.
//! 3. **Complete**: write `run:{period}`. Its presence makes later runs for
//!    the period no-ops.
//!
//! Only closed periods can be paid out. Every storage step runs on the
//! blocking pool; payments are spread over a bounded set of workers.

use crate::config::NetworkConfig;
use crate::error::{Error, Result};
use crate::models::{signed, unix_millis, unix_secs, EntryCause, LedgerEntry, LedgerKind, PayoutPlan, PoolPayoutRun};
use crate::retry::with_retries;
use crate::storage::Storage;
use std::sync::Arc;
use tokio::task::JoinSet;

/// Result of a payout request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayoutOutcome {
    /// This call wrote the completion marker
    Completed(PoolPayoutRun),
    /// The period was already paid out
    AlreadyProcessed(PoolPayoutRun),
}

impl PayoutOutcome {
    pub fn run(&self) -> &PoolPayoutRun {
        match self {
            PayoutOutcome::Completed(run) | PayoutOutcome::AlreadyProcessed(run) => run,
        }
    }
}

/// Distributes a period's pool across eligible participants.
#[derive(Clone)]
pub struct PoolPayoutScheduler {
    storage: Arc<Storage>,
    config: Arc<NetworkConfig>,
}

impl PoolPayoutScheduler {
    pub fn new(storage: Arc<Storage>, config: Arc<NetworkConfig>) -> Self {
        Self { storage, config }
    }

    /// Pay out `period`. Safe to call repeatedly and after a crash.
    ///
    /// Fails with [`Error::InvalidInput`] while `period` is still open.
    pub async fn run(&self, period: u64) -> Result<PayoutOutcome> {
        let open = self.config.pool.period_of(unix_secs());
        if period >= open {
            return Err(Error::InvalidInput(format!(
                "period {} is not closed yet (current period {})",
                period, open
            )));
        }

        if let Some(run) = self.blocking(move |s| s.storage.get_run(period)).await? {
            tracing::info!("Payout for period {} already completed", period);
            return Ok(PayoutOutcome::AlreadyProcessed(run));
        }

        let retries = self.config.conflict_retries;
        let plan = self
            .blocking(move |s| with_retries("payout plan", retries, |_| s.plan(period)))
            .await?;
        let plan = Arc::new(plan);
        tracing::info!(
            "Paying period {}: {} eligible, share {}, pool {}",
            period,
            plan.eligible.len(),
            plan.share,
            plan.pool_total
        );

        self.pay_all(plan.clone()).await?;

        let (run, written) = self
            .blocking(move |s| with_retries("payout completion", retries, |_| s.complete(&plan)))
            .await?;
        if written {
            tracing::info!(
                "Payout for period {} complete: {} paid, {} total",
                period,
                run.paid_count,
                run.total_paid
            );
            Ok(PayoutOutcome::Completed(run))
        } else {
            Ok(PayoutOutcome::AlreadyProcessed(run))
        }
    }

    /// Run a synchronous storage step on the blocking pool.
    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Self) -> Result<T> + Send + 'static,
    {
        let scheduler = self.clone();
        tokio::task::spawn_blocking(move || f(&scheduler))
            .await
            .map_err(|e| Error::Storage(format!("payout task failed: {}", e)))?
    }

    /// Load the stored plan for `period`, or freeze a new one.
    pub fn plan(&self, period: u64) -> Result<PayoutPlan> {
        let txn = self.storage.begin();
        if let Some(plan) = txn.plan(period)? {
            tracing::debug!("Resuming stored plan for period {}", period);
            return Ok(plan);
        }

        let mut eligible = Vec::new();
        for participant in txn.participants()? {
            if !participant.active {
                continue;
            }
            if txn.volume(period, &participant.id)? >= self.config.pool.min_period_purchase {
                eligible.push(participant.id);
            }
        }

        let plan = PayoutPlan::new(period, txn.pool_total(period)?, eligible);
        txn.put_plan(&plan)?;
        txn.commit()?;
        Ok(plan)
    }

    /// Pay one participant their share. Returns `None` if already paid or
    /// the share is zero.
    pub fn pay_one(storage: &Storage, plan: &PayoutPlan, participant_id: &str) -> Result<Option<LedgerEntry>> {
        if plan.share == 0 {
            return Ok(None);
        }

        let txn = storage.begin();
        if txn.payout_marker(plan.period, participant_id)?.is_some() {
            return Ok(None);
        }

        let amount = signed(plan.share)?;
        let mut participant = txn.require_participant(participant_id)?;
        participant.credit(amount)?;

        let entry = LedgerEntry::new(
            participant_id.to_string(),
            amount,
            LedgerKind::PoolPayout,
            EntryCause::PayoutRun { period: plan.period },
        );
        txn.append_entry(&entry)?;
        txn.put_participant(&participant)?;
        txn.put_payout_marker(plan.period, participant_id, &entry.id)?;
        txn.commit()?;

        tracing::debug!("Paid {} to {} for period {}", plan.share, participant_id, plan.period);
        Ok(Some(entry))
    }

    async fn pay_all(&self, plan: Arc<PayoutPlan>) -> Result<()> {
        if plan.share == 0 || plan.eligible.is_empty() {
            return Ok(());
        }

        let workers = self.config.pool.workers.max(1);
        let chunk_size = plan.eligible.len().div_ceil(workers);
        let retries = self.config.conflict_retries;

        let mut tasks = JoinSet::new();
        for chunk in plan.eligible.chunks(chunk_size) {
            let ids = chunk.to_vec();
            let storage = self.storage.clone();
            let plan = plan.clone();
            tasks.spawn_blocking(move || -> Result<usize> {
                let mut paid = 0;
                for id in ids {
                    let entry = with_retries("pool payout", retries, |_| Self::pay_one(&storage, &plan, &id))?;
                    if entry.is_some() {
                        paid += 1;
                    }
                }
                Ok(paid)
            });
        }

        let mut paid = 0;
        let mut failure = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(n)) => paid += n,
                Ok(Err(e)) => {
                    tracing::error!("Payout worker failed for period {}: {}", plan.period, e);
                    failure.get_or_insert(e);
                }
                Err(e) => {
                    tracing::error!("Payout worker panicked for period {}: {}", plan.period, e);
                    failure.get_or_insert(Error::Storage(format!("payout worker failed: {}", e)));
                }
            }
        }

        tracing::debug!("Wrote {} payout entries for period {}", paid, plan.period);
        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Write the completion marker. Returns the marker and whether this call
    /// wrote it.
    fn complete(&self, plan: &PayoutPlan) -> Result<(PoolPayoutRun, bool)> {
        let txn = self.storage.begin();
        if let Some(run) = txn.run(plan.period)? {
            return Ok((run, false));
        }

        let mut paid_count = 0;
        if plan.share > 0 {
            for id in &plan.eligible {
                if txn.payout_marker(plan.period, id)?.is_none() {
                    return Err(Error::Storage(format!(
                        "period {} payout incomplete: {} unpaid",
                        plan.period, id
                    )));
                }
                paid_count += 1;
            }
        }

        let run = PoolPayoutRun {
            period: plan.period,
            paid_count,
            total_paid: plan.share * paid_count as u64,
            share: plan.share,
            unallocated: plan.unallocated,
            completed_at: unix_millis(),
        };
        txn.put_run(&run)?;
        txn.commit()?;
        Ok((run, true))
    }
}
