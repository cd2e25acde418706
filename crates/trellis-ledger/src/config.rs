//! Engine configuration.
//!
//! Everything is read from `TRELLIS_*` environment variables. The commission
//! table has no default and must be provided.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use trellis_matrix::{CommissionTable, LevelTable};

/// What happens to the shares of depths that have no ancestor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnclaimedPolicy {
    /// Missing shares are not paid to anyone
    #[default]
    Forfeit,
    /// Missing shares are credited to the tree root
    CreditRoot,
}

impl FromStr for UnclaimedPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "forfeit" => Ok(Self::Forfeit),
            "credit_root" => Ok(Self::CreditRoot),
            other => Err(Error::Config(format!(
                "unclaimed policy must be forfeit or credit_root, got {:?}",
                other
            ))),
        }
    }
}

/// Pool payout settings.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Share of every order, in bps, added to the pool of its period
    pub contribution_bps: u16,

    /// Minimum purchase volume in a period to qualify for its payout
    pub min_period_purchase: u64,

    /// Period length; period id = `confirmed_at / period_secs`
    pub period_secs: u64,

    /// Blocking workers used to pay participants
    pub workers: usize,

    /// If set, the node pays out the last closed period on this interval
    pub tick_secs: Option<u64>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            contribution_bps: 0,
            min_period_purchase: 1,
            period_secs: 7 * 24 * 60 * 60,
            workers: 4,
            tick_secs: None,
        }
    }
}

impl PoolConfig {
    /// Period containing a unix timestamp.
    pub fn period_of(&self, unix_secs: u64) -> u64 {
        unix_secs / self.period_secs.max(1)
    }

    /// Most recent period that has fully ended at `unix_secs`.
    pub fn last_closed(&self, unix_secs: u64) -> Option<u64> {
        self.period_of(unix_secs).checked_sub(1)
    }
}

/// Configuration for a Trellis engine.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Data directory for storage
    pub data_dir: PathBuf,

    /// Admin socket path (for trellis-admin CLI)
    pub admin_socket: PathBuf,

    /// Commission rate per ancestor depth
    pub commission: CommissionTable,

    /// Handling of shares for missing ancestors
    pub unclaimed: UnclaimedPolicy,

    /// Team-size thresholds per level
    pub levels: LevelTable,

    /// Referral code draws before giving up
    pub code_max_attempts: u32,

    /// Whole-operation retries on a concurrent conflict
    pub conflict_retries: u32,

    /// Pool payout settings
    pub pool: PoolConfig,
}

impl NetworkConfig {
    /// Config with the given data directory and commission table, defaults
    /// elsewhere.
    pub fn new(data_dir: impl Into<PathBuf>, commission: CommissionTable) -> Self {
        let data_dir = data_dir.into();
        let admin_socket = data_dir.join("admin.sock");
        Self {
            data_dir,
            admin_socket,
            commission,
            unclaimed: UnclaimedPolicy::default(),
            levels: LevelTable::default(),
            code_max_attempts: 10,
            conflict_retries: 5,
            pool: PoolConfig::default(),
        }
    }

    /// Create config from environment variables.
    ///
    /// `TRELLIS_COMMISSION_BPS` is required; everything else has a default.
    pub fn from_env() -> Result<Self> {
        let data_dir = data_dir_from_env();

        let commission = std::env::var("TRELLIS_COMMISSION_BPS")
            .map_err(|_| Error::Config("TRELLIS_COMMISSION_BPS is required".into()))?;
        let commission = CommissionTable::parse(&commission)?;

        let mut config = Self::new(data_dir, commission);

        config.admin_socket = admin_socket_from_env();
        if let Some(policy) = env_parse("TRELLIS_UNCLAIMED_POLICY")? {
            config.unclaimed = policy;
        }
        if let Ok(levels) = std::env::var("TRELLIS_LEVEL_THRESHOLDS") {
            config.levels = LevelTable::parse(&levels)?;
        }
        if let Some(n) = env_parse("TRELLIS_CODE_MAX_ATTEMPTS")? {
            config.code_max_attempts = n;
        }
        if let Some(n) = env_parse("TRELLIS_PLACEMENT_RETRIES")? {
            config.conflict_retries = n;
        }
        if let Some(bps) = env_parse("TRELLIS_POOL_CONTRIBUTION_BPS")? {
            config.pool.contribution_bps = bps;
        }
        if let Some(min) = env_parse("TRELLIS_POOL_MIN_PURCHASE")? {
            config.pool.min_period_purchase = min;
        }
        if let Some(secs) = env_parse("TRELLIS_POOL_PERIOD_SECS")? {
            config.pool.period_secs = secs;
        }
        if let Some(workers) = env_parse("TRELLIS_PAYOUT_WORKERS")? {
            config.pool.workers = workers;
        }
        config.pool.tick_secs = env_parse("TRELLIS_PAYOUT_TICK_SECS")?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.code_max_attempts == 0 {
            return Err(Error::Config("code_max_attempts must be at least 1".into()));
        }
        if self.conflict_retries == 0 {
            return Err(Error::Config("conflict_retries must be at least 1".into()));
        }
        if self.pool.period_secs == 0 {
            return Err(Error::Config("pool period must be positive".into()));
        }
        if self.pool.workers == 0 {
            return Err(Error::Config("payout workers must be at least 1".into()));
        }
        if self.pool.contribution_bps as u64 > trellis_matrix::BPS_DENOMINATOR {
            return Err(Error::Config("pool contribution exceeds 100%".into()));
        }
        Ok(())
    }
}

fn data_dir_from_env() -> PathBuf {
    PathBuf::from(std::env::var("TRELLIS_DATA_DIR").unwrap_or_else(|_| "./trellis-data".to_string()))
}

/// Admin socket path: `TRELLIS_ADMIN_SOCKET`, else `admin.sock` in
/// `TRELLIS_DATA_DIR`. Shared by the node and `trellis-admin`.
pub fn admin_socket_from_env() -> PathBuf {
    match std::env::var("TRELLIS_ADMIN_SOCKET") {
        Ok(path) => PathBuf::from(path),
        Err(_) => data_dir_from_env().join("admin.sock"),
    }
}

fn env_parse<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::Config(format!("{}={:?}: {}", name, raw, e))),
        Err(_) => Ok(None),
    }
}
