//! Trellis Ledger - placement and commission engine
//!
//! Keeps the participant tree of a referral network and the append-only
//! ledger of the money it moves. Participants are placed into a ternary tree
//! on their first confirmed payment; every later payment credits up to five
//! ancestors from a fixed commission table.
//!
//! # Architecture
//!
//! - **Models**: Participants, tree nodes, ledger entries, payouts
//! - **Storage**: RocksDB optimistic transactions with conflict detection
//! - **Engines**: Placement, hierarchy index, referral codes, commissions,
//!   promotion, pool payouts, wallet operations
//! - **Network**: Facade that runs each operation in a retried transaction
//! - **Admin Socket**: Unix socket for events and operator commands
//!
//! # Example
//!
//! ```no_run
//! use trellis_ledger::{Network, NetworkConfig, PaymentConfirmed};
//! use trellis_matrix::CommissionTable;
//!
//! # fn main() -> trellis_ledger::Result<()> {
//! let table = CommissionTable::parse("1000,500,300,200,100")?;
//! let network = Network::open(NetworkConfig::new("./trellis-data", table))?;
//! network.bootstrap_root("owner")?;
//! network.signup("alice", None)?;
//! network.payment_confirmed(&PaymentConfirmed {
//!     participant_id: "alice".into(),
//!     order_id: "order-1".into(),
//!     amount: 10_000,
//!     confirmed_at: 1_700_000_000,
//! })?;
//! # Ok(())
//! # }
//! ```

pub mod admin_socket;
pub mod commission;
pub mod config;
pub mod error;
pub mod hierarchy;
pub mod models;
pub mod network;
pub mod node;
pub mod payout;
pub mod placement;
pub mod promotion;
pub mod referral;
pub mod retry;
pub mod storage;
pub mod wallet;

pub use commission::{CommissionEngine, PaymentOutcome, PaymentReceipt};
pub use config::{NetworkConfig, PoolConfig, UnclaimedPolicy};
pub use error::{Error, Result};
pub use hierarchy::HierarchyIndex;
pub use models::{
    EntryCause, HierarchyEdge, LedgerEntry, LedgerKind, MatrixNode, OrderRecord, Participant,
    PaymentConfirmed, PayoutPlan, PoolPayoutRun, WithdrawalRequest, WithdrawalStatus,
};
pub use network::{Network, WalletSummary};
pub use node::TrellisNode;
pub use payout::{PayoutOutcome, PoolPayoutScheduler};
pub use placement::TreePlacementEngine;
pub use promotion::LevelPromotionEngine;
pub use referral::{ClaimAttempt, ReferralCodeAllocator};
pub use storage::{Storage, Txn};
pub use wallet::BonusOutcome;
