//! Purchase events and processed-order records.

use serde::{Deserialize, Serialize};

/// "Payment confirmed" trigger from the order layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentConfirmed {
    /// Buyer
    pub participant_id: String,

    /// Order id, unique across all participants
    pub order_id: String,

    /// Order amount in minor units
    pub amount: u64,

    /// Confirmation time (unix seconds); selects the pool period
    pub confirmed_at: u64,
}

/// Record of a processed order. Its presence marks the order as done.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderRecord {
    /// Order id
    pub order_id: String,

    /// Buyer
    pub participant_id: String,

    /// Order amount
    pub amount: u64,

    /// Whether this was the buyer's first confirmed payment
    pub joining: bool,

    /// Pool period the order counted towards
    pub period: u64,

    /// Commission entries written for this order, by increasing depth
    pub entry_ids: Vec<String>,

    /// Processing time (unix millis)
    pub processed_at: u64,
}
