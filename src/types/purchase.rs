//! Purchase (owned plan instance) types

use super::product::ProductId;
use super::transaction::{Timestamp, UserId};
use serde::{Deserialize, Serialize};

/// Purchase identifier
pub type PurchaseId = u64;

/// Lifecycle state of a purchase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PurchaseStatus {
    /// Still earning daily income
    Active,

    /// Term completed; inert but kept for history
    Expired,
}

/// One instance of a user owning one catalog product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Purchase {
    pub id: PurchaseId,

    pub user_id: UserId,

    pub product_id: ProductId,

    pub purchase_timestamp: Timestamp,

    /// Watermark up to which income has been credited
    ///
    /// Starts at the purchase time and only moves forward in whole-day steps.
    pub last_collection_timestamp: Timestamp,

    /// Days of income still owed; zero once expired
    pub days_remaining: u32,

    pub status: PurchaseStatus,
}

impl Purchase {
    pub fn is_active(&self) -> bool {
        self.status == PurchaseStatus::Active
    }
}
