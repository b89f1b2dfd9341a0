//! Persisted state blob
//!
//! The snapshot is the whole application state as the stores see it: flat
//! lists of users, purchases and transactions. Engines work on per-user
//! [`UserLedger`](crate::core::UserLedger) aggregates and convert to and from
//! this shape at the persistence boundary.

use super::account::User;
use super::purchase::Purchase;
use super::transaction::TransactionRecord;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub users: Vec<User>,

    #[serde(default)]
    pub purchases: Vec<Purchase>,

    #[serde(default)]
    pub transactions: Vec<TransactionRecord>,
}

impl Snapshot {
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}
