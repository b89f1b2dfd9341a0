//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `account`: Account balances and the owning user record
//! - `product`: Catalog plans
//! - `purchase`: Owned plan instances
//! - `transaction`: Transaction records and identifiers
//! - `snapshot`: The persisted state blob
//! - `error`: Error types for the yield engine

pub mod account;
pub mod error;
pub mod product;
pub mod purchase;
pub mod snapshot;
pub mod transaction;

pub use account::{Account, User};
pub use error::{ErrorKind, YieldError};
pub use product::{Product, ProductId};
pub use purchase::{Purchase, PurchaseId, PurchaseStatus};
pub use snapshot::Snapshot;
pub use transaction::{
    Timestamp, TransactionId, TransactionRecord, TransactionStatus, TransactionType, UserId,
};
