//! Core business logic module
//!
//! This module contains the yield engine components:
//! - `catalog` - The immutable plan list
//! - `account_manager` - Balance mutations with checked arithmetic
//! - `purchase_ledger` - Owned plan instances
//! - `transaction_log` - Append-only audit trail with review transitions
//! - `ledger` - Per-user aggregate and its operations
//! - `accrual` - Lazy whole-day income crediting
//! - `engine` - Synchronous orchestration with commit/rollback
//! - `async` - Concurrent engine and periodic scheduler
//! - `traits`, `clock`, `ids` - Collaborator seams, time sources, id allocation

pub mod account_manager;
pub mod accrual;
pub mod r#async;
pub mod catalog;
pub mod clock;
pub mod engine;
pub mod ids;
pub mod ledger;
pub mod purchase_ledger;
pub mod traits;
pub mod transaction_log;

pub use account_manager::AccountManager;
pub use accrual::{AccrualSummary, PurchaseCredit, MS_PER_DAY};
pub use catalog::Catalog;
pub use clock::{ManualClock, SystemClock};
pub use engine::YieldEngine;
pub use ids::IdAllocator;
pub use ledger::{PurchaseReceipt, ReviewOutcome, UserLedger};
pub use purchase_ledger::PurchaseLedger;
pub use r#async::{AccrualOutcome, AccrualScheduler, AsyncYieldEngine, PassReport};
pub use traits::{
    BalanceCause, BalanceEvent, BalanceListener, Clock, LedgerStore, NoopListener, StateStore,
};
pub use transaction_log::TransactionLog;
