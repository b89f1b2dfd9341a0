//! Collaborator traits for persistence, time and balance notifications
//!
//! The engines never read ambient global state: the store, the clock and the
//! listener are explicit dependencies handed in at construction time. Both the
//! synchronous and the asynchronous engine are written against these traits.

use std::sync::Arc;

use rust_decimal::Decimal;

use crate::core::ledger::UserLedger;
use crate::types::{Snapshot, Timestamp, UserId, YieldError};

/// Source of wall-clock time in milliseconds since the Unix epoch
///
/// Injectable so tests can move time forward by whole days.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> Timestamp;
}

impl<T: Clock + ?Sized> Clock for Arc<T> {
    fn now_millis(&self) -> Timestamp {
        (**self).now_millis()
    }
}

/// Whole-blob persistence used by the synchronous engine
///
/// `save` must be atomic: after a failed save the previously stored
/// snapshot is still the one `load` returns.
pub trait StateStore {
    /// Load the stored snapshot, or an empty one if nothing was stored yet
    fn load(&self) -> Result<Snapshot, YieldError>;

    /// Replace the stored snapshot
    fn save(&self, snapshot: &Snapshot) -> Result<(), YieldError>;
}

impl<T: StateStore + ?Sized> StateStore for Arc<T> {
    fn load(&self) -> Result<Snapshot, YieldError> {
        (**self).load()
    }

    fn save(&self, snapshot: &Snapshot) -> Result<(), YieldError> {
        (**self).save(snapshot)
    }
}

/// Per-user sub-document persistence used by the async engine
///
/// Saving one user's ledger must not overwrite another user's data, so
/// different users can be committed concurrently.
pub trait LedgerStore: Send + Sync {
    /// Load every user's data
    fn load_all(&self) -> Result<Snapshot, YieldError>;

    /// Load one user's ledger, `None` if the user was never saved
    fn load_ledger(&self, user: UserId) -> Result<Option<UserLedger>, YieldError>;

    /// Replace one user's ledger
    fn save_ledger(&self, ledger: &UserLedger) -> Result<(), YieldError>;

    /// Delete one user's ledger; a missing user is not an error
    fn remove_ledger(&self, user: UserId) -> Result<(), YieldError>;
}

/// What kind of operation changed a balance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceCause {
    Purchase,
    Accrual,
    Review,
    WithdrawalRequest,
    Commission,
}

/// Balance state after a committed mutation
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceEvent {
    pub user_id: UserId,
    pub cause: BalanceCause,
    pub balance: Decimal,
    pub withdrawable_balance: Decimal,
}

/// Hook fired after a balance mutation was durably committed
///
/// Delivery is fire-and-forget; implementations must not block.
pub trait BalanceListener: Send + Sync {
    fn on_balance_changed(&self, event: &BalanceEvent);
}

/// Listener that ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopListener;

impl BalanceListener for NoopListener {
    fn on_balance_changed(&self, _event: &BalanceEvent) {}
}
