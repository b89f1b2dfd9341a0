//! In-memory persistence for tests and simulations
//!
//! Behaves like a durable store but can be told to fail or stall on the
//! next saves, which is how rollback and timeout paths are exercised.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::core::ledger::{ledger_from_snapshot, merge_ledger, remove_ledger, UserLedger};
use crate::core::traits::{LedgerStore, StateStore};
use crate::types::{Snapshot, UserId, YieldError};

#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshot: Mutex<Snapshot>,
    fail_next: AtomicUsize,
    save_delay: Mutex<Option<Duration>>,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        MemoryStore {
            snapshot: Mutex::new(snapshot),
            ..Self::default()
        }
    }

    /// Make the next `count` saves fail without storing anything
    pub fn fail_next_saves(&self, count: usize) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    /// Block every save for `delay` before it completes
    pub fn set_save_delay(&self, delay: Option<Duration>) {
        if let Ok(mut slot) = self.save_delay.lock() {
            *slot = delay;
        }
    }

    /// Number of saves that were stored successfully
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Copy of the stored state
    pub fn stored(&self) -> Result<Snapshot, YieldError> {
        self.snapshot
            .lock()
            .map(|s| s.clone())
            .map_err(|_| YieldError::persistence("memory store poisoned"))
    }

    /// Failures are decided when a save starts; a save already stalling
    /// is not affected by `fail_next_saves`
    fn before_save(&self) -> Result<(), YieldError> {
        let injected = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(YieldError::persistence("injected save failure"));
        }

        let delay = self
            .save_delay
            .lock()
            .map_err(|_| YieldError::persistence("memory store poisoned"))?
            .to_owned();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        Ok(())
    }

    fn update(&self, apply: impl FnOnce(&mut Snapshot)) -> Result<(), YieldError> {
        self.before_save()?;
        let mut stored = self
            .snapshot
            .lock()
            .map_err(|_| YieldError::persistence("memory store poisoned"))?;
        apply(&mut stored);
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl StateStore for MemoryStore {
    fn load(&self) -> Result<Snapshot, YieldError> {
        self.stored()
    }

    fn save(&self, snapshot: &Snapshot) -> Result<(), YieldError> {
        self.update(|stored| *stored = snapshot.clone())
    }
}

impl LedgerStore for MemoryStore {
    fn load_all(&self) -> Result<Snapshot, YieldError> {
        self.stored()
    }

    fn load_ledger(&self, user: UserId) -> Result<Option<UserLedger>, YieldError> {
        Ok(ledger_from_snapshot(&self.stored()?, user))
    }

    fn save_ledger(&self, ledger: &UserLedger) -> Result<(), YieldError> {
        self.update(|stored| merge_ledger(stored, ledger))
    }

    fn remove_ledger(&self, user: UserId) -> Result<(), YieldError> {
        self.update(|stored| remove_ledger(stored, user))
    }
}
