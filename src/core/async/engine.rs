//! Concurrent yield engine
//!
//! This module provides the `AsyncYieldEngine`, which runs the same
//! operations as the synchronous engine from many tasks at once.
//!
//! # Design
//!
//! Each user's ledger lives in its own slot guarded by a `tokio::sync::Mutex`.
//! Operations on one user are serialized by that lock; operations on
//! different users proceed in parallel. The lock is held across the
//! persistence call, so a second operation on the same user always starts
//! from the committed result of the first.
//!
//! # Architecture
//!
//! ```text
//! AsyncYieldEngine
//!     ├── Arc<Catalog>                                  (immutable plans)
//!     ├── Arc<dyn LedgerStore>                          (per-user persistence)
//!     ├── Arc<dyn Clock> / Arc<dyn BalanceListener>
//!     └── Arc<DashMap<UserId, Arc<Mutex<UserSlot>>>>    (per-user ledgers)
//! ```
//!
//! # Persistence timeouts
//!
//! Saves run on the blocking pool and are bounded by
//! `EngineConfig::persist_timeout`. A timed-out save counts as a failure and
//! the operation is rolled back in memory. The user's lock stays held until
//! the blocking save has finished either way; if it landed late, the prior
//! ledger is written back before the failure is returned. No other operation
//! on that user starts while a save for it may still land.
//!
//! If writing the prior ledger back fails too, the slot is marked stale and
//! reloaded from the store before it is used again.

use std::sync::Arc;

use dashmap::DashMap;
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tokio::task::JoinError;
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::core::accrual::AccrualSummary;
use crate::core::catalog::Catalog;
use crate::core::ids::IdAllocator;
use crate::core::ledger::{ledgers_from_snapshot, PurchaseReceipt, ReviewOutcome, UserLedger};
use crate::core::traits::{
    BalanceCause, BalanceEvent, BalanceListener, Clock, LedgerStore, NoopListener,
};
use crate::types::{
    Account, ProductId, TransactionId, TransactionRecord, User, UserId, YieldError,
};

/// One user's ledger and whether it must be reloaded before use
struct UserSlot {
    ledger: UserLedger,
    stale: bool,
}

/// A save that did not commit
struct SaveFailure {
    error: YieldError,
    /// The store may hold the ledger that was rejected
    diverged: bool,
}

impl SaveFailure {
    fn clean(error: YieldError) -> Self {
        SaveFailure {
            error,
            diverged: false,
        }
    }
}

/// Cloneable handle to a concurrent engine
///
/// All clones share the same ledgers, store and id allocator.
#[derive(Clone)]
pub struct AsyncYieldEngine {
    catalog: Arc<Catalog>,
    config: EngineConfig,
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
    listener: Arc<dyn BalanceListener>,
    slots: Arc<DashMap<UserId, Arc<Mutex<UserSlot>>>>,
    /// Serializes registrations so referrer checks see a stable user set
    registration: Arc<Mutex<()>>,
    ids: Arc<IdAllocator>,
}

impl AsyncYieldEngine {
    /// Load every user from the store and build an engine around them
    pub async fn open<S, C>(
        catalog: Catalog,
        config: EngineConfig,
        store: Arc<S>,
        clock: Arc<C>,
    ) -> Result<Self, YieldError>
    where
        S: LedgerStore + 'static,
        C: Clock + 'static,
    {
        let store: Arc<dyn LedgerStore> = store;
        let clock: Arc<dyn Clock> = clock;
        let loader = Arc::clone(&store);
        let snapshot = tokio::task::spawn_blocking(move || loader.load_all())
            .await
            .map_err(|e| YieldError::persistence(format!("load task failed: {e}")))??;

        let ids = IdAllocator::seeded_from(&snapshot);
        let slots = DashMap::new();
        for (user, ledger) in ledgers_from_snapshot(snapshot) {
            slots.insert(
                user,
                Arc::new(Mutex::new(UserSlot {
                    ledger,
                    stale: false,
                })),
            );
        }

        info!(
            users = slots.len(),
            products = catalog.len(),
            max_concurrent_users = config.max_concurrent_users,
            "async engine opened"
        );

        Ok(AsyncYieldEngine {
            catalog: Arc::new(catalog),
            config,
            store,
            clock,
            listener: Arc::new(NoopListener),
            slots: Arc::new(slots),
            registration: Arc::new(Mutex::new(())),
            ids: Arc::new(ids),
        })
    }

    /// Replace the balance listener
    pub fn with_listener(mut self, listener: impl BalanceListener + 'static) -> Self {
        self.listener = Arc::new(listener);
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Ids of every registered user, ascending
    pub fn user_ids(&self) -> Vec<UserId> {
        let mut ids: Vec<UserId> = self.slots.iter().map(|entry| *entry.key()).collect();
        ids.sort_unstable();
        ids
    }

    /// Create a zero-balance account
    pub async fn register_user(
        &self,
        user: UserId,
        referrer: Option<UserId>,
    ) -> Result<Account, YieldError> {
        let _registration = self.registration.lock().await;

        if self.slots.contains_key(&user) {
            return Err(YieldError::UserAlreadyExists { user });
        }
        if let Some(referrer) = referrer {
            if referrer == user || !self.slots.contains_key(&referrer) {
                return Err(YieldError::UnknownReferrer { user, referrer });
            }
        }

        let ledger = UserLedger::new(User::new(user, referrer));
        if let Err(failure) = self.persist(ledger.clone(), None).await {
            if failure.diverged {
                // the store kept the user; adopt it and reload on first use
                self.slots.insert(
                    user,
                    Arc::new(Mutex::new(UserSlot {
                        ledger,
                        stale: true,
                    })),
                );
            }
            warn!(user, error = %failure.error, "registration not saved");
            return Err(failure.error);
        }

        let account = ledger.account().clone();
        self.slots.insert(
            user,
            Arc::new(Mutex::new(UserSlot {
                ledger,
                stale: false,
            })),
        );
        info!(user, ?referrer, "user registered");
        Ok(account)
    }

    pub async fn buy(
        &self,
        user: UserId,
        product: ProductId,
    ) -> Result<PurchaseReceipt, YieldError> {
        let product = self
            .catalog
            .get(product)
            .cloned()
            .ok_or(YieldError::UnknownProduct { product })?;
        let now = self.clock.now_millis();

        let receipt = self
            .apply(user, BalanceCause::Purchase, move |ledger, _, ids| {
                ledger.buy(&product, now, ids)
            })
            .await?;

        info!(
            user,
            product = receipt.product_id,
            purchase = receipt.purchase_id,
            balance = %receipt.balance_after,
            "plan purchased"
        );
        Ok(receipt)
    }

    /// Credit income owed to one user up to now
    pub async fn accrue(&self, user: UserId) -> Result<AccrualSummary, YieldError> {
        let ms_per_day = self.config.ms_per_day;
        let clock = Arc::clone(&self.clock);

        // read under the user's lock: passes of one user see non-decreasing instants
        let summary = self
            .apply(user, BalanceCause::Accrual, move |ledger, catalog, ids| {
                ledger.accrue(catalog, clock.now_millis(), ms_per_day, ids)
            })
            .await?;

        if summary.is_empty() {
            debug!(user, "nothing to accrue");
        } else {
            info!(
                user,
                earnings = %summary.total_earnings,
                credited = summary.credits.len(),
                expired = summary.expired.len(),
                "income accrued"
            );
        }
        Ok(summary)
    }

    pub async fn request_recharge(
        &self,
        user: UserId,
        amount: Decimal,
        utr: Option<String>,
    ) -> Result<TransactionId, YieldError> {
        let now = self.clock.now_millis();
        let tx = self
            .apply(user, BalanceCause::Review, move |ledger, _, ids| {
                ledger.request_recharge(amount, utr, now, ids)
            })
            .await?;

        info!(user, tx, %amount, "recharge requested");
        Ok(tx)
    }

    pub async fn request_withdrawal(
        &self,
        user: UserId,
        amount: Decimal,
        details: Option<String>,
    ) -> Result<TransactionId, YieldError> {
        let now = self.clock.now_millis();
        let tx = self
            .apply(user, BalanceCause::WithdrawalRequest, move |ledger, _, ids| {
                ledger.request_withdrawal(amount, details, now, ids)
            })
            .await?;

        info!(user, tx, %amount, "withdrawal requested");
        Ok(tx)
    }

    pub async fn grant_commission(
        &self,
        user: UserId,
        amount: Decimal,
        details: Option<String>,
    ) -> Result<TransactionId, YieldError> {
        let now = self.clock.now_millis();
        let tx = self
            .apply(user, BalanceCause::Commission, move |ledger, _, ids| {
                ledger.grant_commission(amount, details, now, ids)
            })
            .await?;

        info!(user, tx, %amount, "commission granted");
        Ok(tx)
    }

    pub async fn approve(
        &self,
        user: UserId,
        tx: TransactionId,
    ) -> Result<ReviewOutcome, YieldError> {
        let outcome = self
            .apply(user, BalanceCause::Review, move |ledger, _, _| ledger.approve(tx))
            .await?;
        info!(user, tx, tx_type = outcome.tx_type.as_str(), "transaction approved");
        Ok(outcome)
    }

    pub async fn reject(
        &self,
        user: UserId,
        tx: TransactionId,
    ) -> Result<ReviewOutcome, YieldError> {
        let outcome = self
            .apply(user, BalanceCause::Review, move |ledger, _, _| ledger.reject(tx))
            .await?;
        info!(user, tx, tx_type = outcome.tx_type.as_str(), "transaction rejected");
        Ok(outcome)
    }

    /// Copy of one user's committed ledger
    pub async fn ledger(&self, user: UserId) -> Result<UserLedger, YieldError> {
        let slot = self.slot(user)?;
        let mut guard = slot.lock().await;
        self.refresh(user, &mut guard).await?;
        Ok(guard.ledger.clone())
    }

    pub async fn account(&self, user: UserId) -> Result<Account, YieldError> {
        self.ledger(user).await.map(|ledger| ledger.account().clone())
    }

    pub async fn history(&self, user: UserId) -> Result<Vec<TransactionRecord>, YieldError> {
        self.ledger(user)
            .await
            .map(|ledger| ledger.transactions().records().to_vec())
    }

    /// Every registered user with their account, ordered by id
    pub async fn accounts(&self) -> Result<Vec<User>, YieldError> {
        let mut users = Vec::new();
        for id in self.user_ids() {
            users.push(self.ledger(id).await?.user().clone());
        }
        Ok(users)
    }

    fn slot(&self, user: UserId) -> Result<Arc<Mutex<UserSlot>>, YieldError> {
        self.slots
            .get(&user)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(YieldError::UnknownUser { user })
    }

    /// Run `op` on a working copy of the user's ledger and commit it
    ///
    /// The user's lock is held from before the copy until after the save.
    async fn apply<T, F>(&self, user: UserId, cause: BalanceCause, op: F) -> Result<T, YieldError>
    where
        F: FnOnce(&mut UserLedger, &Catalog, &IdAllocator) -> Result<T, YieldError> + Send,
        T: Send,
    {
        let slot = self.slot(user)?;
        let mut guard = slot.lock().await;
        self.refresh(user, &mut guard).await?;

        let mut working = guard.ledger.clone();
        let value = op(&mut working, &self.catalog, &self.ids)?;

        let balance_moved = working.account() != guard.ledger.account();
        if working != guard.ledger {
            let prior = guard.ledger.clone();
            if let Err(failure) = self.persist(working.clone(), Some(prior)).await {
                guard.stale = failure.diverged;
                warn!(user, error = %failure.error, "save failed, operation rolled back");
                return Err(failure.error);
            }
            guard.ledger = working;
        }

        let event = BalanceEvent {
            user_id: user,
            cause,
            balance: guard.ledger.account().balance,
            withdrawable_balance: guard.ledger.account().withdrawable_balance,
        };
        drop(guard);

        if balance_moved {
            self.listener.on_balance_changed(&event);
        }
        Ok(value)
    }

    /// Reload a stale slot from the store
    async fn refresh(&self, user: UserId, slot: &mut UserSlot) -> Result<(), YieldError> {
        if !slot.stale {
            return Ok(());
        }

        let store = Arc::clone(&self.store);
        let loaded = self
            .bounded(user, move || store.load_ledger(user))
            .await?
            .ok_or(YieldError::UnknownUser { user })?;

        info!(user, "reloaded ledger after unreverted save");
        slot.ledger = loaded;
        slot.stale = false;
        Ok(())
    }

    /// Save `ledger`, or leave the store as it was before the call
    ///
    /// `prior` is the user's last committed ledger, `None` for a user being
    /// registered. Must be called with the user's lock held.
    async fn persist(
        &self,
        ledger: UserLedger,
        prior: Option<UserLedger>,
    ) -> Result<(), SaveFailure> {
        let user = ledger.user_id();
        let timeout = self.config.persist_timeout;
        let store = Arc::clone(&self.store);
        let mut task = tokio::task::spawn_blocking(move || store.save_ledger(&ledger));

        let late = match tokio::time::timeout(timeout, &mut task).await {
            Ok(joined) => return flatten(joined).map_err(SaveFailure::clean),
            Err(_) => task.await,
        };

        let timed_out = YieldError::PersistenceTimeout {
            user,
            timeout_ms: timeout.as_millis(),
        };
        if let Err(e) = flatten(late) {
            debug!(user, error = %e, "timed-out save failed, store unchanged");
            return Err(SaveFailure::clean(timed_out));
        }

        let store = Arc::clone(&self.store);
        let revert = tokio::task::spawn_blocking(move || match prior {
            Some(prior) => store.save_ledger(&prior),
            None => store.remove_ledger(user),
        })
        .await;

        match flatten(revert) {
            Ok(()) => {
                warn!(user, "timed-out save landed late, reverted");
                Err(SaveFailure::clean(timed_out))
            }
            Err(e) => {
                error!(user, error = %e, "cannot revert late save, store diverged");
                Err(SaveFailure {
                    error: timed_out,
                    diverged: true,
                })
            }
        }
    }

    /// Run a read on the blocking pool, bounded by the persist timeout
    async fn bounded<T, F>(&self, user: UserId, call: F) -> Result<T, YieldError>
    where
        F: FnOnce() -> Result<T, YieldError> + Send + 'static,
        T: Send + 'static,
    {
        let timeout = self.config.persist_timeout;
        let task = tokio::task::spawn_blocking(call);

        match tokio::time::timeout(timeout, task).await {
            Ok(joined) => flatten(joined),
            Err(_) => Err(YieldError::PersistenceTimeout {
                user,
                timeout_ms: timeout.as_millis(),
            }),
        }
    }
}

fn flatten<T>(joined: Result<Result<T, YieldError>, JoinError>) -> Result<T, YieldError> {
    joined.map_err(|e| YieldError::persistence(format!("store task failed: {e}")))?
}
