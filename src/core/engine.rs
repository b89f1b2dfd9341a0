//! Synchronous yield engine
//!
//! This module provides the YieldEngine that orchestrates every user-facing
//! operation by coordinating the catalog, the per-user ledgers, the state
//! store, the clock and the balance listener.
//!
//! # Commit protocol
//!
//! Every mutating operation runs against a clone of the user's ledger. The
//! resulting state is saved through the [`StateStore`]; only when the save
//! succeeds is the clone swapped in and the listener notified. A failed save
//! leaves both memory and store exactly as they were.
//!
//! Writers are serialized by `&mut self`. For concurrent access use
//! [`AsyncYieldEngine`](crate::core::AsyncYieldEngine).

use std::collections::BTreeMap;
use std::iter;
use std::ops::Bound::{Excluded, Unbounded};

use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::core::accrual::AccrualSummary;
use crate::core::catalog::Catalog;
use crate::core::ids::IdAllocator;
use crate::core::ledger::{
    ledgers_from_snapshot, snapshot_from_ledgers, PurchaseReceipt, ReviewOutcome, UserLedger,
};
use crate::core::traits::{
    BalanceCause, BalanceEvent, BalanceListener, Clock, NoopListener, StateStore,
};
use crate::types::{
    Account, ProductId, TransactionId, TransactionRecord, User, UserId, YieldError,
};

/// Single-threaded engine over a whole-snapshot store
pub struct YieldEngine<S: StateStore, C: Clock> {
    catalog: Catalog,
    config: EngineConfig,
    store: S,
    clock: C,
    listener: Box<dyn BalanceListener>,
    ledgers: BTreeMap<UserId, UserLedger>,
    ids: IdAllocator,
}

impl<S: StateStore, C: Clock> YieldEngine<S, C> {
    /// Load the stored state and build an engine around it
    ///
    /// # Errors
    ///
    /// Returns the store's error if the snapshot cannot be loaded.
    pub fn open(
        catalog: Catalog,
        config: EngineConfig,
        store: S,
        clock: C,
    ) -> Result<Self, YieldError> {
        let snapshot = store.load()?;
        let ids = IdAllocator::seeded_from(&snapshot);
        let ledgers = ledgers_from_snapshot(snapshot);

        info!(
            users = ledgers.len(),
            products = catalog.len(),
            "engine opened"
        );

        Ok(YieldEngine {
            catalog,
            config,
            store,
            clock,
            listener: Box::new(NoopListener),
            ledgers,
            ids,
        })
    }

    /// Replace the balance listener
    pub fn with_listener(mut self, listener: impl BalanceListener + 'static) -> Self {
        self.listener = Box::new(listener);
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Create a zero-balance account
    ///
    /// # Errors
    ///
    /// - `UserAlreadyExists` if the id is taken
    /// - `UnknownReferrer` if `referrer` is not registered or is the user itself
    pub fn register_user(
        &mut self,
        user: UserId,
        referrer: Option<UserId>,
    ) -> Result<&Account, YieldError> {
        if self.ledgers.contains_key(&user) {
            return Err(YieldError::UserAlreadyExists { user });
        }
        if let Some(referrer) = referrer {
            if referrer == user || !self.ledgers.contains_key(&referrer) {
                return Err(YieldError::UnknownReferrer { user, referrer });
            }
        }

        let ledger = UserLedger::new(User::new(user, referrer));
        self.persist_with(&ledger)?;
        info!(user, ?referrer, "user registered");

        Ok(self.ledgers.entry(user).or_insert(ledger).account())
    }

    /// Buy one instance of a catalog product
    ///
    /// # Errors
    ///
    /// - `UnknownProduct` if the product is not in the catalog
    /// - `UnknownUser` if the user is not registered
    /// - `PurchaseLimitReached` or `InsufficientBalance` from the ledger
    /// - a persistence error if the save failed; nothing was changed
    pub fn buy(&mut self, user: UserId, product: ProductId) -> Result<PurchaseReceipt, YieldError> {
        let product = self
            .catalog
            .get(product)
            .cloned()
            .ok_or(YieldError::UnknownProduct { product })?;
        let now = self.clock.now_millis();

        let receipt = self.apply(user, BalanceCause::Purchase, |ledger, _, ids| {
            ledger.buy(&product, now, ids)
        })?;

        info!(
            user,
            product = product.id,
            purchase = receipt.purchase_id,
            balance = %receipt.balance_after,
            "plan purchased"
        );
        Ok(receipt)
    }

    /// Credit income owed to one user up to now
    ///
    /// Nothing is saved when no purchase earned or expired.
    pub fn accrue(&mut self, user: UserId) -> Result<AccrualSummary, YieldError> {
        let now = self.clock.now_millis();
        let ms_per_day = self.config.ms_per_day;

        let summary = self.apply(user, BalanceCause::Accrual, |ledger, catalog, ids| {
            ledger.accrue(catalog, now, ms_per_day, ids)
        })?;

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

    /// Accrue every registered user
    ///
    /// A failure for one user does not stop the others.
    pub fn accrue_all(&mut self) -> Vec<(UserId, Result<AccrualSummary, YieldError>)> {
        let users: Vec<UserId> = self.ledgers.keys().copied().collect();
        users
            .into_iter()
            .map(|user| (user, self.accrue(user)))
            .collect()
    }

    /// Record a deposit awaiting review
    pub fn request_recharge(
        &mut self,
        user: UserId,
        amount: Decimal,
        utr: Option<String>,
    ) -> Result<TransactionId, YieldError> {
        let now = self.clock.now_millis();
        // a pending recharge never moves a balance, so no event is emitted
        let tx = self.apply(user, BalanceCause::Review, |ledger, _, ids| {
            ledger.request_recharge(amount, utr, now, ids)
        })?;

        info!(user, tx, %amount, "recharge requested");
        Ok(tx)
    }

    /// Record a payout request and reserve its amount
    pub fn request_withdrawal(
        &mut self,
        user: UserId,
        amount: Decimal,
        details: Option<String>,
    ) -> Result<TransactionId, YieldError> {
        let now = self.clock.now_millis();
        let tx = self.apply(user, BalanceCause::WithdrawalRequest, |ledger, _, ids| {
            ledger.request_withdrawal(amount, details, now, ids)
        })?;

        info!(user, tx, %amount, "withdrawal requested");
        Ok(tx)
    }

    /// Credit a referral commission
    pub fn grant_commission(
        &mut self,
        user: UserId,
        amount: Decimal,
        details: Option<String>,
    ) -> Result<TransactionId, YieldError> {
        let now = self.clock.now_millis();
        let tx = self.apply(user, BalanceCause::Commission, |ledger, _, ids| {
            ledger.grant_commission(amount, details, now, ids)
        })?;

        info!(user, tx, %amount, "commission granted");
        Ok(tx)
    }

    /// Approve a pending recharge or withdrawal of `user`
    pub fn approve(
        &mut self,
        user: UserId,
        tx: TransactionId,
    ) -> Result<ReviewOutcome, YieldError> {
        let outcome = self.apply(user, BalanceCause::Review, |ledger, _, _| ledger.approve(tx))?;
        info!(user, tx, tx_type = outcome.tx_type.as_str(), "transaction approved");
        Ok(outcome)
    }

    /// Reject a pending recharge or withdrawal of `user`
    pub fn reject(&mut self, user: UserId, tx: TransactionId) -> Result<ReviewOutcome, YieldError> {
        let outcome = self.apply(user, BalanceCause::Review, |ledger, _, _| ledger.reject(tx))?;
        info!(user, tx, tx_type = outcome.tx_type.as_str(), "transaction rejected");
        Ok(outcome)
    }

    pub fn account(&self, user: UserId) -> Result<&Account, YieldError> {
        self.ledger(user).map(UserLedger::account)
    }

    pub fn ledger(&self, user: UserId) -> Result<&UserLedger, YieldError> {
        self.ledgers
            .get(&user)
            .ok_or(YieldError::UnknownUser { user })
    }

    /// A user's transactions in the order they were recorded
    pub fn history(&self, user: UserId) -> Result<&[TransactionRecord], YieldError> {
        self.ledger(user).map(|ledger| ledger.transactions().records())
    }

    /// Every registered user with their account, ordered by id
    pub fn accounts(&self) -> Vec<User> {
        self.ledgers.values().map(|l| l.user().clone()).collect()
    }

    /// Run `op` on a working copy of the user's ledger and commit it
    fn apply<T>(
        &mut self,
        user: UserId,
        cause: BalanceCause,
        op: impl FnOnce(&mut UserLedger, &Catalog, &IdAllocator) -> Result<T, YieldError>,
    ) -> Result<T, YieldError> {
        let current = self
            .ledgers
            .get(&user)
            .ok_or(YieldError::UnknownUser { user })?;
        let mut working = current.clone();

        let value = op(&mut working, &self.catalog, &self.ids)?;

        let balance_moved = working.account() != current.account();
        if working != *current {
            self.persist_with(&working)?;
            self.ledgers.insert(user, working);
        }

        if balance_moved {
            if let Some(ledger) = self.ledgers.get(&user) {
                self.listener.on_balance_changed(&BalanceEvent {
                    user_id: user,
                    cause,
                    balance: ledger.account().balance,
                    withdrawable_balance: ledger.account().withdrawable_balance,
                });
            }
        }

        Ok(value)
    }

    /// Save the current state with `ledger` in place of its user's entry
    fn persist_with(&self, ledger: &UserLedger) -> Result<(), YieldError> {
        let user = ledger.user_id();
        let before = self.ledgers.range(..user).map(|(_, l)| l);
        let after = self.ledgers.range((Excluded(user), Unbounded)).map(|(_, l)| l);
        let snapshot = snapshot_from_ledgers(before.chain(iter::once(ledger)).chain(after));

        self.store.save(&snapshot).inspect_err(|e| {
            warn!(user, error = %e, "save failed, operation rolled back");
        })
    }
}
