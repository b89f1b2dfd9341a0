//! Per-user aggregate and its operations
//!
//! A `UserLedger` bundles everything one user's operations read and write:
//! the account projection, the purchases and the transaction log. Every
//! mutating operation in the crate acts on exactly one ledger, which is what
//! makes per-user serialization sufficient for consistency.
//!
//! Operations validate their preconditions before mutating. Engines still
//! apply them to a working copy and only swap it in after the store accepted
//! it, so a failure at any point never leaves a partially applied ledger.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use tracing::warn;

use crate::core::account_manager::AccountManager;
use crate::core::accrual::{self, AccrualSummary};
use crate::core::catalog::Catalog;
use crate::core::ids::IdAllocator;
use crate::core::purchase_ledger::PurchaseLedger;
use crate::core::transaction_log::TransactionLog;
use crate::types::{
    Account, Product, ProductId, Purchase, PurchaseId, PurchaseStatus, Snapshot, Timestamp,
    TransactionId, TransactionRecord, TransactionStatus, TransactionType, User, UserId,
    YieldError,
};

/// Result of a successful purchase
#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseReceipt {
    pub purchase_id: PurchaseId,
    pub product_id: ProductId,
    pub transaction_id: TransactionId,
    pub balance_after: Decimal,
}

/// Result of a successful review
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewOutcome {
    pub transaction_id: TransactionId,
    pub tx_type: TransactionType,
    pub status: TransactionStatus,
    pub amount: Decimal,
}

/// One user's account, purchases and transactions
#[derive(Debug, Clone, PartialEq)]
pub struct UserLedger {
    account: AccountManager,
    purchases: PurchaseLedger,
    transactions: TransactionLog,
}

impl UserLedger {
    /// A freshly registered user with nothing owned
    pub fn new(user: User) -> Self {
        UserLedger {
            account: AccountManager::new(user),
            purchases: PurchaseLedger::new(),
            transactions: TransactionLog::new(),
        }
    }

    pub fn from_parts(
        user: User,
        purchases: Vec<Purchase>,
        transactions: Vec<TransactionRecord>,
    ) -> Self {
        UserLedger {
            account: AccountManager::new(user),
            purchases: PurchaseLedger::from_purchases(purchases),
            transactions: TransactionLog::from_records(transactions),
        }
    }

    pub fn user_id(&self) -> UserId {
        self.account.user_id()
    }

    pub fn user(&self) -> &User {
        self.account.user()
    }

    pub fn account(&self) -> &Account {
        self.account.account()
    }

    pub fn purchases(&self) -> &PurchaseLedger {
        &self.purchases
    }

    pub fn transactions(&self) -> &TransactionLog {
        &self.transactions
    }

    pub(crate) fn parts_mut(
        &mut self,
    ) -> (&mut AccountManager, &mut PurchaseLedger, &mut TransactionLog) {
        (&mut self.account, &mut self.purchases, &mut self.transactions)
    }

    /// Whether the balance equals the signed sum of approved transactions
    pub fn is_reconciled(&self) -> bool {
        self.account().balance == self.transactions.reconciled_balance()
    }

    /// Buy one instance of `product`
    ///
    /// # Errors
    ///
    /// - `PurchaseLimitReached` if the user already owns `purchase_limit` copies
    /// - `InsufficientBalance` if the balance is lower than the price
    pub fn buy(
        &mut self,
        product: &Product,
        now: Timestamp,
        ids: &IdAllocator,
    ) -> Result<PurchaseReceipt, YieldError> {
        let user = self.user_id();

        let owned = self.purchases.owned_count(product.id);
        if owned >= product.purchase_limit as usize {
            return Err(YieldError::PurchaseLimitReached {
                user,
                product: product.id,
                limit: product.purchase_limit,
            });
        }

        self.account.record_investment(product.price)?;

        let purchase_id = ids.next_purchase();
        self.purchases.push(Purchase {
            id: purchase_id,
            user_id: user,
            product_id: product.id,
            purchase_timestamp: now,
            last_collection_timestamp: now,
            days_remaining: product.duration_days,
            status: PurchaseStatus::Active,
        });

        let transaction_id = ids.next_transaction();
        self.transactions.append(TransactionRecord {
            id: transaction_id,
            user_id: user,
            tx_type: TransactionType::Purchase,
            amount: product.price,
            status: TransactionStatus::Approved,
            timestamp: now,
            utr: None,
            details: Some(format!("purchase of {}", product.name)),
        });

        Ok(PurchaseReceipt {
            purchase_id,
            product_id: product.id,
            transaction_id,
            balance_after: self.account().balance,
        })
    }

    /// Credit income owed for elapsed whole days
    ///
    /// See [`accrual::accrue`] for the algorithm.
    pub fn accrue(
        &mut self,
        catalog: &Catalog,
        now: Timestamp,
        ms_per_day: i64,
        ids: &IdAllocator,
    ) -> Result<AccrualSummary, YieldError> {
        accrual::accrue(self, catalog, now, ms_per_day, ids)
    }

    /// Record a manual deposit awaiting review
    ///
    /// The balance is untouched until the recharge is approved.
    pub fn request_recharge(
        &mut self,
        amount: Decimal,
        utr: Option<String>,
        now: Timestamp,
        ids: &IdAllocator,
    ) -> Result<TransactionId, YieldError> {
        ensure_positive(amount, "recharge")?;

        let id = ids.next_transaction();
        self.transactions.append(TransactionRecord {
            id,
            user_id: self.user_id(),
            tx_type: TransactionType::Recharge,
            amount,
            status: TransactionStatus::Pending,
            timestamp: now,
            utr,
            details: None,
        });
        Ok(id)
    }

    /// Record a payout request awaiting review
    ///
    /// The amount is reserved from the withdrawable balance right away and
    /// given back if the request is rejected.
    pub fn request_withdrawal(
        &mut self,
        amount: Decimal,
        details: Option<String>,
        now: Timestamp,
        ids: &IdAllocator,
    ) -> Result<TransactionId, YieldError> {
        ensure_positive(amount, "withdrawal")?;

        self.account.reserve_withdrawable(amount)?;

        let id = ids.next_transaction();
        self.transactions.append(TransactionRecord {
            id,
            user_id: self.user_id(),
            tx_type: TransactionType::Withdraw,
            amount,
            status: TransactionStatus::Pending,
            timestamp: now,
            utr: None,
            details,
        });
        Ok(id)
    }

    /// Credit a referral commission to both balances
    pub fn grant_commission(
        &mut self,
        amount: Decimal,
        details: Option<String>,
        now: Timestamp,
        ids: &IdAllocator,
    ) -> Result<TransactionId, YieldError> {
        ensure_positive(amount, "commission")?;

        self.account.credit_balance(amount, "commission")?;
        self.account.credit_withdrawable(amount, "commission")?;

        let id = ids.next_transaction();
        self.transactions.append(TransactionRecord {
            id,
            user_id: self.user_id(),
            tx_type: TransactionType::Commission,
            amount,
            status: TransactionStatus::Approved,
            timestamp: now,
            utr: None,
            details,
        });
        Ok(id)
    }

    /// Approve a pending recharge or withdrawal
    ///
    /// A recharge credits the balance. A withdrawal is paid out of the
    /// balance and added to the withdrawn total.
    ///
    /// Approving a withdrawal does not debit the withdrawable balance. That
    /// debit already happened when the withdrawal was requested, and a
    /// rejection refunds it. The balance is what gets debited here, so it
    /// stays equal to the signed sum of approved transactions.
    ///
    /// # Errors
    ///
    /// - `TransactionNotFound` for an id outside this user's log
    /// - `NotReviewable` for profit, purchase and commission records
    /// - `TransactionNotPending` if the record was already reviewed
    /// - `InsufficientBalance` if a withdrawal can no longer be covered
    pub fn approve(&mut self, tx_id: TransactionId) -> Result<ReviewOutcome, YieldError> {
        let (tx_type, amount) = self.pending_reviewable(tx_id)?;

        match tx_type {
            TransactionType::Recharge => self.account.credit_balance(amount, "recharge")?,
            _ => self.account.record_withdrawal(amount)?,
        }

        self.finish_review(tx_id, TransactionStatus::Approved)
    }

    /// Reject a pending recharge or withdrawal
    ///
    /// A rejected withdrawal returns its reservation to the withdrawable
    /// balance; a rejected recharge changes nothing but its status.
    pub fn reject(&mut self, tx_id: TransactionId) -> Result<ReviewOutcome, YieldError> {
        let (tx_type, amount) = self.pending_reviewable(tx_id)?;

        if tx_type == TransactionType::Withdraw {
            self.account.release_withdrawable(amount)?;
        }

        self.finish_review(tx_id, TransactionStatus::Rejected)
    }

    fn pending_reviewable(
        &self,
        tx_id: TransactionId,
    ) -> Result<(TransactionType, Decimal), YieldError> {
        let record = self
            .transactions
            .get(tx_id)
            .ok_or_else(|| YieldError::transaction_not_found(tx_id, self.user_id()))?;

        if !record.tx_type.is_reviewable() {
            return Err(YieldError::NotReviewable {
                tx: tx_id,
                tx_type: record.tx_type,
            });
        }
        if record.status.is_terminal() {
            return Err(YieldError::TransactionNotPending {
                tx: tx_id,
                status: record.status,
            });
        }

        Ok((record.tx_type, record.amount))
    }

    fn finish_review(
        &mut self,
        tx_id: TransactionId,
        status: TransactionStatus,
    ) -> Result<ReviewOutcome, YieldError> {
        let user = self.user_id();
        let record = self.transactions.transition(user, tx_id, status)?;

        Ok(ReviewOutcome {
            transaction_id: record.id,
            tx_type: record.tx_type,
            status: record.status,
            amount: record.amount,
        })
    }
}

fn ensure_positive(amount: Decimal, operation: &str) -> Result<(), YieldError> {
    if amount <= Decimal::ZERO {
        return Err(YieldError::invalid_amount(amount, operation));
    }
    Ok(())
}

/// Split a persisted snapshot into per-user ledgers
///
/// Purchases and transactions that reference an unregistered user are
/// dropped with a warning.
pub fn ledgers_from_snapshot(snapshot: Snapshot) -> BTreeMap<UserId, UserLedger> {
    let mut purchases: BTreeMap<UserId, Vec<Purchase>> = BTreeMap::new();
    for purchase in snapshot.purchases {
        purchases.entry(purchase.user_id).or_default().push(purchase);
    }

    let mut transactions: BTreeMap<UserId, Vec<TransactionRecord>> = BTreeMap::new();
    for record in snapshot.transactions {
        transactions.entry(record.user_id).or_default().push(record);
    }

    let mut ledgers = BTreeMap::new();
    for user in snapshot.users {
        let id = user.id;
        let ledger = UserLedger::from_parts(
            user,
            purchases.remove(&id).unwrap_or_default(),
            transactions.remove(&id).unwrap_or_default(),
        );
        ledgers.insert(id, ledger);
    }

    for (user, orphans) in &purchases {
        warn!(user, count = orphans.len(), "dropping purchases of unregistered user");
    }
    for (user, orphans) in &transactions {
        warn!(user, count = orphans.len(), "dropping transactions of unregistered user");
    }

    ledgers
}

/// Flatten ledgers back into the persisted snapshot shape
pub fn snapshot_from_ledgers<'a>(ledgers: impl IntoIterator<Item = &'a UserLedger>) -> Snapshot {
    let mut snapshot = Snapshot::default();
    for ledger in ledgers {
        merge_ledger(&mut snapshot, ledger);
    }
    snapshot
}

/// Replace one user's entries inside a snapshot
pub fn merge_ledger(snapshot: &mut Snapshot, ledger: &UserLedger) {
    remove_ledger(snapshot, ledger.user_id());

    snapshot.users.push(ledger.user().clone());
    snapshot.purchases.extend(ledger.purchases().iter().cloned());
    snapshot.transactions.extend(ledger.transactions().iter().cloned());
}

/// Drop every record of one user from a snapshot
pub fn remove_ledger(snapshot: &mut Snapshot, user: UserId) {
    snapshot.users.retain(|u| u.id != user);
    snapshot.purchases.retain(|p| p.user_id != user);
    snapshot.transactions.retain(|t| t.user_id != user);
}

/// Extract one user's ledger from a snapshot
pub fn ledger_from_snapshot(snapshot: &Snapshot, user: UserId) -> Option<UserLedger> {
    let record = snapshot.users.iter().find(|u| u.id == user)?.clone();
    let purchases = snapshot
        .purchases
        .iter()
        .filter(|p| p.user_id == user)
        .cloned()
        .collect();
    let transactions = snapshot
        .transactions
        .iter()
        .filter(|t| t.user_id == user)
        .cloned()
        .collect();

    Some(UserLedger::from_parts(record, purchases, transactions))
}
