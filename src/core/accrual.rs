//! Daily income accrual
//!
//! Income is credited lazily: whenever accrual runs for a user, every active
//! purchase is paid for the whole days that passed since its watermark, up
//! to the days it still has left. The watermark then advances by exactly the
//! credited days, so a partial day is never lost and never paid twice.
//!
//! Running accrual again at the same instant credits nothing. Running it
//! every minute or once after a month produces the same totals.

use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::core::catalog::Catalog;
use crate::core::ids::IdAllocator;
use crate::core::ledger::UserLedger;
use crate::types::{
    ProductId, Purchase, PurchaseId, PurchaseStatus, Timestamp, TransactionId,
    TransactionRecord, TransactionStatus, TransactionType, UserId, YieldError,
};

/// Length of one accrual day in milliseconds
pub const MS_PER_DAY: i64 = 86_400_000;

/// Income credited for one purchase in one accrual pass
#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseCredit {
    pub purchase_id: PurchaseId,
    pub product_id: ProductId,
    pub days: u32,
    pub earnings: Decimal,
    pub transaction_id: TransactionId,
    /// The purchase ran out of days with this credit
    pub expired: bool,
}

/// What one accrual pass did for one user
#[derive(Debug, Clone, PartialEq)]
pub struct AccrualSummary {
    pub user_id: UserId,
    pub total_earnings: Decimal,
    pub credits: Vec<PurchaseCredit>,
    /// Purchases that moved to `EXPIRED` during this pass
    pub expired: Vec<PurchaseId>,
}

impl AccrualSummary {
    fn new(user_id: UserId) -> Self {
        AccrualSummary {
            user_id,
            total_earnings: Decimal::ZERO,
            credits: Vec::new(),
            expired: Vec::new(),
        }
    }

    /// Nothing was credited and nothing expired
    pub fn is_empty(&self) -> bool {
        self.credits.is_empty() && self.expired.is_empty()
    }
}

/// Whole days of income owed to `purchase` at `now`
///
/// Floors the elapsed time to whole days and caps it at the days remaining.
/// A watermark in the future (clock moved backwards) yields zero.
pub fn creditable_days(purchase: &Purchase, now: Timestamp, ms_per_day: i64) -> u32 {
    let elapsed_ms = now.saturating_sub(purchase.last_collection_timestamp);
    if elapsed_ms <= 0 || ms_per_day <= 0 {
        return 0;
    }

    let elapsed_days = u32::try_from(elapsed_ms / ms_per_day).unwrap_or(u32::MAX);
    elapsed_days.min(purchase.days_remaining)
}

/// Run one accrual pass over `ledger`
///
/// For every active purchase: credit `daily_income × days`, move the
/// watermark forward by `days` whole days, decrement the days remaining and
/// expire the purchase when they reach zero. Each credited purchase gets its
/// own approved `profit` record; the balance receives one credit for the
/// total. Purchases whose product is not in the catalog are skipped.
///
/// # Errors
///
/// Returns `ArithmeticOverflow` if an amount or timestamp is not
/// representable. The ledger may then be partially updated, which is why
/// engines run this on a working copy.
pub fn accrue(
    ledger: &mut UserLedger,
    catalog: &Catalog,
    now: Timestamp,
    ms_per_day: i64,
    ids: &IdAllocator,
) -> Result<AccrualSummary, YieldError> {
    let user = ledger.user_id();
    let mut summary = AccrualSummary::new(user);
    let (account, purchases, transactions) = ledger.parts_mut();

    for purchase in purchases.active_mut() {
        if purchase.days_remaining == 0 {
            purchase.status = PurchaseStatus::Expired;
            summary.expired.push(purchase.id);
            continue;
        }

        let Some(product) = catalog.get(purchase.product_id) else {
            warn!(
                user,
                purchase = purchase.id,
                product = purchase.product_id,
                "skipping purchase of unknown product"
            );
            continue;
        };

        if now < purchase.last_collection_timestamp {
            debug!(
                user,
                purchase = purchase.id,
                watermark = purchase.last_collection_timestamp,
                now,
                "watermark ahead of clock, nothing to credit"
            );
            continue;
        }

        let days = creditable_days(purchase, now, ms_per_day);
        if days == 0 {
            continue;
        }

        let earnings = product
            .daily_income
            .checked_mul(Decimal::from(days))
            .ok_or_else(|| YieldError::arithmetic_overflow("accrual", user))?;
        let watermark = i64::from(days)
            .checked_mul(ms_per_day)
            .and_then(|advance| purchase.last_collection_timestamp.checked_add(advance))
            .ok_or_else(|| YieldError::arithmetic_overflow("accrual", user))?;

        purchase.last_collection_timestamp = watermark;
        purchase.days_remaining -= days;
        let expired = purchase.days_remaining == 0;
        if expired {
            purchase.status = PurchaseStatus::Expired;
            summary.expired.push(purchase.id);
        }

        summary.total_earnings = summary
            .total_earnings
            .checked_add(earnings)
            .ok_or_else(|| YieldError::arithmetic_overflow("accrual", user))?;

        if earnings > Decimal::ZERO {
            let transaction_id = ids.next_transaction();
            transactions.append(TransactionRecord {
                id: transaction_id,
                user_id: user,
                tx_type: TransactionType::Profit,
                amount: earnings,
                status: TransactionStatus::Approved,
                timestamp: now,
                utr: None,
                details: Some(format!("daily income from {}", product.name)),
            });

            summary.credits.push(PurchaseCredit {
                purchase_id: purchase.id,
                product_id: product.id,
                days,
                earnings,
                transaction_id,
                expired,
            });
        }
    }

    if summary.total_earnings > Decimal::ZERO {
        account.credit_balance(summary.total_earnings, "accrual")?;
    }

    Ok(summary)
}
