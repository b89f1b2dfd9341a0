//! Transaction-related types for the Daily Yield Engine
//!
//! This module defines identifiers, transaction types and the append-only
//! transaction record used as the audit trail of every balance change.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// User identifier
pub type UserId = u32;

/// Transaction identifier
///
/// Unique across all users.
pub type TransactionId = u64;

/// Milliseconds since the Unix epoch
pub type Timestamp = i64;

/// Balance-affecting event kinds
///
/// Recharges, profits and commissions are credits; withdrawals and purchases
/// are debits. The amount of a record is always non-negative and its sign is
/// implied by the type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Manual deposit, pending until an administrator reviews it
    Recharge,

    /// Payout request, pending until an administrator reviews it
    Withdraw,

    /// Daily income credited by the accrual engine
    Profit,

    /// Plan bought with account balance
    Purchase,

    /// Referral commission
    Commission,
}

impl TransactionType {
    /// Whether this type increases the balance when approved
    pub fn is_credit(self) -> bool {
        matches!(
            self,
            TransactionType::Recharge | TransactionType::Profit | TransactionType::Commission
        )
    }

    /// Whether records of this type go through manual review
    pub fn is_reviewable(self) -> bool {
        matches!(self, TransactionType::Recharge | TransactionType::Withdraw)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TransactionType::Recharge => "recharge",
            TransactionType::Withdraw => "withdraw",
            TransactionType::Profit => "profit",
            TransactionType::Purchase => "purchase",
            TransactionType::Commission => "commission",
        }
    }
}

/// Review state of a transaction
///
/// `Approved` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Approved,
    Rejected,
}

impl TransactionStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Approved => "approved",
            TransactionStatus::Rejected => "rejected",
        }
    }
}

/// One entry of the append-only transaction log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub id: TransactionId,

    pub user_id: UserId,

    #[serde(rename = "type")]
    pub tx_type: TransactionType,

    /// Non-negative amount; sign implied by `tx_type`
    pub amount: Decimal,

    pub status: TransactionStatus,

    pub timestamp: Timestamp,

    /// User-supplied payment reference for recharge verification
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utr: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl TransactionRecord {
    /// Contribution of this record to the reconciled balance
    ///
    /// Only approved records count.
    pub fn signed_amount(&self) -> Decimal {
        match (self.status, self.tx_type.is_credit()) {
            (TransactionStatus::Approved, true) => self.amount,
            (TransactionStatus::Approved, false) => -self.amount,
            _ => Decimal::ZERO,
        }
    }
}
