//! Account-related types for the Daily Yield Engine
//!
//! This module defines the per-user account projection and the user record
//! that owns it.

use super::transaction::UserId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// User account balances
///
/// The account is a projection maintained by direct mutation at each
/// balance-affecting event. Its `balance` must always equal the signed sum
/// of the user's approved transactions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Spendable plus earned funds
    ///
    /// Debited by purchases and approved withdrawals, credited by approved
    /// recharges, accrued profit and commissions.
    pub balance: Decimal,

    /// Portion of funds eligible for payout
    ///
    /// Reserved when a withdrawal is requested and refunded when that
    /// withdrawal is rejected. Accrual never touches it.
    pub withdrawable_balance: Decimal,

    /// Sum of prices of every plan bought
    pub total_invested: Decimal,

    /// Sum of every approved withdrawal
    pub total_withdrawn: Decimal,
}

impl Account {
    /// Create a new account with all balances at zero
    pub fn new() -> Self {
        Account {
            balance: Decimal::ZERO,
            withdrawable_balance: Decimal::ZERO,
            total_invested: Decimal::ZERO,
            total_withdrawn: Decimal::ZERO,
        }
    }
}

impl Default for Account {
    fn default() -> Self {
        Self::new()
    }
}

/// A registered user and their account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,

    /// The user who referred this one, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referrer: Option<UserId>,

    pub account: Account,
}

impl User {
    pub fn new(id: UserId, referrer: Option<UserId>) -> Self {
        User {
            id,
            referrer,
            account: Account::new(),
        }
    }
}
