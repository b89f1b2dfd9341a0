//! Account management module
//!
//! This module provides the `AccountManager` struct which owns one user's
//! record and performs every balance mutation on their account.
//!
//! The AccountManager is responsible for:
//! - Crediting and debiting the spendable balance
//! - Reserving, refunding and crediting the withdrawable balance
//! - Maintaining the invested and withdrawn totals
//!
//! Every operation uses checked arithmetic and only assigns once all new
//! values were computed, so a failed call leaves the account unchanged.

use crate::types::{Account, User, UserId, YieldError};
use rust_decimal::Decimal;

/// Manages one user's account balances
#[derive(Debug, Clone, PartialEq)]
pub struct AccountManager {
    user: User,
}

impl AccountManager {
    pub fn new(user: User) -> Self {
        AccountManager { user }
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn user_id(&self) -> UserId {
        self.user.id
    }

    pub fn account(&self) -> &Account {
        &self.user.account
    }

    /// Increase the spendable balance
    ///
    /// # Errors
    ///
    /// Returns `ArithmeticOverflow` if the new balance is not representable.
    pub fn credit_balance(&mut self, amount: Decimal, operation: &str) -> Result<(), YieldError> {
        let user = self.user.id;
        let account = &mut self.user.account;

        account.balance = account
            .balance
            .checked_add(amount)
            .ok_or_else(|| YieldError::arithmetic_overflow(operation, user))?;

        Ok(())
    }

    /// Debit the balance for a plan and add the price to the invested total
    pub fn record_investment(&mut self, price: Decimal) -> Result<(), YieldError> {
        let user = self.user.id;
        let account = &mut self.user.account;

        if account.balance < price {
            return Err(YieldError::insufficient_balance(user, account.balance, price));
        }

        let new_balance = account
            .balance
            .checked_sub(price)
            .ok_or_else(|| YieldError::arithmetic_overflow("purchase", user))?;
        let new_invested = account
            .total_invested
            .checked_add(price)
            .ok_or_else(|| YieldError::arithmetic_overflow("purchase", user))?;

        account.balance = new_balance;
        account.total_invested = new_invested;

        Ok(())
    }

    /// Set aside part of the withdrawable balance for a pending withdrawal
    pub fn reserve_withdrawable(&mut self, amount: Decimal) -> Result<(), YieldError> {
        let user = self.user.id;
        let account = &mut self.user.account;

        if account.withdrawable_balance < amount {
            return Err(YieldError::insufficient_withdrawable(
                user,
                account.withdrawable_balance,
                amount,
            ));
        }

        account.withdrawable_balance = account
            .withdrawable_balance
            .checked_sub(amount)
            .ok_or_else(|| YieldError::arithmetic_overflow("withdrawal request", user))?;

        Ok(())
    }

    /// Return a reservation to the withdrawable balance
    pub fn release_withdrawable(&mut self, amount: Decimal) -> Result<(), YieldError> {
        self.credit_withdrawable(amount, "withdrawal rejection")
    }

    /// Increase the withdrawable balance
    pub fn credit_withdrawable(
        &mut self,
        amount: Decimal,
        operation: &str,
    ) -> Result<(), YieldError> {
        let user = self.user.id;
        let account = &mut self.user.account;

        account.withdrawable_balance = account
            .withdrawable_balance
            .checked_add(amount)
            .ok_or_else(|| YieldError::arithmetic_overflow(operation, user))?;

        Ok(())
    }

    /// Pay out an approved withdrawal from the balance
    ///
    /// The withdrawable part was already reserved when the withdrawal was
    /// requested, so only the balance and the withdrawn total move here.
    pub fn record_withdrawal(&mut self, amount: Decimal) -> Result<(), YieldError> {
        let user = self.user.id;
        let account = &mut self.user.account;

        if account.balance < amount {
            return Err(YieldError::insufficient_balance(
                user,
                account.balance,
                amount,
            ));
        }

        let new_balance = account
            .balance
            .checked_sub(amount)
            .ok_or_else(|| YieldError::arithmetic_overflow("withdrawal", user))?;
        let new_withdrawn = account
            .total_withdrawn
            .checked_add(amount)
            .ok_or_else(|| YieldError::arithmetic_overflow("withdrawal", user))?;

        account.balance = new_balance;
        account.total_withdrawn = new_withdrawn;

        Ok(())
    }
}
