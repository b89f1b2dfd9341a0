//! Error types for the Daily Yield Engine
//!
//! This module defines all error types that can occur while buying plans,
//! accruing income, reviewing transactions and persisting state.
//!
//! # Error Categories
//!
//! Every variant belongs to one [`ErrorKind`]:
//!
//! - **Validation**: malformed or unknown input, rejected before any mutation
//! - **Precondition**: the aggregate is not in a state that allows the operation
//! - **Persistence**: the store failed or timed out; the operation was rolled back
//! - **Arithmetic**: a balance computation would overflow
//!
//! None of these leave a user's aggregate partially mutated. A caller that
//! receives a persistence error may retry the operation safely.

use crate::types::{ProductId, TransactionId, TransactionStatus, TransactionType, UserId};
use rust_decimal::Decimal;
use thiserror::Error;

/// Taxonomy bucket of a [`YieldError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Precondition,
    Persistence,
    Arithmetic,
}

/// Main error type for the yield engine
///
/// Each variant includes the context needed to explain the failure to an
/// operator or to map it onto a user-facing message.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum YieldError {
    /// Product id is not in the catalog
    #[error("Unknown product {product}")]
    UnknownProduct {
        /// The product id that was requested
        product: ProductId,
    },

    /// User id has no registered account
    #[error("Unknown user {user}")]
    UnknownUser {
        /// The user id that was requested
        user: UserId,
    },

    /// Registration for an id that already has an account
    #[error("User {user} is already registered")]
    UserAlreadyExists {
        /// The duplicate user id
        user: UserId,
    },

    /// Registration names a referrer that does not exist
    #[error("Referrer {referrer} of user {user} is not registered")]
    UnknownReferrer {
        /// The user being registered
        user: UserId,
        /// The missing referrer
        referrer: UserId,
    },

    /// Amount is zero, negative or otherwise unusable
    #[error("Invalid amount {amount} for {operation}")]
    InvalidAmount {
        /// The rejected amount
        amount: Decimal,
        /// Operation that received it
        operation: String,
    },

    /// Catalog entry fails validation
    #[error("Invalid product {product}: {reason}")]
    InvalidProduct {
        /// Product id of the offending entry
        product: ProductId,
        /// What is wrong with it
        reason: String,
    },

    /// Transaction id is not in the user's log
    #[error("Transaction {tx} not found for user {user}")]
    TransactionNotFound {
        /// Transaction id that was not found
        tx: TransactionId,
        /// User whose log was searched
        user: UserId,
    },

    /// Balance too low for a purchase or a withdrawal payout
    #[error("Insufficient balance for user {user}: available {available}, requested {requested}")]
    InsufficientBalance {
        /// User id
        user: UserId,
        /// Current balance
        available: Decimal,
        /// Amount the operation needs
        requested: Decimal,
    },

    /// Withdrawable balance too low for a withdrawal request
    #[error(
        "Insufficient withdrawable balance for user {user}: available {available}, requested {requested}"
    )]
    InsufficientWithdrawable {
        /// User id
        user: UserId,
        /// Current withdrawable balance
        available: Decimal,
        /// Requested withdrawal amount
        requested: Decimal,
    },

    /// User already owns the maximum number of this product
    #[error("User {user} reached the purchase limit of {limit} for product {product}")]
    PurchaseLimitReached {
        /// User id
        user: UserId,
        /// Product id
        product: ProductId,
        /// Per-user limit of the product
        limit: u32,
    },

    /// Review attempted on a transaction that already left `pending`
    #[error("Transaction {tx} is already {}", status.as_str())]
    TransactionNotPending {
        /// Transaction id
        tx: TransactionId,
        /// Its terminal status
        status: TransactionStatus,
    },

    /// Review attempted on a transaction type that is never reviewed
    #[error("Transaction {tx} of type {} cannot be reviewed", tx_type.as_str())]
    NotReviewable {
        /// Transaction id
        tx: TransactionId,
        /// Its type
        tx_type: TransactionType,
    },

    /// Arithmetic overflow would occur
    #[error("Arithmetic overflow in {operation} for user {user}")]
    ArithmeticOverflow {
        /// Operation that would overflow
        operation: String,
        /// User id
        user: UserId,
    },

    /// The store rejected a load or save
    #[error("Persistence failed: {message}")]
    Persistence {
        /// Description of the store failure
        message: String,
    },

    /// The store did not answer within the configured timeout
    #[error("Persistence timed out after {timeout_ms}ms for user {user}")]
    PersistenceTimeout {
        /// User whose save timed out
        user: UserId,
        /// Configured timeout
        timeout_ms: u128,
    },

    /// I/O error while reading or writing state files
    #[error("I/O error: {message}")]
    IoError {
        /// Description of the I/O error
        message: String,
    },

    /// State or catalog file could not be encoded or decoded
    #[error("Serialization error: {message}")]
    Serialization {
        /// Description of the serde failure
        message: String,
    },
}

// Conversion from io::Error to YieldError
impl From<std::io::Error> for YieldError {
    fn from(error: std::io::Error) -> Self {
        YieldError::IoError {
            message: error.to_string(),
        }
    }
}

impl From<serde_json::Error> for YieldError {
    fn from(error: serde_json::Error) -> Self {
        YieldError::Serialization {
            message: error.to_string(),
        }
    }
}

// Helper functions for creating common errors

impl YieldError {
    /// Taxonomy bucket of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            YieldError::UnknownProduct { .. }
            | YieldError::UnknownUser { .. }
            | YieldError::UserAlreadyExists { .. }
            | YieldError::UnknownReferrer { .. }
            | YieldError::InvalidAmount { .. }
            | YieldError::InvalidProduct { .. }
            | YieldError::TransactionNotFound { .. } => ErrorKind::Validation,
            YieldError::InsufficientBalance { .. }
            | YieldError::InsufficientWithdrawable { .. }
            | YieldError::PurchaseLimitReached { .. }
            | YieldError::TransactionNotPending { .. }
            | YieldError::NotReviewable { .. } => ErrorKind::Precondition,
            YieldError::Persistence { .. }
            | YieldError::PersistenceTimeout { .. }
            | YieldError::IoError { .. }
            | YieldError::Serialization { .. } => ErrorKind::Persistence,
            YieldError::ArithmeticOverflow { .. } => ErrorKind::Arithmetic,
        }
    }

    /// Create an InsufficientBalance error
    pub fn insufficient_balance(user: UserId, available: Decimal, requested: Decimal) -> Self {
        YieldError::InsufficientBalance {
            user,
            available,
            requested,
        }
    }

    /// Create an InsufficientWithdrawable error
    pub fn insufficient_withdrawable(user: UserId, available: Decimal, requested: Decimal) -> Self {
        YieldError::InsufficientWithdrawable {
            user,
            available,
            requested,
        }
    }

    /// Create an InvalidAmount error
    pub fn invalid_amount(amount: Decimal, operation: &str) -> Self {
        YieldError::InvalidAmount {
            amount,
            operation: operation.to_string(),
        }
    }

    /// Create an InvalidProduct error
    pub fn invalid_product(product: ProductId, reason: &str) -> Self {
        YieldError::InvalidProduct {
            product,
            reason: reason.to_string(),
        }
    }

    /// Create a TransactionNotFound error
    pub fn transaction_not_found(tx: TransactionId, user: UserId) -> Self {
        YieldError::TransactionNotFound { tx, user }
    }

    /// Create an ArithmeticOverflow error
    pub fn arithmetic_overflow(operation: &str, user: UserId) -> Self {
        YieldError::ArithmeticOverflow {
            operation: operation.to_string(),
            user,
        }
    }

    /// Create a Persistence error
    pub fn persistence(message: impl Into<String>) -> Self {
        YieldError::Persistence {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal::dec;

    #[rstest]
    #[case::unknown_product(
        YieldError::UnknownProduct { product: 9 },
        "Unknown product 9"
    )]
    #[case::insufficient_balance(
        YieldError::insufficient_balance(1, dec!(500), dec!(600)),
        "Insufficient balance for user 1: available 500, requested 600"
    )]
    #[case::purchase_limit(
        YieldError::PurchaseLimitReached { user: 1, product: 1, limit: 1 },
        "User 1 reached the purchase limit of 1 for product 1"
    )]
    #[case::not_pending(
        YieldError::TransactionNotPending { tx: 7, status: TransactionStatus::Approved },
        "Transaction 7 is already approved"
    )]
    #[case::not_reviewable(
        YieldError::NotReviewable { tx: 7, tx_type: TransactionType::Profit },
        "Transaction 7 of type profit cannot be reviewed"
    )]
    #[case::timeout(
        YieldError::PersistenceTimeout { user: 3, timeout_ms: 5000 },
        "Persistence timed out after 5000ms for user 3"
    )]
    fn test_error_display(#[case] error: YieldError, #[case] expected: &str) {
        assert_eq!(error.to_string(), expected);
    }

    #[rstest]
    #[case::validation(YieldError::UnknownUser { user: 1 }, ErrorKind::Validation)]
    #[case::validation_amount(YieldError::invalid_amount(dec!(-1), "recharge"), ErrorKind::Validation)]
    #[case::precondition(YieldError::insufficient_balance(1, dec!(0), dec!(1)), ErrorKind::Precondition)]
    #[case::precondition_review(
        YieldError::TransactionNotPending { tx: 1, status: TransactionStatus::Rejected },
        ErrorKind::Precondition
    )]
    #[case::persistence(YieldError::persistence("disk full"), ErrorKind::Persistence)]
    #[case::arithmetic(YieldError::arithmetic_overflow("accrual", 1), ErrorKind::Arithmetic)]
    fn test_error_kind(#[case] error: YieldError, #[case] expected: ErrorKind) {
        assert_eq!(error.kind(), expected);
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "Permission denied");
        let error: YieldError = io_error.into();
        assert!(matches!(error, YieldError::IoError { .. }));
        assert_eq!(error.kind(), ErrorKind::Persistence);
        assert_eq!(error.to_string(), "I/O error: Permission denied");
    }
}
