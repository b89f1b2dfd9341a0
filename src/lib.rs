//! Daily Yield Engine Library
//! # Overview
//!
//! This library keeps the ledger of a fixed-term investment plan product:
//! users buy plans from a catalog with their balance, and every plan credits
//! a fixed daily income for a fixed number of days. Income is accrued
//! lazily in whole days, so accrual can run at any frequency and still pay
//! each day exactly once.
//!
//! # Architecture
//!
//! The system is organized into several key components:
//!
//! - [`types`] - Core data types (Account, Product, Purchase, TransactionRecord, errors)
//! - [`config`] - Engine tunables
//! - [`cli`] - CLI arguments parsing and command execution
//! - [`core`] - Business logic components:
//!   - [`core::accrual`] - Whole-day income crediting with watermarks
//!   - [`core::ledger`] - Per-user aggregate: purchase, review, requests
//!   - [`core::engine`] - Synchronous orchestration with commit/rollback
//!   - [`core::r#async`] - Concurrent engine and periodic scheduler
//! - [`io`] - JSON state stores and CSV export
//!
//! # Transaction Types
//!
//! - **Recharge**: deposit, pending until approved; approval credits the balance
//! - **Withdraw**: payout, reserved from the withdrawable balance at request time
//! - **Profit**: daily income written by accrual, approved on creation
//! - **Purchase**: plan bought with the balance, approved on creation
//! - **Commission**: referral commission, credited to both balances
//!
//! # Account State
//!
//! Each account maintains:
//! - `balance`: funds for buying plans; equals the signed sum of approved transactions
//! - `withdrawable_balance`: funds eligible for payout
//! - `total_invested`: sum of plan prices paid
//! - `total_withdrawn`: sum of approved withdrawals

// Module declarations
pub mod cli;
pub mod config;
pub mod core;
pub mod io;
pub mod types;

pub use config::EngineConfig;
pub use core::{
    AccrualScheduler, AccrualSummary, AsyncYieldEngine, Catalog, UserLedger, YieldEngine,
};
pub use io::{write_accounts_csv, JsonFileStore, MemoryStore};
pub use types::{
    Account, ErrorKind, Product, ProductId, Purchase, PurchaseId, PurchaseStatus, Snapshot,
    TransactionId, TransactionRecord, TransactionStatus, TransactionType, User, UserId,
    YieldError,
};
