//! Asynchronous implementations of core components
//!
//! This module provides the concurrent engine and the periodic accrual
//! runner built on tokio.
//!
//! # Architecture
//!
//! - **AsyncYieldEngine**: the same operations as the synchronous engine,
//!   with one lock per user instead of one `&mut` for everything
//! - **AccrualScheduler**: fixed-interval accrual over all users with
//!   bounded concurrency and per-user coalescing
//!
//! # Thread Safety
//!
//! - Operations on different users proceed in parallel
//! - Operations on the same user are serialized, persistence included
//! - No global lock on the hot path; registration alone takes a shared lock

pub mod engine;
pub mod scheduler;

pub use engine::AsyncYieldEngine;
pub use scheduler::{AccrualOutcome, AccrualScheduler, PassReport};
