//! Periodic accrual across all users
//!
//! This module provides the `AccrualScheduler`, which runs an accrual pass
//! over every registered user on a fixed interval.
//!
//! # Design
//!
//! A pass fans out over users with at most `max_concurrent_users` accruals in
//! flight. Users are independent, so the pass order is irrelevant; the
//! engine's per-user lock keeps each user's own operations ordered.
//!
//! An in-flight set makes overlapping requests for the same user coalesce:
//! while one accrual for a user is running, another request for that user
//! returns [`AccrualOutcome::Coalesced`] immediately instead of queueing
//! behind it. The running pass credits every whole day up to its own
//! instant.
//!
//! # Architecture
//!
//! ```text
//! AccrualScheduler
//!     ├── AsyncYieldEngine               (shared engine handle)
//!     └── Arc<DashMap<UserId, ()>>       (users with an accrual in flight)
//! ```

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use rust_decimal::Decimal;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::AsyncYieldEngine;
use crate::core::accrual::AccrualSummary;
use crate::types::{UserId, YieldError};

/// Result of one accrual request
#[derive(Debug, Clone, PartialEq)]
pub enum AccrualOutcome {
    /// The accrual ran and committed
    Credited(AccrualSummary),

    /// Another accrual for the same user was already running
    Coalesced,
}

/// Totals of one pass over all users
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassReport {
    /// Users visited
    pub users: usize,
    /// Users that earned income or had a purchase expire
    pub credited: usize,
    /// Users skipped because an accrual was already running
    pub coalesced: usize,
    /// Users whose accrual failed
    pub failed: usize,
    /// Sum of income credited in this pass
    pub total_earnings: Decimal,
}

/// Removes a user from the in-flight set when the accrual ends
struct InFlight<'a> {
    users: &'a DashMap<UserId, ()>,
    user: UserId,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.users.remove(&self.user);
    }
}

/// Fixed-interval accrual runner
///
/// Cloneable; all clones share the in-flight set.
#[derive(Clone)]
pub struct AccrualScheduler {
    engine: AsyncYieldEngine,
    in_flight: Arc<DashMap<UserId, ()>>,
}

impl AccrualScheduler {
    pub fn new(engine: AsyncYieldEngine) -> Self {
        Self {
            engine,
            in_flight: Arc::new(DashMap::new()),
        }
    }

    pub fn engine(&self) -> &AsyncYieldEngine {
        &self.engine
    }

    /// Accrue one user unless an accrual for them is already running
    pub async fn accrue_user(&self, user: UserId) -> Result<AccrualOutcome, YieldError> {
        if self.in_flight.insert(user, ()).is_some() {
            debug!(user, "accrual already in flight, coalescing");
            return Ok(AccrualOutcome::Coalesced);
        }
        let _in_flight = InFlight {
            users: &self.in_flight,
            user,
        };

        let summary = self.engine.accrue(user).await?;
        Ok(AccrualOutcome::Credited(summary))
    }

    /// Accrue every registered user once
    ///
    /// Failures are logged and counted; they never abort the pass.
    pub async fn run_pass(&self) -> PassReport {
        let users = self.engine.user_ids();
        let limit = self.engine.config().max_concurrent_users;

        let results: Vec<(UserId, Result<AccrualOutcome, YieldError>)> = stream::iter(users)
            .map(move |user| async move { (user, self.accrue_user(user).await) })
            .buffer_unordered(limit)
            .collect()
            .await;

        let mut report = PassReport {
            users: results.len(),
            ..PassReport::default()
        };
        for (user, result) in results {
            match result {
                Ok(AccrualOutcome::Credited(summary)) => {
                    if !summary.is_empty() {
                        report.credited += 1;
                        report.total_earnings += summary.total_earnings;
                    }
                }
                Ok(AccrualOutcome::Coalesced) => report.coalesced += 1,
                Err(e) => {
                    warn!(user, error = %e, "accrual failed");
                    report.failed += 1;
                }
            }
        }

        report
    }

    /// Run passes on `accrual_interval` until `shutdown` completes
    ///
    /// A pass that outlasts the interval delays the next tick rather than
    /// stacking a second pass on top of it.
    pub async fn run(&self, shutdown: impl Future<Output = ()>) {
        let period = self.engine.config().accrual_interval;
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        info!(interval_ms = period.as_millis() as u64, "accrual scheduler started");

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("accrual scheduler stopping");
                    break;
                }
                _ = ticker.tick() => {
                    let report = self.run_pass().await;
                    if report.credited > 0 || report.failed > 0 {
                        info!(
                            users = report.users,
                            credited = report.credited,
                            failed = report.failed,
                            earnings = %report.total_earnings,
                            "accrual pass finished"
                        );
                    } else {
                        debug!(users = report.users, "accrual pass finished, nothing owed");
                    }
                }
            }
        }
    }
}
