//! Append-only transaction log
//!
//! This module provides the TransactionLog component that records every
//! balance-affecting event of one user. The log is both the history shown to
//! the user and the audit trail the balance is reconciled against.
//!
//! # Immutability
//!
//! Records are never removed or rewritten. The only permitted change is the
//! single transition of a `pending` record to `approved` or `rejected`.

use crate::types::{TransactionId, TransactionRecord, TransactionStatus, UserId, YieldError};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// One user's transaction history
///
/// Keeps insertion order for display and a map from transaction id to
/// position for review lookups.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionLog {
    /// Records in append order
    records: Vec<TransactionRecord>,

    /// Map of transaction ID to position in `records`
    index: HashMap<TransactionId, usize>,
}

impl TransactionLog {
    /// Create a new empty transaction log
    pub fn new() -> Self {
        TransactionLog {
            records: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Rebuild a log from persisted records
    ///
    /// If a transaction id appears twice, only the first occurrence is kept.
    pub fn from_records(records: Vec<TransactionRecord>) -> Self {
        let mut log = TransactionLog::new();
        for record in records {
            log.append(record);
        }
        log
    }

    /// Append a record
    ///
    /// Returns `false` and ignores the record if its id is already present.
    pub fn append(&mut self, record: TransactionRecord) -> bool {
        if self.index.contains_key(&record.id) {
            return false;
        }
        self.index.insert(record.id, self.records.len());
        self.records.push(record);
        true
    }

    /// Get a record by id
    pub fn get(&self, tx_id: TransactionId) -> Option<&TransactionRecord> {
        self.index.get(&tx_id).map(|&pos| &self.records[pos])
    }

    /// Move a pending record to a terminal status
    ///
    /// # Errors
    ///
    /// - `TransactionNotFound` if the id is not in this log
    /// - `TransactionNotPending` if the record already left `pending`
    pub fn transition(
        &mut self,
        user: UserId,
        tx_id: TransactionId,
        status: TransactionStatus,
    ) -> Result<&TransactionRecord, YieldError> {
        let pos = *self
            .index
            .get(&tx_id)
            .ok_or_else(|| YieldError::transaction_not_found(tx_id, user))?;
        let record = &mut self.records[pos];

        if record.status.is_terminal() {
            return Err(YieldError::TransactionNotPending {
                tx: tx_id,
                status: record.status,
            });
        }

        record.status = status;
        Ok(record)
    }

    /// Sum of signed amounts of all approved records
    ///
    /// This is the balance the account projection must agree with.
    pub fn reconciled_balance(&self) -> Decimal {
        self.records.iter().map(TransactionRecord::signed_amount).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TransactionRecord> {
        self.records.iter()
    }

    pub fn records(&self) -> &[TransactionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
