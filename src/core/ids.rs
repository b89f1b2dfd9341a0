//! Identifier allocation for purchases and transactions

use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::{PurchaseId, Snapshot, TransactionId};

/// Hands out unique purchase and transaction ids
///
/// Ids are never reused. An operation that was rolled back leaves a gap.
#[derive(Debug)]
pub struct IdAllocator {
    next_purchase: AtomicU64,
    next_transaction: AtomicU64,
}

impl IdAllocator {
    pub fn new() -> Self {
        IdAllocator {
            next_purchase: AtomicU64::new(1),
            next_transaction: AtomicU64::new(1),
        }
    }

    /// Continue numbering after the highest ids found in `snapshot`
    pub fn seeded_from(snapshot: &Snapshot) -> Self {
        let max_purchase = snapshot.purchases.iter().map(|p| p.id).max().unwrap_or(0);
        let max_transaction = snapshot
            .transactions
            .iter()
            .map(|t| t.id)
            .max()
            .unwrap_or(0);

        IdAllocator {
            next_purchase: AtomicU64::new(max_purchase + 1),
            next_transaction: AtomicU64::new(max_transaction + 1),
        }
    }

    pub fn next_purchase(&self) -> PurchaseId {
        self.next_purchase.fetch_add(1, Ordering::Relaxed)
    }

    pub fn next_transaction(&self) -> TransactionId {
        self.next_transaction.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Purchase, PurchaseStatus};

    #[test]
    fn test_fresh_allocator_starts_at_one() {
        let ids = IdAllocator::new();
        assert_eq!(ids.next_purchase(), 1);
        assert_eq!(ids.next_purchase(), 2);
        assert_eq!(ids.next_transaction(), 1);
    }

    #[test]
    fn test_seeded_allocator_skips_existing_ids() {
        let snapshot = Snapshot {
            purchases: vec![Purchase {
                id: 41,
                user_id: 1,
                product_id: 1,
                purchase_timestamp: 0,
                last_collection_timestamp: 0,
                days_remaining: 1,
                status: PurchaseStatus::Active,
            }],
            ..Snapshot::default()
        };

        let ids = IdAllocator::seeded_from(&snapshot);
        assert_eq!(ids.next_purchase(), 42);
        assert_eq!(ids.next_transaction(), 1);
    }
}
