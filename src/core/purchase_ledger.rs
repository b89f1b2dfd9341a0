//! Purchase ledger
//!
//! Holds the plan instances one user owns, active and expired. Expired
//! purchases are never removed; they stay for history and still count
//! towards the per-product purchase limit.

use crate::types::{ProductId, Purchase, PurchaseId};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PurchaseLedger {
    purchases: Vec<Purchase>,
}

impl PurchaseLedger {
    pub fn new() -> Self {
        PurchaseLedger {
            purchases: Vec::new(),
        }
    }

    pub fn from_purchases(purchases: Vec<Purchase>) -> Self {
        PurchaseLedger { purchases }
    }

    pub fn push(&mut self, purchase: Purchase) {
        self.purchases.push(purchase);
    }

    pub fn get(&self, id: PurchaseId) -> Option<&Purchase> {
        self.purchases.iter().find(|p| p.id == id)
    }

    /// Number of times the user bought `product`, expired copies included
    pub fn owned_count(&self, product: ProductId) -> usize {
        self.purchases
            .iter()
            .filter(|p| p.product_id == product)
            .count()
    }

    pub fn active(&self) -> impl Iterator<Item = &Purchase> {
        self.purchases.iter().filter(|p| p.is_active())
    }

    pub fn active_mut(&mut self) -> impl Iterator<Item = &mut Purchase> {
        self.purchases.iter_mut().filter(|p| p.is_active())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Purchase> {
        self.purchases.iter()
    }

    pub fn len(&self) -> usize {
        self.purchases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.purchases.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PurchaseStatus;

    fn purchase(id: PurchaseId, product_id: ProductId, status: PurchaseStatus) -> Purchase {
        Purchase {
            id,
            user_id: 1,
            product_id,
            purchase_timestamp: 0,
            last_collection_timestamp: 0,
            days_remaining: if status == PurchaseStatus::Active { 10 } else { 0 },
            status,
        }
    }

    #[test]
    fn test_owned_count_includes_expired() {
        let ledger = PurchaseLedger::from_purchases(vec![
            purchase(1, 2, PurchaseStatus::Expired),
            purchase(2, 2, PurchaseStatus::Active),
            purchase(3, 3, PurchaseStatus::Active),
        ]);

        assert_eq!(ledger.owned_count(2), 2);
        assert_eq!(ledger.owned_count(3), 1);
        assert_eq!(ledger.owned_count(4), 0);
    }

    #[test]
    fn test_active_skips_expired() {
        let mut ledger = PurchaseLedger::new();
        ledger.push(purchase(1, 1, PurchaseStatus::Expired));
        ledger.push(purchase(2, 1, PurchaseStatus::Active));

        let active: Vec<PurchaseId> = ledger.active().map(|p| p.id).collect();
        assert_eq!(active, vec![2]);
        assert_eq!(ledger.active_mut().count(), 1);
        assert_eq!(ledger.len(), 2);
        assert!(ledger.get(1).is_some());
        assert!(ledger.get(9).is_none());
    }
}
