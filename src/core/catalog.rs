//! Product catalog
//!
//! The catalog is the static list of purchasable plans. It is built once,
//! validated, and never mutated afterwards. Purchases refer to products by
//! id; the accrual engine looks up the daily income here on every pass.

use std::collections::BTreeMap;
use std::path::Path;

use rust_decimal::Decimal;

use crate::types::{Product, ProductId, YieldError};

/// Immutable, validated set of plans keyed by product id
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    products: BTreeMap<ProductId, Product>,
}

impl Catalog {
    /// Build a catalog from a list of products
    ///
    /// # Errors
    ///
    /// Returns `InvalidProduct` if any product has a non-positive price,
    /// daily income, duration or purchase limit, or if two products share
    /// an id.
    pub fn new(products: Vec<Product>) -> Result<Self, YieldError> {
        let mut by_id = BTreeMap::new();

        for product in products {
            if product.price <= Decimal::ZERO {
                return Err(YieldError::invalid_product(product.id, "price must be positive"));
            }
            if product.daily_income <= Decimal::ZERO {
                return Err(YieldError::invalid_product(
                    product.id,
                    "daily income must be positive",
                ));
            }
            if product.duration_days == 0 {
                return Err(YieldError::invalid_product(
                    product.id,
                    "duration must be at least one day",
                ));
            }
            if product.purchase_limit == 0 {
                return Err(YieldError::invalid_product(
                    product.id,
                    "purchase limit must be at least one",
                ));
            }
            if by_id.contains_key(&product.id) {
                return Err(YieldError::invalid_product(product.id, "duplicate product id"));
            }
            by_id.insert(product.id, product);
        }

        Ok(Catalog { products: by_id })
    }

    /// Load a catalog from a JSON array of products
    pub fn from_json_file(path: &Path) -> Result<Self, YieldError> {
        let content = std::fs::read_to_string(path)?;
        let products: Vec<Product> = serde_json::from_str(&content)?;
        Self::new(products)
    }

    pub fn get(&self, id: ProductId) -> Option<&Product> {
        self.products.get(&id)
    }

    /// All products ordered by id
    pub fn products(&self) -> impl Iterator<Item = &Product> {
        self.products.values()
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

impl Default for Catalog {
    /// The built-in plan list
    ///
    /// The starter plan may be bought once per user; the other tiers allow
    /// several concurrent copies.
    fn default() -> Self {
        let plan = |id, name: &str, price: i64, daily_income: i64, purchase_limit| Product {
            id,
            name: name.to_string(),
            price: Decimal::from(price),
            daily_income: Decimal::from(daily_income),
            duration_days: 100,
            purchase_limit,
        };

        let mut products = BTreeMap::new();
        for product in [
            plan(1, "Starter", 600, 90, 1),
            plan(2, "Silver", 2_000, 320, 5),
            plan(3, "Gold", 5_000, 850, 5),
            plan(4, "Platinum", 10_000, 1_800, 3),
            plan(5, "Diamond", 25_000, 4_800, 2),
        ] {
            products.insert(product.id, product);
        }

        Catalog { products }
    }
}
