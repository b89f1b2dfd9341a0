//! Catalog plan types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Product identifier
pub type ProductId = u32;

/// A purchasable yield-bearing plan
///
/// Products are immutable once the catalog is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,

    pub name: String,

    /// Purchase price debited from the balance
    pub price: Decimal,

    /// Income credited for each whole elapsed day
    pub daily_income: Decimal,

    /// Term of the plan in days
    pub duration_days: u32,

    /// How many times one user may buy this plan
    pub purchase_limit: u32,
}

impl Product {
    /// Advertised total return over the full term
    pub fn total_return(&self) -> Decimal {
        self.daily_income
            .saturating_mul(Decimal::from(self.duration_days))
    }
}
