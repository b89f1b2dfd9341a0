//! Benchmark suite for the accrual pass
//!
//! Measures a single user's accrual over a growing number of active
//! purchases, and a scheduler pass over many users on the async engine.
//!
//! # Running Benchmarks
//!
//! ```bash
//! # Run all benchmarks
//! cargo bench
//! ```

use std::sync::Arc;

use daily_yield_engine::core::{IdAllocator, ManualClock, MS_PER_DAY};
use daily_yield_engine::{
    AccrualScheduler, AsyncYieldEngine, Catalog, EngineConfig, MemoryStore, User, UserLedger,
};
use rust_decimal::Decimal;

const T0: i64 = 1_700_000_000_000;

fn main() {
    divan::main();
}

/// User owning `copies` purchases of every tier that allows that many
fn ledger_with_purchases(copies: usize, ids: &IdAllocator) -> UserLedger {
    let catalog = Catalog::default();
    let mut ledger = UserLedger::new(User::new(1, None));
    let tx = ledger
        .request_recharge(Decimal::from(1_000_000), None, T0, ids)
        .expect("recharge");
    ledger.approve(tx).expect("approve");

    for product in catalog.products() {
        for _ in 0..copies.min(product.purchase_limit as usize) {
            ledger.buy(product, T0, ids).expect("buy");
        }
    }
    ledger
}

/// Accrue 30 days for one user holding `copies` of each plan
#[divan::bench(args = [1, 2, 5])]
fn accrue_single_user(bencher: divan::Bencher, copies: usize) {
    let catalog = Catalog::default();
    let ids = IdAllocator::new();
    let ledger = ledger_with_purchases(copies, &ids);

    bencher
        .with_inputs(|| ledger.clone())
        .bench_local_values(|mut ledger| {
            ledger
                .accrue(&catalog, T0 + 30 * MS_PER_DAY, MS_PER_DAY, &ids)
                .expect("accrue")
        });
}

/// Scheduler pass over `users` users on an in-memory store
#[divan::bench(args = [10, 100, 1000], sample_count = 10)]
fn scheduler_pass(bencher: divan::Bencher, users: u32) {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("runtime");

    bencher
        .with_inputs(|| {
            runtime.block_on(async {
                let store = Arc::new(MemoryStore::new());
                let clock = Arc::new(ManualClock::new(T0));
                let engine = AsyncYieldEngine::open(
                    Catalog::default(),
                    EngineConfig::default(),
                    store,
                    clock.clone(),
                )
                .await
                .expect("open");

                for user in 1..=users {
                    engine.register_user(user, None).await.expect("register");
                    let tx = engine
                        .request_recharge(user, Decimal::from(1_000), None)
                        .await
                        .expect("recharge");
                    engine.approve(user, tx).await.expect("approve");
                    engine.buy(user, 1).await.expect("buy");
                }
                clock.advance_days(1, MS_PER_DAY);
                AccrualScheduler::new(engine)
            })
        })
        .bench_local_values(|scheduler| runtime.block_on(scheduler.run_pass()));
}
