//! End-to-end integration tests
//!
//! These tests drive complete user journeys through an engine backed by a
//! real JSON state file and a manual clock. Each test:
//! 1. Opens an engine on a fresh state file in a temporary directory
//! 2. Registers and funds users through approved recharges
//! 3. Buys plans, moves the clock and accrues
//! 4. Checks balances, purchases, the transaction log and the file itself
//!
//! Each test is run twice: once on the synchronous engine and once on the
//! async engine.

#[cfg(test)]
mod tests {
    use daily_yield_engine::core::{
        AccrualScheduler, ManualClock, PurchaseReceipt, ReviewOutcome, MS_PER_DAY,
    };
    use daily_yield_engine::{
        AccrualSummary, AsyncYieldEngine, Catalog, EngineConfig, ErrorKind, JsonFileStore,
        PurchaseStatus, TransactionId, TransactionStatus, TransactionType, UserId, UserLedger,
        YieldEngine, YieldError,
    };
    use rstest::rstest;
    use rust_decimal::{dec, Decimal};
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::{tempdir, TempDir};

    const DAY: i64 = MS_PER_DAY;
    const HOUR: i64 = MS_PER_DAY / 24;
    const T0: i64 = 1_700_000_000_000;

    #[derive(Clone, Copy, Debug)]
    enum Kind {
        Sync,
        Async,
    }

    /// One engine of either kind behind a blocking interface
    enum Driver {
        Sync(YieldEngine<Arc<JsonFileStore>, Arc<ManualClock>>),
        Async(tokio::runtime::Runtime, AsyncYieldEngine),
    }

    impl Driver {
        fn open(kind: Kind, path: &Path, clock: Arc<ManualClock>) -> Driver {
            let store = Arc::new(JsonFileStore::new(path));
            match kind {
                Kind::Sync => Driver::Sync(
                    YieldEngine::open(Catalog::default(), EngineConfig::default(), store, clock)
                        .unwrap(),
                ),
                Kind::Async => {
                    let runtime = tokio::runtime::Builder::new_multi_thread()
                        .enable_all()
                        .build()
                        .unwrap();
                    let engine = runtime
                        .block_on(AsyncYieldEngine::open(
                            Catalog::default(),
                            EngineConfig::default(),
                            store,
                            clock,
                        ))
                        .unwrap();
                    Driver::Async(runtime, engine)
                }
            }
        }

        fn register(&mut self, user: UserId, referrer: Option<UserId>) -> Result<(), YieldError> {
            match self {
                Driver::Sync(e) => e.register_user(user, referrer).map(|_| ()),
                Driver::Async(rt, e) => rt.block_on(e.register_user(user, referrer)).map(|_| ()),
            }
        }

        fn recharge(&mut self, user: UserId, amount: Decimal) -> Result<TransactionId, YieldError> {
            match self {
                Driver::Sync(e) => e.request_recharge(user, amount, None),
                Driver::Async(rt, e) => rt.block_on(e.request_recharge(user, amount, None)),
            }
        }

        fn withdraw(&mut self, user: UserId, amount: Decimal) -> Result<TransactionId, YieldError> {
            match self {
                Driver::Sync(e) => e.request_withdrawal(user, amount, None),
                Driver::Async(rt, e) => rt.block_on(e.request_withdrawal(user, amount, None)),
            }
        }

        fn commission(&mut self, user: UserId, amount: Decimal) -> Result<TransactionId, YieldError> {
            match self {
                Driver::Sync(e) => e.grant_commission(user, amount, None),
                Driver::Async(rt, e) => rt.block_on(e.grant_commission(user, amount, None)),
            }
        }

        fn approve(&mut self, user: UserId, tx: TransactionId) -> Result<ReviewOutcome, YieldError> {
            match self {
                Driver::Sync(e) => e.approve(user, tx),
                Driver::Async(rt, e) => rt.block_on(e.approve(user, tx)),
            }
        }

        fn reject(&mut self, user: UserId, tx: TransactionId) -> Result<ReviewOutcome, YieldError> {
            match self {
                Driver::Sync(e) => e.reject(user, tx),
                Driver::Async(rt, e) => rt.block_on(e.reject(user, tx)),
            }
        }

        fn buy(&mut self, user: UserId, product: u32) -> Result<PurchaseReceipt, YieldError> {
            match self {
                Driver::Sync(e) => e.buy(user, product),
                Driver::Async(rt, e) => rt.block_on(e.buy(user, product)),
            }
        }

        fn accrue(&mut self, user: UserId) -> Result<AccrualSummary, YieldError> {
            match self {
                Driver::Sync(e) => e.accrue(user),
                Driver::Async(rt, e) => rt.block_on(e.accrue(user)),
            }
        }

        fn ledger(&mut self, user: UserId) -> UserLedger {
            match self {
                Driver::Sync(e) => e.ledger(user).unwrap().clone(),
                Driver::Async(rt, e) => rt.block_on(e.ledger(user)).unwrap(),
            }
        }

        fn balance(&mut self, user: UserId) -> Decimal {
            self.ledger(user).account().balance
        }

        /// Register `user` and fund them through an approved recharge
        fn funded(&mut self, user: UserId, amount: Decimal) {
            self.register(user, None).unwrap();
            let tx = self.recharge(user, amount).unwrap();
            self.approve(user, tx).unwrap();
        }
    }

    struct World {
        _dir: TempDir,
        path: PathBuf,
        clock: Arc<ManualClock>,
        driver: Driver,
    }

    fn world(kind: Kind) -> World {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        let clock = Arc::new(ManualClock::new(T0));
        let driver = Driver::open(kind, &path, clock.clone());
        World {
            _dir: dir,
            path,
            clock,
            driver,
        }
    }

    #[rstest]
    fn test_basic_accrual(#[values(Kind::Sync, Kind::Async)] kind: Kind) {
        let mut w = world(kind);
        w.driver.funded(1, dec!(1000));

        w.driver.buy(1, 1).unwrap();
        assert_eq!(w.driver.balance(1), dec!(400));

        w.clock.advance_days(3, DAY);
        let summary = w.driver.accrue(1).unwrap();

        assert_eq!(summary.total_earnings, dec!(270));
        let ledger = w.driver.ledger(1);
        assert_eq!(ledger.account().balance, dec!(670));
        let purchase = ledger.purchases().iter().next().unwrap();
        assert_eq!(purchase.days_remaining, 97);
        assert_eq!(purchase.last_collection_timestamp, T0 + 3 * DAY);

        let profits: Vec<_> = ledger
            .transactions()
            .iter()
            .filter(|t| t.tx_type == TransactionType::Profit)
            .collect();
        assert_eq!(profits.len(), 1);
        assert_eq!(profits[0].amount, dec!(270));
        assert!(ledger.is_reconciled());
    }

    #[rstest]
    fn test_expiry_after_long_absence(#[values(Kind::Sync, Kind::Async)] kind: Kind) {
        let mut w = world(kind);
        w.driver.funded(1, dec!(1000));
        w.driver.buy(1, 1).unwrap();

        w.clock.advance_days(150, DAY);
        w.driver.accrue(1).unwrap();

        let ledger = w.driver.ledger(1);
        assert_eq!(ledger.account().balance, dec!(9400));
        let purchase = ledger.purchases().iter().next().unwrap();
        assert_eq!(purchase.status, PurchaseStatus::Expired);
        assert_eq!(purchase.days_remaining, 0);

        w.clock.advance_days(10, DAY);
        let later = w.driver.accrue(1).unwrap();
        assert!(later.is_empty());
        assert_eq!(w.driver.balance(1), dec!(9400));

        let raw = fs::read_to_string(&w.path).unwrap();
        assert!(raw.contains("\"status\": \"EXPIRED\""));
        assert!(raw.contains("\"daysRemaining\": 0"));
    }

    #[rstest]
    fn test_insufficient_balance(#[values(Kind::Sync, Kind::Async)] kind: Kind) {
        let mut w = world(kind);
        w.driver.funded(1, dec!(500));
        let before = w.driver.ledger(1);

        let result = w.driver.buy(1, 1);

        let error = result.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Precondition);
        assert_eq!(error, YieldError::insufficient_balance(1, dec!(500), dec!(600)));
        assert_eq!(w.driver.ledger(1), before);
    }

    #[rstest]
    fn test_purchase_limit(#[values(Kind::Sync, Kind::Async)] kind: Kind) {
        let mut w = world(kind);
        w.driver.funded(1, dec!(5000));
        w.driver.buy(1, 1).unwrap();

        let result = w.driver.buy(1, 1);

        assert!(matches!(
            result,
            Err(YieldError::PurchaseLimitReached { limit: 1, .. })
        ));
        assert_eq!(w.driver.balance(1), dec!(4400));
    }

    #[rstest]
    fn test_accrual_is_idempotent(#[values(Kind::Sync, Kind::Async)] kind: Kind) {
        let mut w = world(kind);
        w.driver.funded(1, dec!(3000));
        w.driver.buy(1, 1).unwrap();
        w.driver.buy(1, 2).unwrap();
        w.clock.advance_days(2, DAY);

        w.driver.accrue(1).unwrap();
        let after_first = w.driver.ledger(1);
        let second = w.driver.accrue(1).unwrap();

        assert!(second.is_empty());
        assert_eq!(w.driver.ledger(1), after_first);
    }

    #[rstest]
    fn test_accrual_frequency_does_not_matter(#[values(Kind::Sync, Kind::Async)] kind: Kind) {
        let mut hourly = world(kind);
        let mut once = world(kind);
        for w in [&mut hourly, &mut once] {
            w.driver.funded(1, dec!(3000));
            w.driver.buy(1, 1).unwrap();
            w.driver.buy(1, 2).unwrap();
        }

        for _ in 0..(12 * 24) {
            hourly.clock.advance_millis(HOUR);
            hourly.driver.accrue(1).unwrap();
        }
        once.clock.advance_days(12, DAY);
        once.driver.accrue(1).unwrap();

        let a = hourly.driver.ledger(1);
        let b = once.driver.ledger(1);
        assert_eq!(a.account(), b.account());
        assert_eq!(a.account().balance, dec!(400) + dec!(12) * (dec!(90) + dec!(320)));
        for (x, y) in a.purchases().iter().zip(b.purchases().iter()) {
            assert_eq!(x.last_collection_timestamp, y.last_collection_timestamp);
            assert_eq!(x.days_remaining, y.days_remaining);
        }
    }

    #[rstest]
    fn test_withdrawal_review_flow(#[values(Kind::Sync, Kind::Async)] kind: Kind) {
        let mut w = world(kind);
        w.driver.funded(1, dec!(100));
        w.driver.register(2, Some(1)).unwrap();
        w.driver.commission(1, dec!(60)).unwrap();

        let rejected = w.driver.withdraw(1, dec!(50)).unwrap();
        assert_eq!(w.driver.ledger(1).account().withdrawable_balance, dec!(10));
        w.driver.reject(1, rejected).unwrap();
        assert_eq!(w.driver.ledger(1).account().withdrawable_balance, dec!(60));

        let approved = w.driver.withdraw(1, dec!(60)).unwrap();
        let outcome = w.driver.approve(1, approved).unwrap();
        assert_eq!(outcome.status, TransactionStatus::Approved);

        let ledger = w.driver.ledger(1);
        assert_eq!(ledger.account().balance, dec!(100));
        assert_eq!(ledger.account().withdrawable_balance, dec!(0));
        assert_eq!(ledger.account().total_withdrawn, dec!(60));
        assert!(ledger.is_reconciled());

        assert!(matches!(
            w.driver.withdraw(1, dec!(1)),
            Err(YieldError::InsufficientWithdrawable { .. })
        ));
    }

    #[rstest]
    fn test_double_review_is_rejected(#[values(Kind::Sync, Kind::Async)] kind: Kind) {
        let mut w = world(kind);
        w.driver.register(1, None).unwrap();
        let tx = w.driver.recharge(1, dec!(250)).unwrap();

        w.driver.approve(1, tx).unwrap();
        let again = w.driver.approve(1, tx);
        let flipped = w.driver.reject(1, tx);

        assert_eq!(
            again.unwrap_err(),
            YieldError::TransactionNotPending {
                tx,
                status: TransactionStatus::Approved
            }
        );
        assert!(matches!(flipped, Err(YieldError::TransactionNotPending { .. })));
        assert_eq!(w.driver.balance(1), dec!(250));
    }

    #[rstest]
    fn test_reconciliation_over_a_mixed_history(#[values(Kind::Sync, Kind::Async)] kind: Kind) {
        let mut w = world(kind);
        w.driver.funded(1, dec!(8000));
        w.driver.buy(1, 3).unwrap();
        w.driver.buy(1, 1).unwrap();
        let pending = w.driver.recharge(1, dec!(999)).unwrap();

        for step in 1..=40 {
            w.clock.advance_millis(DAY + 5 * HOUR);
            w.driver.accrue(1).unwrap();
            if step % 10 == 0 {
                w.driver.commission(1, dec!(12.5)).unwrap();
            }
        }
        w.driver.reject(1, pending).unwrap();

        let ledger = w.driver.ledger(1);
        assert!(ledger.is_reconciled());
        for purchase in ledger.purchases().iter() {
            let elapsed = purchase.last_collection_timestamp - purchase.purchase_timestamp;
            assert_eq!(elapsed % DAY, 0);
            assert_eq!(
                100 - purchase.days_remaining as i64,
                elapsed / DAY,
                "credited days match the watermark"
            );
        }
    }

    #[rstest]
    fn test_state_survives_reopen_by_either_engine(
        #[values(Kind::Sync, Kind::Async)] writer: Kind,
        #[values(Kind::Sync, Kind::Async)] reader: Kind,
    ) {
        let mut w = world(writer);
        w.driver.funded(1, dec!(1000));
        w.driver.funded(2, dec!(2500));
        w.driver.buy(1, 1).unwrap();
        let receipt = w.driver.buy(2, 2).unwrap();
        w.clock.advance_days(1, DAY);
        w.driver.accrue(1).unwrap();

        let mut reopened = Driver::open(reader, &w.path, w.clock.clone());

        assert_eq!(reopened.ledger(1), w.driver.ledger(1));
        assert_eq!(reopened.ledger(2), w.driver.ledger(2));
        let next = reopened.recharge(2, dec!(1)).unwrap();
        assert!(next > receipt.transaction_id);

        w.clock.advance_days(1, DAY);
        assert_eq!(reopened.accrue(2).unwrap().total_earnings, dec!(640));
    }

    #[rstest]
    fn test_failed_write_rolls_back(#[values(Kind::Sync, Kind::Async)] kind: Kind) {
        let dir = tempdir().unwrap();
        let state_dir = dir.path().join("state");
        fs::create_dir(&state_dir).unwrap();
        let path = state_dir.join("state.json");
        let clock = Arc::new(ManualClock::new(T0));
        let mut driver = Driver::open(kind, &path, clock.clone());
        driver.funded(1, dec!(1000));
        let before = driver.ledger(1);

        fs::remove_dir_all(&state_dir).unwrap();
        let result = driver.buy(1, 1);

        assert_eq!(result.unwrap_err().kind(), ErrorKind::Persistence);
        assert_eq!(driver.ledger(1), before);
    }

    #[test]
    fn test_scheduler_on_file_store() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        let clock = Arc::new(ManualClock::new(T0));
        let config = EngineConfig {
            accrual_interval: Duration::from_millis(10),
            ..EngineConfig::default()
        };

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            let store = Arc::new(JsonFileStore::new(&path));
            let engine = AsyncYieldEngine::open(Catalog::default(), config, store, clock.clone())
                .await
                .unwrap();
            for user in 1..=4 {
                engine.register_user(user, None).await.unwrap();
                let tx = engine.request_recharge(user, dec!(600), None).await.unwrap();
                engine.approve(user, tx).await.unwrap();
                engine.buy(user, 1).await.unwrap();
            }
            clock.advance_days(2, DAY);

            let scheduler = AccrualScheduler::new(engine);
            scheduler
                .run(tokio::time::sleep(Duration::from_millis(80)))
                .await;
        });

        let mut reader = Driver::open(Kind::Sync, &path, clock);
        for user in 1..=4 {
            assert_eq!(reader.balance(user), dec!(180));
        }
    }
}
