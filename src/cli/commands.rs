//! Command execution
//!
//! Every one-shot command opens the synchronous engine on the state file,
//! performs a single operation and exits. `run` starts the async engine and
//! the accrual scheduler on a multi-threaded runtime instead.

use std::io::Write;
use std::sync::Arc;

use tracing::{info, warn};

use super::args::{CliArgs, Command};
use crate::config::EngineConfig;
use crate::core::{AccrualScheduler, AsyncYieldEngine, Catalog, SystemClock, YieldEngine};
use crate::io::{write_accounts_csv, write_catalog_csv, write_transactions_csv, JsonFileStore};
use crate::types::YieldError;

/// Execute the parsed command, writing its result to `output`
pub fn execute(args: &CliArgs, output: &mut dyn Write) -> Result<(), YieldError> {
    let catalog = match &args.catalog {
        Some(path) => Catalog::from_json_file(path)?,
        None => Catalog::default(),
    };
    let config = args.to_engine_config();

    if let Command::Run { .. } = args.command {
        return run_scheduler(args, catalog, config);
    }

    let store = JsonFileStore::new(&args.state);
    let mut engine = YieldEngine::open(catalog, config, store, SystemClock)?;

    match &args.command {
        Command::Register { user, referrer } => {
            engine.register_user(*user, *referrer)?;
            writeln!(output, "registered user {user}")?;
        }
        Command::Recharge { user, amount, utr } => {
            let tx = engine.request_recharge(*user, *amount, utr.clone())?;
            writeln!(output, "recharge {tx} pending")?;
        }
        Command::Withdraw {
            user,
            amount,
            details,
        } => {
            let tx = engine.request_withdrawal(*user, *amount, details.clone())?;
            writeln!(output, "withdrawal {tx} pending")?;
        }
        Command::Approve { user, tx } => {
            let outcome = engine.approve(*user, *tx)?;
            writeln!(
                output,
                "{} {} approved, balance {:.2}",
                outcome.tx_type.as_str(),
                tx,
                engine.account(*user)?.balance
            )?;
        }
        Command::Reject { user, tx } => {
            let outcome = engine.reject(*user, *tx)?;
            writeln!(output, "{} {} rejected", outcome.tx_type.as_str(), tx)?;
        }
        Command::Buy { user, product } => {
            let receipt = engine.buy(*user, *product)?;
            writeln!(
                output,
                "purchase {} of product {}, balance {:.2}",
                receipt.purchase_id, receipt.product_id, receipt.balance_after
            )?;
        }
        Command::Commission {
            user,
            amount,
            details,
        } => {
            let tx = engine.grant_commission(*user, *amount, details.clone())?;
            writeln!(output, "commission {tx} credited")?;
        }
        Command::Accrue { user: Some(user) } => {
            let summary = engine.accrue(*user)?;
            writeln!(
                output,
                "user {}: credited {:.2} over {} purchases, {} expired",
                user,
                summary.total_earnings,
                summary.credits.len(),
                summary.expired.len()
            )?;
        }
        Command::Accrue { user: None } => {
            let mut failures = 0;
            let mut first_error = None;
            for (user, result) in engine.accrue_all() {
                match result {
                    Ok(summary) => writeln!(
                        output,
                        "user {}: credited {:.2} over {} purchases, {} expired",
                        user,
                        summary.total_earnings,
                        summary.credits.len(),
                        summary.expired.len()
                    )?,
                    Err(e) => {
                        warn!(user, error = %e, "accrual failed");
                        failures += 1;
                        first_error.get_or_insert(e);
                    }
                }
            }
            if let Some(e) = first_error {
                warn!(failures, "accrual failed for some users");
                return Err(e);
            }
        }
        Command::Accounts => write_accounts_csv(&engine.accounts(), output)?,
        Command::History { user } => write_transactions_csv(engine.history(*user)?, output)?,
        Command::Catalog => write_catalog_csv(engine.catalog(), output)?,
        Command::Run { .. } => {}
    }

    Ok(())
}

fn run_scheduler(args: &CliArgs, catalog: Catalog, config: EngineConfig) -> Result<(), YieldError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.max_concurrent_users)
        .enable_all()
        .build()
        .map_err(|e| YieldError::IoError {
            message: format!("Failed to create tokio runtime: {e}"),
        })?;

    runtime.block_on(async {
        let store = Arc::new(JsonFileStore::new(&args.state));
        let engine =
            AsyncYieldEngine::open(catalog, config, store, Arc::new(SystemClock)).await?;
        let scheduler = AccrualScheduler::new(engine);

        scheduler
            .run(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!(error = %e, "cannot listen for ctrl-c, stopping");
                }
            })
            .await;

        info!("scheduler stopped");
        Ok(())
    })
}
