use crate::config::EngineConfig;
use crate::types::{ProductId, TransactionId, UserId};
use clap::{Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::time::Duration;

/// Operate a daily-yield plan ledger
#[derive(Parser, Debug)]
#[command(name = "yield-engine")]
#[command(about = "Buy plans, accrue daily income and review transactions", long_about = None)]
pub struct CliArgs {
    /// JSON file holding users, purchases and transactions
    #[arg(
        long = "state",
        value_name = "FILE",
        default_value = "yield-state.json",
        global = true
    )]
    pub state: PathBuf,

    /// JSON array of products replacing the built-in catalog
    #[arg(long = "catalog", value_name = "FILE", global = true)]
    pub catalog: Option<PathBuf>,

    /// Verbosity of the log written to stderr
    #[arg(
        long = "log-level",
        value_name = "LEVEL",
        default_value = "info",
        global = true
    )]
    pub log_level: LogLevel,

    /// Length of an accrual day in milliseconds (default: 86400000)
    #[arg(long = "ms-per-day", value_name = "MS", global = true)]
    pub ms_per_day: Option<i64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Create an account
    Register {
        user: UserId,
        /// User who referred the new one
        #[arg(long)]
        referrer: Option<UserId>,
    },

    /// Request a deposit; it stays pending until approved
    Recharge {
        user: UserId,
        amount: Decimal,
        /// Payment reference supplied by the user
        #[arg(long)]
        utr: Option<String>,
    },

    /// Request a payout from the withdrawable balance
    Withdraw {
        user: UserId,
        amount: Decimal,
        /// Payout destination details
        #[arg(long)]
        details: Option<String>,
    },

    /// Approve a pending recharge or withdrawal
    Approve { user: UserId, tx: TransactionId },

    /// Reject a pending recharge or withdrawal
    Reject { user: UserId, tx: TransactionId },

    /// Buy a plan with the account balance
    Buy { user: UserId, product: ProductId },

    /// Credit a referral commission
    Commission {
        user: UserId,
        amount: Decimal,
        #[arg(long)]
        details: Option<String>,
    },

    /// Credit income owed up to now, for one user or everyone
    Accrue { user: Option<UserId> },

    /// Print every account as CSV
    Accounts,

    /// Print a user's transactions as CSV
    History { user: UserId },

    /// Print the plan catalog as CSV
    Catalog,

    /// Accrue all users periodically until interrupted
    Run {
        /// Seconds between accrual passes (default: 60)
        #[arg(long = "interval-secs", value_name = "SECS")]
        interval_secs: Option<u64>,

        /// Maximum users accrued concurrently (default: CPU cores)
        #[arg(long = "max-concurrent", value_name = "COUNT")]
        max_concurrent: Option<usize>,

        /// Timeout of a single save in milliseconds (default: 5000)
        #[arg(long = "persist-timeout-ms", value_name = "MS")]
        persist_timeout_ms: Option<u64>,
    },
}

/// Log verbosity accepted on the command line
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

impl CliArgs {
    /// Create an EngineConfig from CLI arguments
    ///
    /// Values not given on the command line keep their defaults. Invalid
    /// values fall back to the defaults with a warning.
    pub fn to_engine_config(&self) -> EngineConfig {
        let default = EngineConfig::default();

        let (interval, concurrency, timeout) = match &self.command {
            Command::Run {
                interval_secs,
                max_concurrent,
                persist_timeout_ms,
            } => (
                interval_secs.map(Duration::from_secs),
                *max_concurrent,
                persist_timeout_ms.map(Duration::from_millis),
            ),
            _ => (None, None, None),
        };

        if self.ms_per_day.is_none()
            && interval.is_none()
            && concurrency.is_none()
            && timeout.is_none()
        {
            return default;
        }

        EngineConfig::new(
            self.ms_per_day.unwrap_or(default.ms_per_day),
            interval.unwrap_or(default.accrual_interval),
            timeout.unwrap_or(default.persist_timeout),
            concurrency.unwrap_or(default.max_concurrent_users),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal::dec;

    #[rstest]
    #[case::register(&["program", "register", "1"], Command::Register { user: 1, referrer: None })]
    #[case::register_referred(
        &["program", "register", "2", "--referrer", "1"],
        Command::Register { user: 2, referrer: Some(1) }
    )]
    #[case::recharge(
        &["program", "recharge", "1", "1000", "--utr", "UTR42"],
        Command::Recharge { user: 1, amount: dec!(1000), utr: Some("UTR42".into()) }
    )]
    #[case::withdraw(
        &["program", "withdraw", "1", "12.50"],
        Command::Withdraw { user: 1, amount: dec!(12.50), details: None }
    )]
    #[case::approve(&["program", "approve", "1", "7"], Command::Approve { user: 1, tx: 7 })]
    #[case::reject(&["program", "reject", "1", "7"], Command::Reject { user: 1, tx: 7 })]
    #[case::buy(&["program", "buy", "1", "2"], Command::Buy { user: 1, product: 2 })]
    #[case::accrue_all(&["program", "accrue"], Command::Accrue { user: None })]
    #[case::accrue_one(&["program", "accrue", "3"], Command::Accrue { user: Some(3) })]
    #[case::accounts(&["program", "accounts"], Command::Accounts)]
    #[case::history(&["program", "history", "1"], Command::History { user: 1 })]
    #[case::catalog(&["program", "catalog"], Command::Catalog)]
    fn test_command_parsing(#[case] args: &[&str], #[case] expected: Command) {
        let parsed = CliArgs::try_parse_from(args).unwrap();
        assert_eq!(parsed.command, expected);
    }

    #[rstest]
    #[case::defaults(&["program", "accounts"], "yield-state.json", LogLevel::Info)]
    #[case::before_command(
        &["program", "--state", "s.json", "--log-level", "debug", "accounts"],
        "s.json",
        LogLevel::Debug
    )]
    #[case::after_command(&["program", "accounts", "--state", "t.json"], "t.json", LogLevel::Info)]
    fn test_global_options(
        #[case] args: &[&str],
        #[case] state: &str,
        #[case] level: LogLevel,
    ) {
        let parsed = CliArgs::try_parse_from(args).unwrap();
        assert_eq!(parsed.state, PathBuf::from(state));
        assert_eq!(parsed.log_level, level);
    }

    #[test]
    fn test_engine_config_defaults() {
        let parsed = CliArgs::try_parse_from(["program", "accounts"]).unwrap();
        assert_eq!(parsed.to_engine_config(), EngineConfig::default());
    }

    #[test]
    fn test_engine_config_from_run_options() {
        let parsed = CliArgs::try_parse_from([
            "program",
            "--ms-per-day",
            "1000",
            "run",
            "--interval-secs",
            "2",
            "--max-concurrent",
            "4",
            "--persist-timeout-ms",
            "250",
        ])
        .unwrap();

        let config = parsed.to_engine_config();

        assert_eq!(config.ms_per_day, 1000);
        assert_eq!(config.accrual_interval, Duration::from_secs(2));
        assert_eq!(config.max_concurrent_users, 4);
        assert_eq!(config.persist_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_engine_config_zero_values_fall_back() {
        let parsed =
            CliArgs::try_parse_from(["program", "run", "--interval-secs", "0", "--max-concurrent", "0"])
                .unwrap();

        let config = parsed.to_engine_config();
        let default = EngineConfig::default();

        assert_eq!(config.accrual_interval, default.accrual_interval);
        assert_eq!(config.max_concurrent_users, default.max_concurrent_users);
    }

    #[rstest]
    #[case::missing_command(&["program"])]
    #[case::bad_amount(&["program", "recharge", "1", "lots"])]
    #[case::negative_user(&["program", "buy", "-1", "1"])]
    #[case::unknown_level(&["program", "--log-level", "loud", "accounts"])]
    fn test_parsing_errors(#[case] args: &[&str]) {
        assert!(CliArgs::try_parse_from(args).is_err());
    }
}
