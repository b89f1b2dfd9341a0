//! Daily Yield Engine CLI
//!
//! Command-line interface for operating the plan ledger stored in a JSON
//! state file.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- register 1
//! cargo run -- recharge 1 1000 --utr UTR123
//! cargo run -- approve 1 1
//! cargo run -- buy 1 1
//! cargo run -- accrue
//! cargo run -- accounts > accounts.csv
//! cargo run -- --ms-per-day 1000 run --interval-secs 1
//! ```
//!
//! Results go to stdout, logs to stderr.
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Error (unknown user, insufficient balance, unreadable state file, etc.)

use daily_yield_engine::cli;
use std::process;

fn main() {
    let args = cli::parse_args();

    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::from(args.log_level))
        .with_writer(std::io::stderr)
        .init();

    let mut output = std::io::stdout();
    if let Err(e) = cli::execute(&args, &mut output) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
