//! CSV export of accounts, transaction history and the catalog
//!
//! All writers take any `Write` sink so they can be pointed at stdout or a
//! buffer in tests. Amounts are printed with two decimal places and
//! timestamps as RFC 3339 UTC.

use chrono::{DateTime, SecondsFormat};
use csv::Writer;
use std::io::Write;

use crate::core::catalog::Catalog;
use crate::types::{Timestamp, TransactionRecord, User, YieldError};

fn csv_error(context: &str, e: impl std::fmt::Display) -> YieldError {
    YieldError::IoError {
        message: format!("{}: {}", context, e),
    }
}

/// Format a millisecond timestamp as RFC 3339, falling back to the raw value
pub fn format_timestamp(timestamp: Timestamp) -> String {
    DateTime::from_timestamp_millis(timestamp)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|| timestamp.to_string())
}

/// Write account states to CSV format
///
/// Columns: user, referrer, balance, withdrawable, invested, withdrawn.
/// Users are sorted by id for deterministic output.
pub fn write_accounts_csv(users: &[User], output: &mut dyn Write) -> Result<(), YieldError> {
    let mut writer = Writer::from_writer(output);

    writer
        .write_record([
            "user",
            "referrer",
            "balance",
            "withdrawable",
            "invested",
            "withdrawn",
        ])
        .map_err(|e| csv_error("Failed to write CSV header", e))?;

    let mut sorted = users.to_vec();
    sorted.sort_by_key(|user| user.id);

    for user in sorted {
        let account = &user.account;
        writer
            .write_record(&[
                user.id.to_string(),
                user.referrer.map(|r| r.to_string()).unwrap_or_default(),
                format!("{:.2}", account.balance),
                format!("{:.2}", account.withdrawable_balance),
                format!("{:.2}", account.total_invested),
                format!("{:.2}", account.total_withdrawn),
            ])
            .map_err(|e| csv_error("Failed to write account record", e))?;
    }

    writer
        .flush()
        .map_err(|e| csv_error("Failed to flush output", e))?;

    Ok(())
}

/// Write a transaction history in log order
pub fn write_transactions_csv(
    records: &[TransactionRecord],
    output: &mut dyn Write,
) -> Result<(), YieldError> {
    let mut writer = Writer::from_writer(output);

    writer
        .write_record(["id", "user", "type", "amount", "status", "time", "utr", "details"])
        .map_err(|e| csv_error("Failed to write CSV header", e))?;

    for record in records {
        writer
            .write_record(&[
                record.id.to_string(),
                record.user_id.to_string(),
                record.tx_type.as_str().to_string(),
                format!("{:.2}", record.amount),
                record.status.as_str().to_string(),
                format_timestamp(record.timestamp),
                record.utr.clone().unwrap_or_default(),
                record.details.clone().unwrap_or_default(),
            ])
            .map_err(|e| csv_error("Failed to write transaction record", e))?;
    }

    writer
        .flush()
        .map_err(|e| csv_error("Failed to flush output", e))?;

    Ok(())
}

/// Write the product catalog
pub fn write_catalog_csv(catalog: &Catalog, output: &mut dyn Write) -> Result<(), YieldError> {
    let mut writer = Writer::from_writer(output);

    writer
        .write_record(["id", "name", "price", "daily_income", "days", "limit", "total_return"])
        .map_err(|e| csv_error("Failed to write CSV header", e))?;

    for product in catalog.products() {
        writer
            .write_record(&[
                product.id.to_string(),
                product.name.clone(),
                format!("{:.2}", product.price),
                format!("{:.2}", product.daily_income),
                product.duration_days.to_string(),
                product.purchase_limit.to_string(),
                format!("{:.2}", product.total_return()),
            ])
            .map_err(|e| csv_error("Failed to write product record", e))?;
    }

    writer
        .flush()
        .map_err(|e| csv_error("Failed to flush output", e))?;

    Ok(())
}
