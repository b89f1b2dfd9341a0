//! I/O module
//!
//! Handles state persistence and CSV output.
//!
//! # Components
//!
//! - `json_store` - Single-file JSON store with atomic replacement
//! - `memory_store` - In-memory store with injectable failures for tests
//! - `csv_format` - CSV serialization of accounts, history and catalog

pub mod csv_format;
pub mod json_store;
pub mod memory_store;

pub use csv_format::{write_accounts_csv, write_catalog_csv, write_transactions_csv};
pub use json_store::JsonFileStore;
pub use memory_store::MemoryStore;
