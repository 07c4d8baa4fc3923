//! Core types for nomina
//!
//! This crate provides the canonical ledger model every format converter
//! reads from and writes into ("hub" of the hub-and-spoke conversion):
//!
//! - [`Book`] - The root aggregate holding accounts and transactions
//! - [`Account`] - A node in the hierarchical account tree
//! - [`Transaction`] - A dated, multi-split double-entry transaction
//! - [`Split`] - One leg of a transaction (amount + account)
//! - [`Stats`] - Derived counts, date range and currency histogram
//! - [`ConversionLog`] - Structured diagnostics collected during a conversion
//!
//! # Example
//!
//! ```
//! use nomina_core::{AccountType, Book, Split, Transaction};
//! use rust_decimal_macros::dec;
//!
//! let mut book = Book::new();
//! book.create_account("Cash", AccountType::Bank, None).unwrap();
//! book.create_account("Expenses:Food", AccountType::Expense, None).unwrap();
//!
//! let tx = Transaction::new("2024-01-15")
//!     .with_description("Lunch")
//!     .with_split(Split::new(dec!(-12.50), "Cash"))
//!     .with_split(Split::new(dec!(12.50), "Expenses:Food"));
//! book.add_transaction("2024-01-15:1", tx);
//!
//! let balances = book.calc_balances(false).unwrap();
//! assert_eq!(balances.get("Expenses"), Some(dec!(12.50)));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod account;
pub mod book;
pub mod dates;
pub mod log;
pub mod stats;
pub mod transaction;

pub use account::{Account, AccountType};
pub use book::{Balances, Book, BookError, LEDGER_BOOK_FILE_TYPE};
pub use log::{ConversionLog, LogEntry, Severity};
pub use stats::Stats;
pub use transaction::{Split, Transaction};

// Re-export commonly used external types
pub use chrono::NaiveDate;
pub use rust_decimal::Decimal;
