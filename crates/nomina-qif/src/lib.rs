//! Quicken Interchange Format (QIF) parser
//!
//! QIF is a line-oriented format: each record is a sequence of
//! `<code><value>` lines terminated by `^`, grouped under `!Type:`/`!Account`
//! headers. See <https://en.wikipedia.org/wiki/Quicken_Interchange_Format>.
//!
//! The parser is a state machine over input lines that tolerates malformed
//! input: unrecognized lines become [`ErrorRecord`]s, field normalization
//! failures are collected per record, and parsing always runs to the end of
//! the file. Observed dialects range from standard Quicken exports to
//! FinanzmanagerDeluxe.
//!
//! - [`QifParser`] - the state machine, accumulating accounts, classes,
//!   categories and transactions
//! - [`SplitCategory`] - the split-target mini-grammar
//!   (`category`, `[account]`, `category/class`, combinations with `|`)
//! - [`parse_amount`] - separator-tolerant decimal parsing

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod parser;
pub mod record;
pub mod split;

pub use parser::QifParser;
pub use record::{
    parse_amount, AmountParseError, ErrorRecord, QifAccount, QifCategory, QifClass,
    QifTransaction,
};
pub use split::SplitCategory;
