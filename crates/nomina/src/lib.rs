//! nomina command line tool.
//!
//! Converts personal accounting files between the supported formats
//! through the canonical ledger book:
//!
//! ```bash
//! nomina --convert expenses.qif --format LB-YAML --output expenses.yaml
//! nomina --stats expenses.qif
//! nomina --list-formats
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cmd;
