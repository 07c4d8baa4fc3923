//! Transactions and splits.
//!
//! A transaction is a dated set of splits; under the double-entry invariant
//! the split amounts of a well-formed transaction sum to zero. Converters
//! that cannot establish a balancing split route the imbalance to the
//! reserved `Dangling` account instead of dropping data.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One leg of a transaction: an amount applied to an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Split {
    /// Signed amount
    pub amount: Decimal,
    /// Id of the affected account
    pub account_id: String,
    /// Free-form memo
    #[serde(default)]
    pub memo: String,
    /// Whether the split has been reconciled against a statement
    #[serde(default)]
    pub reconciled: bool,
}

impl Split {
    /// Create a split for the given amount and account.
    #[must_use]
    pub fn new(amount: Decimal, account_id: impl Into<String>) -> Self {
        Self {
            amount,
            account_id: account_id.into(),
            memo: String::new(),
            reconciled: false,
        }
    }

    /// Set the memo.
    #[must_use]
    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = memo.into();
        self
    }

    /// Mark the split as reconciled.
    #[must_use]
    pub const fn reconciled(mut self) -> Self {
        self.reconciled = true;
        self
    }
}

/// A ledger transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Canonical date, `YYYY-MM-DD`, optionally followed by a time of day
    pub isodate: String,
    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Counterparty, if the source format carries one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payee: Option<String>,
    /// Free-form memo
    #[serde(default)]
    pub memo: String,
    /// The legs of the transaction, at least one
    #[serde(default)]
    pub splits: Vec<Split>,
}

impl Transaction {
    /// Create an empty transaction for the given date.
    #[must_use]
    pub fn new(isodate: impl Into<String>) -> Self {
        Self {
            isodate: isodate.into(),
            description: None,
            payee: None,
            memo: String::new(),
            splits: Vec::new(),
        }
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the payee.
    #[must_use]
    pub fn with_payee(mut self, payee: impl Into<String>) -> Self {
        self.payee = Some(payee.into());
        self
    }

    /// Set the memo.
    #[must_use]
    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = memo.into();
        self
    }

    /// Append a split.
    #[must_use]
    pub fn with_split(mut self, split: Split) -> Self {
        self.splits.push(split);
        self
    }

    /// Sum of all split amounts.
    ///
    /// Zero for a balanced transaction; a non-zero total indicates a
    /// conversion defect, not a valid state.
    #[must_use]
    pub fn total_amount(&self) -> Decimal {
        self.splits.iter().map(|s| s.amount).sum()
    }

    /// The `YYYY-MM-DD` part of the date, with any time of day stripped.
    #[must_use]
    pub fn date_part(&self) -> &str {
        self.isodate
            .split_whitespace()
            .next()
            .unwrap_or(&self.isodate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_total_amount_balanced() {
        let tx = Transaction::new("2024-01-15")
            .with_split(Split::new(dec!(-12.50), "Cash"))
            .with_split(Split::new(dec!(12.50), "Expenses:Food"));
        assert_eq!(tx.total_amount(), Decimal::ZERO);
    }

    #[test]
    fn test_total_amount_imbalance_is_visible() {
        let tx = Transaction::new("2024-01-15").with_split(Split::new(dec!(5), "Cash"));
        assert_eq!(tx.total_amount(), dec!(5));
    }

    #[test]
    fn test_date_part_strips_time() {
        let tx = Transaction::new("2014-11-30 00:00:00 +0000");
        assert_eq!(tx.date_part(), "2014-11-30");
        let tx = Transaction::new("2014-11-30");
        assert_eq!(tx.date_part(), "2014-11-30");
    }

    #[test]
    fn test_split_builder() {
        let split = Split::new(dec!(1.23), "Cash").with_memo("coffee").reconciled();
        assert!(split.reconciled);
        assert_eq!(split.memo, "coffee");
    }

    #[test]
    fn test_transaction_yaml_roundtrip() {
        let tx = Transaction::new("2024-01-15")
            .with_description("Lunch")
            .with_payee("Marcy's")
            .with_split(Split::new(dec!(-7.80), "Cash"))
            .with_split(Split::new(dec!(7.80), "Expenses:Dining"));
        let yaml = serde_yaml::to_string(&tx).unwrap();
        let back: Transaction = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(tx, back);
    }
}
