//! Derived statistics over native and ledger models.
//!
//! Every format reader and the ledger [`Book`](crate::Book) expose the same
//! [`Stats`] shape, which doubles as a test oracle for conversions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A read-only statistics snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    /// Number of accounts
    pub accounts: usize,
    /// Number of transactions
    pub transactions: usize,
    /// Earliest transaction date (`YYYY-MM-DD`), `None` without dated transactions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    /// Latest transaction date (`YYYY-MM-DD`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    /// Number of classes, where the source format has them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classes: Option<usize>,
    /// Number of categories, where the source format has them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<usize>,
    /// Number of parse or conversion errors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<usize>,
    /// Currency occurrence histogram, counted per account
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub currencies: BTreeMap<String, usize>,
    /// Free-form extras (field histograms, source options, ...)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub other: BTreeMap<String, serde_yaml::Value>,
}

impl Stats {
    /// Create a stats snapshot with only the two mandatory counts set.
    #[must_use]
    pub fn new(accounts: usize, transactions: usize) -> Self {
        Self {
            accounts,
            transactions,
            ..Self::default()
        }
    }

    /// The currency with the highest occurrence count.
    ///
    /// Ties break deterministically in favor of the lexicographically
    /// smallest currency code. `None` when no currencies were counted.
    #[must_use]
    pub fn main_currency(&self) -> Option<&str> {
        self.currencies
            .iter()
            .max_by(|(ca, na), (cb, nb)| na.cmp(nb).then_with(|| cb.cmp(ca)))
            .map(|(currency, _)| currency.as_str())
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# Accounts: {}", self.accounts)?;
        writeln!(f, "# Transactions: {}", self.transactions)?;
        writeln!(
            f,
            "Date Range: {} to {}",
            self.start_date.as_deref().unwrap_or("?"),
            self.end_date.as_deref().unwrap_or("?")
        )?;
        if let Some(classes) = self.classes {
            writeln!(f, "# Classes: {classes}")?;
        }
        if let Some(categories) = self.categories {
            writeln!(f, "# Categories: {categories}")?;
        }
        if let Some(errors) = self.errors {
            writeln!(f, "# Errors: {errors}")?;
        }
        if !self.currencies.is_empty() {
            let summary: Vec<String> = self
                .currencies
                .iter()
                .map(|(currency, count)| format!("{currency}: {count}"))
                .collect();
            writeln!(f, "# Currencies: {}", summary.join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_main_currency() {
        let mut stats = Stats::new(3, 10);
        stats.currencies.insert("EUR".to_string(), 7);
        stats.currencies.insert("USD".to_string(), 2);
        assert_eq!(stats.main_currency(), Some("EUR"));
    }

    #[test]
    fn test_main_currency_tie_breaks_lexicographically() {
        let mut stats = Stats::new(0, 0);
        stats.currencies.insert("USD".to_string(), 3);
        stats.currencies.insert("CHF".to_string(), 3);
        stats.currencies.insert("EUR".to_string(), 3);
        assert_eq!(stats.main_currency(), Some("CHF"));
    }

    #[test]
    fn test_main_currency_empty() {
        assert_eq!(Stats::new(0, 0).main_currency(), None);
    }

    #[test]
    fn test_display_skips_absent_counts() {
        let stats = Stats::new(1, 2);
        let text = stats.to_string();
        assert!(text.contains("# Accounts: 1"));
        assert!(!text.contains("# Classes"));
    }
}
