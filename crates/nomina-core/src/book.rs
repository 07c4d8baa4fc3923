//! The ledger book: root aggregate of the canonical model.
//!
//! A [`Book`] owns the account tree and the transaction map and provides the
//! operations every converter relies on: parent-aware account creation,
//! balance calculation with upward propagation, pruning of unused accounts,
//! date-range filtering and YAML persistence (the only format the core fully
//! owns).

use crate::account::{Account, AccountType};
use crate::dates;
use crate::log::ConversionLog;
use crate::stats::Stats;
use crate::transaction::Transaction;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use thiserror::Error;

/// Marker value of the `file_type` key, used for format sniffing.
pub const LEDGER_BOOK_FILE_TYPE: &str = "NOMINA-LEDGER-BOOK-YAML";

/// Schema version written into new books.
pub const LEDGER_BOOK_VERSION: &str = "0.1";

/// Errors from book operations.
#[derive(Debug, Error)]
pub enum BookError {
    /// A parent account id did not resolve
    #[error("invalid parent account {0}")]
    UnknownParent(String),
    /// A split referenced an account the book does not contain
    #[error("split references unknown account {account_id} in transaction {transaction_id}")]
    UnknownSplitAccount {
        /// The unresolved account id
        account_id: String,
        /// Id of the transaction holding the split
        transaction_id: String,
    },
    /// YAML (de)serialization failed
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    /// File I/O failed
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn default_file_type() -> String {
    LEDGER_BOOK_FILE_TYPE.to_string()
}

fn default_version() -> String {
    LEDGER_BOOK_VERSION.to_string()
}

/// The result of a balance calculation.
///
/// An account whose balance is `None` was never referenced by any split,
/// directly or through a descendant.
#[derive(Debug, Clone, Default)]
pub struct Balances {
    by_account: BTreeMap<String, Option<Decimal>>,
    /// Diagnostics collected while calculating (lenient mode only)
    pub log: ConversionLog,
}

impl Balances {
    /// The balance of the given account, `None` if unused or unknown.
    #[must_use]
    pub fn get(&self, account_id: &str) -> Option<Decimal> {
        self.by_account.get(account_id).copied().flatten()
    }

    /// Whether the account was referenced by at least one split (or child).
    #[must_use]
    pub fn is_used(&self, account_id: &str) -> bool {
        self.get(account_id).is_some()
    }

    /// Account ids whose balance is `None`.
    #[must_use]
    pub fn unused_accounts(&self) -> Vec<String> {
        self.by_account
            .iter()
            .filter(|(_, balance)| balance.is_none())
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Iterate over `(account_id, balance)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<Decimal>)> {
        self.by_account.iter().map(|(id, b)| (id.as_str(), *b))
    }
}

/// A ledger book containing accounts and transactions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Book {
    /// Format marker, always [`LEDGER_BOOK_FILE_TYPE`]
    #[serde(default = "default_file_type")]
    pub file_type: String,
    /// Schema version
    #[serde(default = "default_version")]
    pub version: String,
    /// Book name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Book owner
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Date the book tracks data since
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<String>,
    /// Source URL, if the book was derived from a published example
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Accounts by id
    #[serde(default)]
    pub accounts: BTreeMap<String, Account>,
    /// Transactions by synthesized id
    #[serde(default)]
    pub transactions: BTreeMap<String, Transaction>,
}

impl Book {
    /// Create an empty book.
    #[must_use]
    pub fn new() -> Self {
        Self {
            file_type: default_file_type(),
            version: default_version(),
            ..Self::default()
        }
    }

    /// Add an account, replacing any previous account with the same id.
    pub fn add_account(&mut self, account: Account) -> &Account {
        let id = account.account_id.clone();
        self.accounts.insert(id.clone(), account);
        &self.accounts[&id]
    }

    /// Look up an account by id.
    #[must_use]
    pub fn lookup_account(&self, account_id: &str) -> Option<&Account> {
        self.accounts.get(account_id)
    }

    /// Add a transaction under the given id.
    pub fn add_transaction(&mut self, transaction_id: impl Into<String>, tx: Transaction) {
        self.transactions.insert(transaction_id.into(), tx);
    }

    /// Create an account, synthesizing missing ancestors.
    ///
    /// `name` may be a colon-joined path (`Expenses:Food:Groceries`); every
    /// missing intermediate account is created with the same type. With a
    /// `parent_account_id` the path is rooted under that account, which must
    /// already exist. Existing accounts along the path are left untouched,
    /// so declaring the same path twice creates no duplicates.
    ///
    /// Returns the id of the leaf account.
    pub fn create_account(
        &mut self,
        name: &str,
        account_type: AccountType,
        parent_account_id: Option<&str>,
    ) -> Result<String, BookError> {
        if let Some(parent_id) = parent_account_id {
            if !self.accounts.contains_key(parent_id) {
                return Err(BookError::UnknownParent(parent_id.to_string()));
            }
        }

        let mut prefix = parent_account_id.map(str::to_string);
        for segment in name.split(':').filter(|s| !s.is_empty()) {
            let account_id = match &prefix {
                Some(p) => format!("{p}:{segment}"),
                None => segment.to_string(),
            };
            if !self.accounts.contains_key(&account_id) {
                let mut account =
                    Account::new(account_id.clone(), account_type).with_name(segment);
                if let Some(p) = &prefix {
                    account = account.with_parent(p.clone());
                }
                self.accounts.insert(account_id.clone(), account);
            }
            prefix = Some(account_id);
        }

        prefix.ok_or_else(|| BookError::UnknownParent(name.to_string()))
    }

    /// The fully qualified account name: ancestor names joined by `separator`.
    ///
    /// Used when exporting to formats without hierarchical account ids.
    #[must_use]
    pub fn fq_account_name(&self, account: &Account, separator: &str) -> String {
        let mut names = vec![account.name.clone()];
        let mut seen: HashSet<&str> = HashSet::new();
        let mut current = account.parent_account_id.as_deref();
        while let Some(parent_id) = current {
            if !seen.insert(parent_id) {
                break;
            }
            match self.accounts.get(parent_id) {
                Some(parent) => {
                    names.push(parent.name.clone());
                    current = parent.parent_account_id.as_deref();
                }
                None => break,
            }
        }
        names.reverse();
        names.join(separator)
    }

    /// Depth of an account in the tree (top-level accounts have depth 0).
    fn account_depth(&self, account: &Account) -> usize {
        let mut depth = 0;
        let mut seen: HashSet<&str> = HashSet::new();
        let mut current = account.parent_account_id.as_deref();
        while let Some(parent_id) = current {
            if !seen.insert(parent_id) {
                break;
            }
            depth += 1;
            current = self
                .accounts
                .get(parent_id)
                .and_then(|p| p.parent_account_id.as_deref());
        }
        depth
    }

    /// Calculate per-account balances including upward propagation.
    ///
    /// Pass 1 sums split amounts into their accounts; an account no split
    /// ever touches keeps a `None` balance. Pass 2 propagates balances
    /// bottom-up, processing accounts by descending depth so that a single
    /// call yields correct totals for arbitrarily deep hierarchies.
    ///
    /// A split referencing an unknown account is a hard error unless
    /// `lenient` is set, in which case it is reported in the returned log
    /// and skipped.
    pub fn calc_balances(&self, lenient: bool) -> Result<Balances, BookError> {
        let mut balances = Balances::default();
        for account_id in self.accounts.keys() {
            balances.by_account.insert(account_id.clone(), None);
        }

        // pass 1: leaf balances from splits
        for (transaction_id, tx) in &self.transactions {
            for split in &tx.splits {
                match balances.by_account.get_mut(&split.account_id) {
                    Some(balance) => {
                        *balance = Some(balance.unwrap_or(Decimal::ZERO) + split.amount);
                    }
                    None => {
                        if lenient {
                            balances.log.warn(
                                "split",
                                format!(
                                    "split references unknown account {} in transaction {transaction_id}",
                                    split.account_id
                                ),
                            );
                        } else {
                            return Err(BookError::UnknownSplitAccount {
                                account_id: split.account_id.clone(),
                                transaction_id: transaction_id.clone(),
                            });
                        }
                    }
                }
            }
        }

        // pass 2: bottom-up propagation, deepest accounts first
        let mut ordered: Vec<&Account> = self.accounts.values().collect();
        ordered.sort_by_key(|account| std::cmp::Reverse(self.account_depth(account)));
        for account in ordered {
            let Some(parent_id) = account.parent_account_id.clone() else {
                continue;
            };
            let Some(child_balance) = balances.get(&account.account_id) else {
                continue;
            };
            if let Some(parent_balance) = balances.by_account.get_mut(&parent_id) {
                *parent_balance = Some(parent_balance.unwrap_or(Decimal::ZERO) + child_balance);
            }
        }

        Ok(balances)
    }

    /// Remove every account whose computed balance is `None`.
    ///
    /// Returns the removed account ids.
    pub fn remove_unused_accounts(&mut self) -> Result<Vec<String>, BookError> {
        let balances = self.calc_balances(true)?;
        let unused = balances.unused_accounts();
        for account_id in &unused {
            self.accounts.remove(account_id);
        }
        Ok(unused)
    }

    /// Return a copy holding only transactions within `[start_date, end_date]`.
    ///
    /// Bounds compare against the `YYYY-MM-DD` part of the transaction date
    /// (time of day is ignored) and are open-ended when omitted. With
    /// `prune_unused` the copy additionally drops now-unreferenced accounts.
    pub fn filter(
        &self,
        start_date: Option<&str>,
        end_date: Option<&str>,
        prune_unused: bool,
    ) -> Result<Self, BookError> {
        let mut filtered = self.clone();
        filtered.transactions = self
            .transactions
            .iter()
            .filter(|(_, tx)| {
                let date = tx.date_part();
                start_date.map_or(true, |start| date >= start)
                    && end_date.map_or(true, |end| date <= end)
            })
            .map(|(id, tx)| (id.clone(), tx.clone()))
            .collect();
        if prune_unused {
            filtered.remove_unused_accounts()?;
        }
        Ok(filtered)
    }

    /// Statistics snapshot: counts, date range and per-account currency histogram.
    #[must_use]
    pub fn get_stats(&self) -> Stats {
        let mut stats = Stats::new(self.accounts.len(), self.transactions.len());

        let mut parsed_dates: Vec<chrono::NaiveDate> = self
            .transactions
            .values()
            .filter_map(|tx| chrono::NaiveDate::parse_from_str(tx.date_part(), "%Y-%m-%d").ok())
            .collect();
        parsed_dates.sort_unstable();
        stats.start_date = parsed_dates.first().map(|d| dates::iso_date(*d));
        stats.end_date = parsed_dates.last().map(|d| dates::iso_date(*d));

        for account in self.accounts.values() {
            *stats.currencies.entry(account.currency.clone()).or_default() += 1;
        }
        stats
    }

    /// Serialize the book to YAML.
    pub fn to_yaml(&self) -> Result<String, BookError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Deserialize a book from YAML text.
    pub fn from_yaml(yaml: &str) -> Result<Self, BookError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load a book from a YAML file.
    pub fn load_yaml_file(path: &Path) -> Result<Self, BookError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    /// Write the book to a YAML file.
    pub fn save_yaml_file(&self, path: &Path) -> Result<(), BookError> {
        std::fs::write(path, self.to_yaml()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::Split;
    use rust_decimal_macros::dec;

    fn sample_book() -> Book {
        let mut book = Book::new();
        book.create_account("Cash", AccountType::Bank, None).unwrap();
        book.create_account("Expenses:Food:Groceries", AccountType::Expense, None)
            .unwrap();
        book.add_transaction(
            "2024-01-15:1",
            Transaction::new("2024-01-15")
                .with_split(Split::new(dec!(-20), "Cash"))
                .with_split(Split::new(dec!(20), "Expenses:Food:Groceries")),
        );
        book.add_transaction(
            "2024-02-01:2",
            Transaction::new("2024-02-01")
                .with_split(Split::new(dec!(-5), "Cash"))
                .with_split(Split::new(dec!(5), "Expenses:Food:Groceries")),
        );
        book
    }

    #[test]
    fn test_create_account_synthesizes_ancestors() {
        let mut book = Book::new();
        let leaf = book
            .create_account("Expenses:Food:Groceries", AccountType::Expense, None)
            .unwrap();
        assert_eq!(leaf, "Expenses:Food:Groceries");
        assert_eq!(book.accounts.len(), 3);
        let expenses = book.lookup_account("Expenses").unwrap();
        assert!(expenses.parent_account_id.is_none());
        let food = book.lookup_account("Expenses:Food").unwrap();
        assert_eq!(food.parent_account_id.as_deref(), Some("Expenses"));
        assert_eq!(food.name, "Food");
        let groceries = book.lookup_account("Expenses:Food:Groceries").unwrap();
        assert_eq!(groceries.parent_account_id.as_deref(), Some("Expenses:Food"));
    }

    #[test]
    fn test_create_account_is_idempotent() {
        let mut book = Book::new();
        book.create_account("Expenses:Food", AccountType::Expense, None)
            .unwrap();
        book.create_account("Expenses:Food", AccountType::Expense, None)
            .unwrap();
        assert_eq!(book.accounts.len(), 2);
    }

    #[test]
    fn test_create_account_under_parent() {
        let mut book = Book::new();
        book.create_account("Category", AccountType::Category, None)
            .unwrap();
        let id = book
            .create_account("Groceries", AccountType::Category, Some("Category"))
            .unwrap();
        assert_eq!(id, "Category:Groceries");
        assert_eq!(
            book.lookup_account(&id).unwrap().parent_account_id.as_deref(),
            Some("Category")
        );
    }

    #[test]
    fn test_create_account_unknown_parent() {
        let mut book = Book::new();
        let err = book
            .create_account("X", AccountType::Expense, Some("Missing"))
            .unwrap_err();
        assert!(matches!(err, BookError::UnknownParent(p) if p == "Missing"));
    }

    #[test]
    fn test_fq_account_name() {
        let book = sample_book();
        let groceries = book.lookup_account("Expenses:Food:Groceries").unwrap();
        assert_eq!(
            book.fq_account_name(groceries, ":"),
            "Expenses:Food:Groceries"
        );
        assert_eq!(
            book.fq_account_name(groceries, "/"),
            "Expenses/Food/Groceries"
        );
    }

    #[test]
    fn test_calc_balances_deep_propagation() {
        let book = sample_book();
        let balances = book.calc_balances(false).unwrap();
        assert_eq!(balances.get("Cash"), Some(dec!(-25)));
        assert_eq!(balances.get("Expenses:Food:Groceries"), Some(dec!(25)));
        // grandparent totals must be correct after a single call
        assert_eq!(balances.get("Expenses:Food"), Some(dec!(25)));
        assert_eq!(balances.get("Expenses"), Some(dec!(25)));
    }

    #[test]
    fn test_calc_balances_unused_is_none() {
        let mut book = sample_book();
        book.create_account("Idle", AccountType::Asset, None).unwrap();
        let balances = book.calc_balances(false).unwrap();
        assert!(!balances.is_used("Idle"));
        assert_eq!(balances.unused_accounts(), vec!["Idle".to_string()]);
    }

    #[test]
    fn test_calc_balances_strict_rejects_unknown_split_account() {
        let mut book = Book::new();
        book.add_transaction(
            "t1",
            Transaction::new("2024-01-01").with_split(Split::new(dec!(1), "Ghost")),
        );
        let err = book.calc_balances(false).unwrap_err();
        assert!(matches!(
            err,
            BookError::UnknownSplitAccount { account_id, .. } if account_id == "Ghost"
        ));
    }

    #[test]
    fn test_calc_balances_lenient_logs_unknown_split_account() {
        let mut book = Book::new();
        book.add_transaction(
            "t1",
            Transaction::new("2024-01-01").with_split(Split::new(dec!(1), "Ghost")),
        );
        let balances = book.calc_balances(true).unwrap();
        assert_eq!(balances.log.count("split"), 1);
    }

    #[test]
    fn test_remove_unused_accounts() {
        let mut book = sample_book();
        book.create_account("Idle:Sub", AccountType::Asset, None).unwrap();
        let removed = book.remove_unused_accounts().unwrap();
        assert_eq!(removed, vec!["Idle".to_string(), "Idle:Sub".to_string()]);
        // every remaining account carries a balance
        let balances = book.calc_balances(false).unwrap();
        for (id, _) in balances.iter() {
            assert!(balances.is_used(id), "{id} should be used");
        }
    }

    #[test]
    fn test_filter_date_range() {
        let book = sample_book();
        let filtered = book.filter(Some("2024-01-01"), Some("2024-01-31"), false).unwrap();
        assert_eq!(filtered.transactions.len(), 1);
        assert_eq!(filtered.accounts.len(), book.accounts.len());
        // open-ended bounds
        let all = book.filter(None, None, false).unwrap();
        assert_eq!(all.transactions.len(), 2);
        let from_feb = book.filter(Some("2024-02-01"), None, false).unwrap();
        assert_eq!(from_feb.transactions.len(), 1);
    }

    #[test]
    fn test_filter_prunes_unused() {
        let mut book = sample_book();
        book.add_transaction(
            "2024-03-05:3",
            Transaction::new("2024-03-05").with_split(Split::new(dec!(9), "Cash")),
        );
        let filtered = book.filter(Some("2024-03-01"), None, true).unwrap();
        assert_eq!(filtered.transactions.len(), 1);
        // the Expenses subtree was only used by january/february transactions
        assert!(filtered.lookup_account("Expenses").is_none());
        assert!(filtered.lookup_account("Cash").is_some());
    }

    #[test]
    fn test_stats() {
        let book = sample_book();
        let stats = book.get_stats();
        assert_eq!(stats.accounts, 4);
        assert_eq!(stats.transactions, 2);
        assert_eq!(stats.start_date.as_deref(), Some("2024-01-15"));
        assert_eq!(stats.end_date.as_deref(), Some("2024-02-01"));
        assert_eq!(stats.currencies.get("EUR"), Some(&4));
        assert_eq!(stats.main_currency(), Some("EUR"));
    }

    #[test]
    fn test_stats_empty_book_has_no_dates() {
        let stats = Book::new().get_stats();
        assert_eq!(stats.start_date, None);
        assert_eq!(stats.end_date, None);
    }

    #[test]
    fn test_yaml_roundtrip() {
        let book = sample_book();
        let yaml = book.to_yaml().unwrap();
        assert!(yaml.contains("file_type: NOMINA-LEDGER-BOOK-YAML"));
        let back = Book::from_yaml(&yaml).unwrap();
        assert_eq!(book, back);
    }

    #[test]
    fn test_yaml_file_roundtrip() {
        let book = sample_book();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.yaml");
        book.save_yaml_file(&path).unwrap();
        let back = Book::load_yaml_file(&path).unwrap();
        assert_eq!(book.accounts.len(), back.accounts.len());
        assert_eq!(book.transactions.len(), back.transactions.len());
    }
}
