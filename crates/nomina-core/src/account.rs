//! Account types for the ledger model.
//!
//! Accounts form a tree via `parent_account_id`; the id of a child is the
//! colon-joined path of its ancestors (`Expenses:Food:Groceries`). Source
//! formats with flat account lists (QIF categories, bank exports) are mapped
//! onto this tree during conversion.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of an account.
///
/// Source formats use their own vocabularies (GnuCash `act:type`, QIF
/// `!Account` type lines, Beancount namespace prefixes); conversions funnel
/// all of them through this closed set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccountType {
    /// A bank or cash account
    Bank,
    /// An expense account
    #[default]
    Expense,
    /// An income account
    Income,
    /// A liability account
    Liability,
    /// An equity account
    Equity,
    /// A generic asset account
    Asset,
    /// A category pseudo-account (flat-category source formats)
    Category,
    /// A class/tag pseudo-account (QIF classes)
    Class,
    /// The reserved sink for unresolvable split targets
    Error,
    /// The synthetic root of an account tree
    Root,
}

impl AccountType {
    /// The canonical SCREAMING-CASE name used in serialized books.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bank => "BANK",
            Self::Expense => "EXPENSE",
            Self::Income => "INCOME",
            Self::Liability => "LIABILITY",
            Self::Equity => "EQUITY",
            Self::Asset => "ASSET",
            Self::Category => "CATEGORY",
            Self::Class => "CLASS",
            Self::Error => "ERROR",
            Self::Root => "ROOT",
        }
    }

    /// Map a GnuCash `act:type` value.
    ///
    /// GnuCash knows more types than the ledger model; the extras collapse
    /// onto the nearest ledger type and anything unknown becomes an expense.
    #[must_use]
    pub fn from_gnucash(value: &str) -> Self {
        match value.to_ascii_uppercase().as_str() {
            "BANK" | "CASH" => Self::Bank,
            "EXPENSE" => Self::Expense,
            "INCOME" => Self::Income,
            "LIABILITY" | "CREDIT" | "PAYABLE" => Self::Liability,
            "EQUITY" => Self::Equity,
            "ASSET" | "MUTUAL" | "STOCK" | "RECEIVABLE" => Self::Asset,
            "ROOT" => Self::Root,
            _ => Self::Expense,
        }
    }

    /// Map a QIF `!Account` type line (`TBank`, `TCCard`, ...).
    #[must_use]
    pub fn from_qif(value: &str) -> Self {
        match value.trim() {
            "Bank" | "Cash" => Self::Bank,
            "CCard" | "Oth L" => Self::Liability,
            "Invst" | "Oth A" => Self::Asset,
            _ => Self::Expense,
        }
    }

    /// The Beancount top-level namespace this type maps into.
    #[must_use]
    pub const fn beancount_prefix(self) -> &'static str {
        match self {
            Self::Bank | Self::Asset => "Assets",
            Self::Income => "Income",
            Self::Liability => "Liabilities",
            Self::Equity | Self::Root => "Equity",
            Self::Expense | Self::Category | Self::Class | Self::Error => "Expenses",
        }
    }

    /// Map a Beancount top-level namespace back to a ledger type.
    #[must_use]
    pub fn from_beancount_prefix(prefix: &str) -> Self {
        match prefix {
            "Assets" => Self::Asset,
            "Income" => Self::Income,
            "Liabilities" => Self::Liability,
            "Equity" => Self::Equity,
            _ => Self::Expense,
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_currency() -> String {
    "EUR".to_string()
}

/// A ledger account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Unique id within a book; colon-joined path for nested accounts
    pub account_id: String,
    /// Leaf name (without the ancestor path)
    pub name: String,
    /// Account kind
    pub account_type: AccountType,
    /// Free-form description
    #[serde(default)]
    pub description: String,
    /// Currency label; carried through conversions, never converted
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Id of the parent account, `None` for top-level accounts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_account_id: Option<String>,
}

impl Account {
    /// Create a top-level account whose id equals its name.
    #[must_use]
    pub fn new(account_id: impl Into<String>, account_type: AccountType) -> Self {
        let account_id = account_id.into();
        Self {
            name: account_id.clone(),
            account_id,
            account_type,
            description: String::new(),
            currency: default_currency(),
            parent_account_id: None,
        }
    }

    /// Set the leaf name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the currency label.
    #[must_use]
    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    /// Set the parent account id.
    #[must_use]
    pub fn with_parent(mut self, parent_account_id: impl Into<String>) -> Self {
        self.parent_account_id = Some(parent_account_id.into());
        self
    }
}
