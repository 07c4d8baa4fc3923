//! Banking ZV (Subsembly) bank export models.
//!
//! The export dialect comes in two shapes: a raw JSON array of transaction
//! records per bank account, and a YAML book bundling accounts and
//! transactions. Transaction field names follow the Subsembly JSON export
//! (`AcctId`, `BookgDt`, `CdtDbtInd`, ...). Category values are colon-joined
//! paths from which category accounts are synthesized.

use nomina_core::{dates, Stats};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use thiserror::Error;

/// Marker value of the `file_type` key in BZV book YAML files.
pub const BZV_BOOK_FILE_TYPE: &str = "NOMINA-BANKING-ZV-YAML";

/// Errors from loading BZV exports.
#[derive(Debug, Error)]
pub enum BzvError {
    /// File I/O failed
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// JSON parsing failed
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    /// YAML parsing failed
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    /// A transaction file contained no records
    #[error("no transactions in {0}")]
    Empty(String),
}

/// One booked bank transaction in Subsembly field naming.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[allow(clippy::struct_field_names)]
pub struct BzvTransaction {
    /// Record id
    #[serde(rename = "Id")]
    pub id: String,
    /// Owning bank account id (IBAN or internal id)
    #[serde(rename = "AcctId")]
    pub acct_id: String,
    /// Owner account currency
    #[serde(rename = "OwnrAcctCcy", default)]
    pub ownr_acct_ccy: String,
    /// Owner account IBAN
    #[serde(rename = "OwnrAcctIBAN", default, skip_serializing_if = "Option::is_none")]
    pub ownr_acct_iban: Option<String>,
    /// Owner account number
    #[serde(rename = "OwnrAcctNo", default)]
    pub ownr_acct_no: String,
    /// Owner account BIC
    #[serde(rename = "OwnrAcctBIC", default, skip_serializing_if = "Option::is_none")]
    pub ownr_acct_bic: Option<String>,
    /// Owner bank code
    #[serde(rename = "OwnrAcctBankCode", default)]
    pub ownr_acct_bank_code: String,
    /// Booking date, `YYYY-MM-DD`
    #[serde(rename = "BookgDt")]
    pub bookg_dt: String,
    /// Value date
    #[serde(rename = "ValDt", default, skip_serializing_if = "Option::is_none")]
    pub val_dt: Option<String>,
    /// Amount as a decimal string
    #[serde(rename = "Amt")]
    pub amt: String,
    /// Amount currency
    #[serde(rename = "AmtCcy")]
    pub amt_ccy: String,
    /// Credit/debit indicator, `CRDT` or `DBIT`
    #[serde(rename = "CdtDbtInd")]
    pub cdt_dbt_ind: String,
    /// Remittance information
    #[serde(rename = "RmtInf", default, skip_serializing_if = "Option::is_none")]
    pub rmt_inf: Option<String>,
    /// Booking text
    #[serde(rename = "BookgTxt", default, skip_serializing_if = "Option::is_none")]
    pub bookg_txt: Option<String>,
    /// Prima nota number
    #[serde(rename = "PrimaNotaNo", default, skip_serializing_if = "Option::is_none")]
    pub prima_nota_no: Option<String>,
    /// Bank reference
    #[serde(rename = "BankRef", default, skip_serializing_if = "Option::is_none")]
    pub bank_ref: Option<String>,
    /// Bank transaction code
    #[serde(rename = "BkTxCd", default, skip_serializing_if = "Option::is_none")]
    pub bk_tx_cd: Option<String>,
    /// Booking status
    #[serde(rename = "BookgSts", default)]
    pub bookg_sts: String,
    /// German transaction type code
    #[serde(rename = "GVC", default, skip_serializing_if = "Option::is_none")]
    pub gvc: Option<String>,
    /// User-assigned category, colon-joined path
    #[serde(rename = "Category", default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Whether the user marked the record read
    #[serde(rename = "ReadStatus", default)]
    pub read_status: bool,
    /// Flag marker
    #[serde(rename = "Flag", default)]
    pub flag: String,
}

/// A bank or category account in a BZV book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BzvAccount {
    /// Account id (bank account id or colon-joined category path)
    pub account_id: String,
    /// Display name
    pub name: String,
    /// Parent category path, `None` for bank accounts and top categories
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_account_id: Option<String>,
}

fn default_bzv_file_type() -> String {
    BZV_BOOK_FILE_TYPE.to_string()
}

/// A Banking ZV book: accounts plus the flat transaction list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BzvBook {
    /// Format marker for sniffing
    #[serde(default = "default_bzv_file_type")]
    pub file_type: String,
    /// Book name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Book owner
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Source URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Date the export covers data since
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<String>,
    /// Accounts by id
    #[serde(default)]
    pub accounts: BTreeMap<String, BzvAccount>,
    /// All transactions across accounts
    #[serde(default)]
    pub transactions: Vec<BzvTransaction>,
}

impl BzvBook {
    /// Create an empty book.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            file_type: default_bzv_file_type(),
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Load a book from its YAML form.
    pub fn load_yaml_file(path: &Path) -> Result<Self, BzvError> {
        let text = std::fs::read_to_string(path)?;
        let mut book: Self = serde_yaml::from_str(&text)?;
        book.create_category_accounts();
        Ok(book)
    }

    /// Serialize the book to YAML.
    pub fn to_yaml(&self) -> Result<String, BzvError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Load a raw JSON transaction array as a single-account book.
    ///
    /// The account id is taken from the first transaction, the account name
    /// from the file stem.
    pub fn load_json_file(path: &Path) -> Result<Self, BzvError> {
        let account_name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut book = Self::new(account_name.clone());
        book.add_account_from_json(&account_name, path)?;
        book.create_category_accounts();
        Ok(book)
    }

    /// Load one account's transactions from a JSON file into this book.
    pub fn add_account_from_json(
        &mut self,
        account_name: &str,
        path: &Path,
    ) -> Result<(), BzvError> {
        let text = std::fs::read_to_string(path)?;
        let transactions: Vec<BzvTransaction> = serde_json::from_str(&text)?;
        let Some(first) = transactions.first() else {
            return Err(BzvError::Empty(path.display().to_string()));
        };
        let account_id = first.acct_id.clone();
        self.accounts.insert(
            account_id.clone(),
            BzvAccount {
                account_id,
                name: account_name.to_string(),
                parent_account_id: None,
            },
        );
        self.transactions.extend(transactions);
        Ok(())
    }

    /// Synthesize category accounts for every colon-joined category path.
    pub fn create_category_accounts(&mut self) {
        let categories: Vec<String> = self
            .transactions
            .iter()
            .filter_map(|tx| tx.category.clone())
            .collect();
        for category in categories {
            self.add_category_account(&category);
        }
    }

    /// Ensure the given category path and all its ancestors exist.
    pub fn add_category_account(&mut self, category: &str) {
        let mut current = String::new();
        let mut parent: Option<String> = None;
        for part in category.split(':') {
            if !current.is_empty() {
                parent = Some(current.clone());
                current.push(':');
            }
            current.push_str(part);
            if !self.accounts.contains_key(&current) {
                self.accounts.insert(
                    current.clone(),
                    BzvAccount {
                        account_id: current.clone(),
                        name: part.to_string(),
                        parent_account_id: parent.clone(),
                    },
                );
            }
        }
    }

    /// Statistics: counts, booking date range, per-transaction currencies.
    #[must_use]
    pub fn get_stats(&self) -> Stats {
        let mut booking_dates: Vec<String> = self
            .transactions
            .iter()
            .filter_map(|tx| dates::parse_date(&tx.bookg_dt))
            .collect();
        booking_dates.sort();

        let mut currencies: BTreeMap<String, usize> = BTreeMap::new();
        let mut categories: BTreeSet<&str> = BTreeSet::new();
        for tx in &self.transactions {
            *currencies.entry(tx.amt_ccy.clone()).or_default() += 1;
            if let Some(category) = &tx.category {
                categories.insert(category);
            }
        }

        let mut stats = Stats::new(self.accounts.len(), self.transactions.len());
        stats.start_date = booking_dates.first().cloned();
        stats.end_date = booking_dates.last().cloned();
        stats.categories = Some(categories.len());
        stats.currencies = currencies;
        stats
    }
}
