//! Microsoft Money ZIP table dumps.
//!
//! An external tool dumps a `.mny` database into a ZIP archive holding one
//! JSON-lines file per table plus a `nomina.yaml` manifest. The rows land in
//! a typed table store (table name -> rows); the conversions only ever
//! filter rows by table, so no graph structure is needed. Tables stream out
//! of the archive member by member; malformed JSON lines are logged and
//! skipped.

use nomina_core::{dates, ConversionLog, Stats};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use thiserror::Error;

/// Marker value of the manifest `file_type` key.
pub const MONEY_FILE_TYPE: &str = "NOMINA-MICROSOFT-MONEY-YAML";

/// The account table name.
pub const ACCOUNT_TABLE: &str = "ACCT";
/// The transaction table name.
pub const TRANSACTION_TABLE: &str = "TRN";

/// Errors from loading Money dumps.
#[derive(Debug, Error)]
pub enum MoneyError {
    /// File I/O failed
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Opening the archive failed
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    /// The manifest could not be parsed
    #[error("manifest error: {0}")]
    Manifest(#[from] serde_yaml::Error),
}

/// The `nomina.yaml` manifest written next to the table dumps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZipHeader {
    /// Format marker
    pub file_type: String,
    /// Manifest schema version
    pub version: String,
    /// Original `.mny` file name
    pub name: String,
    /// Modification date of the original file
    pub date: String,
    /// Size of the original file in bytes
    pub size: u64,
    /// SHA-256 of the original file
    pub sha256: String,
    /// Jet database version reported by the dump tool
    pub jetversion: String,
}

/// A typed table store: table name -> JSON rows.
#[derive(Debug, Clone, Default)]
pub struct TableStore {
    tables: BTreeMap<String, Vec<serde_json::Value>>,
}

impl TableStore {
    /// Parse JSON-lines content into the named table.
    ///
    /// One JSON object per line; undecodable lines are logged and skipped.
    pub fn add_json_lines(&mut self, table_name: &str, content: &str, log: &mut ConversionLog) {
        let rows = self.tables.entry(table_name.to_string()).or_default();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<serde_json::Value>(line) {
                Ok(row) => rows.push(row),
                Err(err) => {
                    log.warn(
                        "json",
                        format!("error decoding JSON row in table {table_name}: {err}"),
                    );
                }
            }
        }
    }

    /// Rows of a table, empty when the table is unknown.
    #[must_use]
    pub fn rows(&self, table_name: &str) -> &[serde_json::Value] {
        self.tables
            .get(table_name)
            .map_or(&[], |rows| rows.as_slice())
    }

    /// Declared table names.
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// Total number of rows across all tables.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.tables.values().map(Vec::len).sum()
    }
}

/// Typed view of an `ACCT` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoneyAccount {
    /// Account handle (primary key)
    pub hacct: String,
    /// Full account name
    pub name: String,
    /// Account type tag, where present
    pub account_type: Option<String>,
    /// Description
    pub description: String,
    /// Currency label
    pub currency: Option<String>,
}

/// Typed view of a `TRN` row.
#[derive(Debug, Clone, PartialEq)]
pub struct MoneyTransaction {
    /// Transaction handle (primary key)
    pub htrn: String,
    /// Handle of the owning account
    pub hacct: Option<String>,
    /// Normalized date, where parseable
    pub isodate: Option<String>,
    /// Amount
    pub amount: Option<rust_decimal::Decimal>,
}

fn value_to_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn field<'a>(row: &'a serde_json::Value, keys: &[&str]) -> Option<&'a serde_json::Value> {
    keys.iter().find_map(|key| row.get(key))
}

/// Microsoft Money content: manifest plus table store.
#[derive(Debug, Default)]
pub struct MsMoney {
    /// The manifest, when the dump carried one
    pub header: Option<ZipHeader>,
    /// All table rows
    pub tables: TableStore,
    /// Diagnostics collected while loading
    pub log: ConversionLog,
}

impl MsMoney {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a ZIP archive or a directory of table dumps.
    pub fn load(&mut self, path: &Path) -> Result<(), MoneyError> {
        if path.is_dir() {
            self.load_dir(path)
        } else {
            self.load_zip(path)
        }
    }

    fn handle_member(&mut self, file_name: &str, content: &str) -> Result<(), MoneyError> {
        if file_name == "nomina.yaml" {
            self.header = Some(serde_yaml::from_str(content)?);
        } else if let Some(table_name) = file_name.strip_suffix(".json") {
            self.tables.add_json_lines(table_name, content, &mut self.log);
        }
        Ok(())
    }

    fn load_zip(&mut self, path: &Path) -> Result<(), MoneyError> {
        let mut archive = zip::ZipArchive::new(File::open(path)?)?;
        for index in 0..archive.len() {
            let mut member = archive.by_index(index)?;
            let file_name = member.name().to_string();
            let mut content = String::new();
            member.read_to_string(&mut content)?;
            self.handle_member(&file_name, &content)?;
        }
        Ok(())
    }

    fn load_dir(&mut self, path: &Path) -> Result<(), MoneyError> {
        for entry in std::fs::read_dir(path)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy().into_owned();
            let mut content = String::new();
            BufReader::new(File::open(entry.path())?).read_to_string(&mut content)?;
            self.handle_member(&file_name, &content)?;
        }
        Ok(())
    }

    /// Typed views of the account table rows.
    #[must_use]
    pub fn accounts(&self) -> Vec<MoneyAccount> {
        self.tables
            .rows(ACCOUNT_TABLE)
            .iter()
            .filter_map(|row| {
                let hacct = field(row, &["hacct", "id"]).and_then(value_to_string)?;
                Some(MoneyAccount {
                    hacct,
                    name: field(row, &["szFull", "name"])
                        .and_then(value_to_string)
                        .unwrap_or_default(),
                    account_type: field(row, &["acct_type"]).and_then(value_to_string),
                    description: field(row, &["desc"])
                        .and_then(value_to_string)
                        .unwrap_or_default(),
                    currency: field(row, &["currency"]).and_then(value_to_string),
                })
            })
            .collect()
    }

    /// Typed views of the transaction table rows.
    #[must_use]
    pub fn transactions(&self) -> Vec<MoneyTransaction> {
        self.tables
            .rows(TRANSACTION_TABLE)
            .iter()
            .filter_map(|row| {
                let htrn = field(row, &["htrn", "id"]).and_then(value_to_string)?;
                let isodate = field(row, &["date", "dt"])
                    .and_then(value_to_string)
                    .and_then(|raw| {
                        // timestamps carry a time of day; the date part suffices
                        let date_part = raw.split_whitespace().next().unwrap_or(&raw).to_string();
                        dates::parse_date(&date_part).or_else(|| dates::parse_date(&raw))
                    });
                let amount = field(row, &["amount", "amt"]).and_then(|value| match value {
                    serde_json::Value::Number(n) => {
                        rust_decimal::Decimal::try_from(n.as_f64()?).ok()
                    }
                    serde_json::Value::String(s) => s.parse().ok(),
                    _ => None,
                });
                Some(MoneyTransaction {
                    htrn,
                    hacct: field(row, &["hacct"]).and_then(value_to_string),
                    isodate,
                    amount,
                })
            })
            .collect()
    }

    /// Statistics: account/transaction counts, date range, currencies.
    #[must_use]
    pub fn get_stats(&self) -> Stats {
        let accounts = self.accounts();
        let transactions = self.transactions();

        let mut transaction_dates: Vec<&str> = transactions
            .iter()
            .filter_map(|tx| tx.isodate.as_deref())
            .collect();
        transaction_dates.sort_unstable();

        let mut stats = Stats::new(accounts.len(), transactions.len());
        stats.start_date = transaction_dates.first().map(|d| (*d).to_string());
        stats.end_date = transaction_dates.last().map(|d| (*d).to_string());
        for account in &accounts {
            let currency = account.currency.clone().unwrap_or_else(|| "UNKNOWN".to_string());
            *stats.currencies.entry(currency).or_default() += 1;
        }
        stats
    }
}
