//! The QIF line state machine.
//!
//! States: outside any record (`NoRecord`), inside an `!Account`
//! declaration, inside a `!Type:Class`/`!Type:Cat` tag record, or inside a
//! transaction record (any other `!Type:`). A `!Type:`/`!Account` header
//! flushes the pending record and switches context; `^` finalizes the
//! pending record; anything left at end of input is flushed as well.

use crate::record::{
    AccountDraft, ErrorRecord, QifAccount, QifCategory, QifClass, QifTransaction, TagDraft,
    TransactionDraft,
};
use nomina_core::{dates, AccountType, NaiveDate, Stats};
use std::collections::BTreeMap;
use std::path::Path;

/// What kind of record is currently being accumulated.
#[derive(Debug, Clone)]
enum State {
    NoRecord,
    InAccount(AccountDraft),
    InClass(TagDraft),
    InCategory(TagDraft),
    /// Transaction context; the string is the `!Type:` name (`Bank`, `Cash`, ...)
    InTransaction(String, TransactionDraft),
}

impl State {
    fn is_empty(&self) -> bool {
        match self {
            Self::NoRecord => true,
            Self::InAccount(draft) => draft.is_empty(),
            Self::InClass(draft) | Self::InCategory(draft) => draft.is_empty(),
            Self::InTransaction(_, draft) => draft.is_empty(),
        }
    }
}

/// A resilient QIF parser.
///
/// Accumulates accounts, classes, categories and transactions; parse
/// problems are collected instead of aborting. All maps are keyed for
/// deterministic iteration: accounts by full colon path, transactions by
/// `account:isodate:start_line`.
#[derive(Debug)]
pub struct QifParser {
    /// Name of the parsed source, usually the file stem
    pub name: Option<String>,
    /// Currency in effect; sniffed from `€`/`$` occurrences, default EUR
    pub currency: String,
    /// Type given to accounts that declare none
    pub default_account_type: AccountType,
    /// `!Option:`/`!Clear:` flags seen in the file
    pub options: BTreeMap<String, bool>,
    /// Classes by name
    pub classes: BTreeMap<String, QifClass>,
    /// Categories by name
    pub categories: BTreeMap<String, QifCategory>,
    /// Accounts by full colon path
    pub accounts: BTreeMap<String, QifAccount>,
    /// Transactions by synthesized id
    pub transactions: BTreeMap<String, QifTransaction>,
    /// Lines the parser could not interpret
    pub errors: Vec<ErrorRecord>,
    current_account: Option<String>,
}

impl Default for QifParser {
    fn default() -> Self {
        Self::new()
    }
}

impl QifParser {
    /// Create a parser with EUR currency and EXPENSE default account type.
    #[must_use]
    pub fn new() -> Self {
        Self {
            name: None,
            currency: "EUR".to_string(),
            default_account_type: AccountType::Expense,
            options: BTreeMap::new(),
            classes: BTreeMap::new(),
            categories: BTreeMap::new(),
            accounts: BTreeMap::new(),
            transactions: BTreeMap::new(),
            errors: Vec::new(),
            current_account: None,
        }
    }

    /// Parse a QIF file.
    ///
    /// The bytes are decoded as UTF-8 with a Latin-1 fallback (legacy
    /// Quicken exports are typically ISO-8859-1). The parser name defaults
    /// to the file stem.
    pub fn parse_file(&mut self, path: &Path) -> std::io::Result<()> {
        let bytes = std::fs::read(path)?;
        let content = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(err) => err.into_bytes().iter().map(|&b| char::from(b)).collect(),
        };
        if self.name.is_none() {
            self.name = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned());
        }
        self.parse_str(&content);
        Ok(())
    }

    /// Parse QIF content from a string.
    pub fn parse_str(&mut self, content: &str) {
        let mut state = State::NoRecord;
        let mut start_line = 1;
        let mut line_count = 0;

        for (line_num, raw_line) in content.lines().enumerate().map(|(i, l)| (i + 1, l)) {
            line_count = line_num;
            let line = raw_line.trim();
            if line.is_empty() {
                continue;
            }

            // currency sniffing; the line is still processed below
            if line.starts_with('$') {
                self.currency = "USD".to_string();
            } else if line.starts_with('€') {
                self.currency = "EUR".to_string();
            }

            if let Some(option) = line.strip_prefix("!Option:") {
                self.options.insert(option.to_string(), true);
            } else if let Some(option) = line.strip_prefix("!Clear:") {
                self.options.insert(option.to_string(), false);
            } else if line.starts_with("!Type:") || line.starts_with("!Account") {
                if !state.is_empty() {
                    self.flush(state, start_line, line_num - 1);
                }
                state = if line.starts_with("!Account") {
                    State::InAccount(AccountDraft::default())
                } else {
                    match &line[6..] {
                        "Class" => State::InClass(TagDraft::default()),
                        "Cat" => State::InCategory(TagDraft::default()),
                        type_name => {
                            State::InTransaction(type_name.to_string(), TransactionDraft::default())
                        }
                    }
                };
                start_line = line_num + 1;
            } else if line == "^" {
                if !state.is_empty() {
                    state = self.flush(state, start_line, line_num);
                }
                start_line = line_num + 1;
            } else {
                let code = line.chars().next().unwrap_or_default();
                let value = line[code.len_utf8()..].trim();
                let understood = match &mut state {
                    State::NoRecord => false,
                    State::InAccount(draft) => draft.apply(code, value),
                    State::InClass(draft) | State::InCategory(draft) => draft.apply(code, value),
                    State::InTransaction(_, draft) => draft.apply(code, value),
                };
                if !understood {
                    self.errors.push(ErrorRecord {
                        start_line,
                        end_line: line_num,
                        line: line.to_string(),
                    });
                }
            }
        }

        if !state.is_empty() {
            self.flush(state, start_line, line_count);
        }
    }

    /// Finalize the pending record; returns the fresh state for the same
    /// record context (a `^` inside a `!Type:` block starts another record
    /// of the same type).
    fn flush(&mut self, state: State, start_line: usize, end_line: usize) -> State {
        match state {
            State::NoRecord => State::NoRecord,
            State::InAccount(draft) => {
                self.finalize_account(&draft, start_line, end_line);
                State::InAccount(AccountDraft::default())
            }
            State::InClass(draft) => {
                let class = QifClass {
                    name: draft.name.unwrap_or_default(),
                    description: draft.description.unwrap_or_default(),
                    start_line,
                    end_line,
                };
                self.classes.insert(class.name.clone(), class);
                State::InClass(TagDraft::default())
            }
            State::InCategory(draft) => {
                let category = QifCategory {
                    name: draft.name.unwrap_or_default(),
                    description: draft.description.unwrap_or_default(),
                    start_line,
                    end_line,
                };
                self.categories.insert(category.name.clone(), category);
                State::InCategory(TagDraft::default())
            }
            State::InTransaction(type_name, draft) => {
                let tx = draft.normalize(self.current_account.clone(), start_line, end_line);
                let tx_id = match &tx.account_id {
                    Some(account) => format!(
                        "{account}:{}:{start_line}",
                        tx.isodate.as_deref().unwrap_or("?")
                    ),
                    None => format!("{}:{start_line}", tx.isodate.as_deref().unwrap_or("?")),
                };
                self.transactions.insert(tx_id, tx);
                State::InTransaction(type_name, TransactionDraft::default())
            }
        }
    }

    /// Register an account declaration, synthesizing the full ancestor
    /// chain of a colon-joined name.
    ///
    /// Missing ancestors inherit the declared account's type; declaring the
    /// same path twice refreshes the leaf and creates no duplicates. The
    /// leaf becomes the `current_account` context for subsequent
    /// transaction records.
    fn finalize_account(&mut self, draft: &AccountDraft, start_line: usize, end_line: usize) {
        let full_name = draft.name.clone().unwrap_or_default();
        let account_type = draft
            .type_str
            .as_deref()
            .map_or(self.default_account_type, AccountType::from_qif);

        let mut parent: Option<String> = None;
        let segments: Vec<&str> = full_name.split(':').collect();
        for (i, segment) in segments.iter().enumerate() {
            let account_id = match &parent {
                Some(p) => format!("{p}:{segment}"),
                None => (*segment).to_string(),
            };
            let is_leaf = i == segments.len() - 1;
            if is_leaf || !self.accounts.contains_key(&account_id) {
                self.accounts.insert(
                    account_id.clone(),
                    QifAccount {
                        account_id: account_id.clone(),
                        name: (*segment).to_string(),
                        description: if is_leaf {
                            draft.description.clone().unwrap_or_default()
                        } else {
                            String::new()
                        },
                        account_type,
                        currency: self.currency.clone(),
                        parent_account_id: parent.clone(),
                        start_line,
                        end_line,
                    },
                );
            }
            parent = Some(account_id);
        }
        self.current_account = parent;
    }

    /// Statistics snapshot including field and error histograms.
    #[must_use]
    pub fn stats(&self) -> Stats {
        let mut parsed_dates: Vec<NaiveDate> = self
            .transactions
            .values()
            .filter_map(|tx| tx.isodate.as_deref())
            .filter_map(|iso| NaiveDate::parse_from_str(iso, "%Y-%m-%d").ok())
            .collect();
        parsed_dates.sort_unstable();

        let mut stats = Stats::new(self.accounts.len(), self.transactions.len());
        stats.start_date = parsed_dates.first().map(|d| dates::iso_date(*d));
        stats.end_date = parsed_dates.last().map(|d| dates::iso_date(*d));
        stats.classes = Some(self.classes.len());
        stats.categories = Some(self.categories.len());
        stats.errors = Some(self.errors.len());

        let mut field_histogram: BTreeMap<String, usize> = BTreeMap::new();
        let mut error_histogram: BTreeMap<String, usize> = BTreeMap::new();
        for tx in self.transactions.values() {
            for field in tx.present_fields() {
                *field_histogram.entry(field.to_string()).or_default() += 1;
            }
            for error_key in tx.errors.keys() {
                *error_histogram.entry(error_key.clone()).or_default() += 1;
            }
        }
        if let Ok(value) = serde_yaml::to_value(&field_histogram) {
            stats.other.insert("field_histogram".to_string(), value);
        }
        if let Ok(value) = serde_yaml::to_value(&error_histogram) {
            stats.other.insert("error_histogram".to_string(), value);
        }
        if let Ok(value) = serde_yaml::to_value(&self.options) {
            stats.other.insert("options".to_string(), value);
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    /// The expenses example from hjacobs/gnucash-qif-import.
    const EXPENSES_QIF: &str = "!Account
NExpenses:Dining
^
!Type:Cash

!Account
NCash in Wallet
^
!Type:Cash
D2014/1/2
MLunch at Marcy's
SExpenses:Dining
$-7.80
^


!Account
NCash in Wallet
^
!Type:Cash
D2014/1/2
MExpensive PC
SExpenses:Computer
ESome note
$-1234.56
^


!Account
NExpenses:Computer
^
!Type:Cash";

    #[test]
    fn test_expenses_example() {
        let mut parser = QifParser::new();
        parser.parse_str(EXPENSES_QIF);

        assert_eq!(parser.transactions.len(), 2);
        let account_ids: Vec<&String> = parser.accounts.keys().collect();
        assert_eq!(
            account_ids,
            vec![
                "Cash in Wallet",
                "Expenses",
                "Expenses:Computer",
                "Expenses:Dining"
            ]
        );

        let stats = parser.stats();
        assert_eq!(stats.transactions, 2);
        assert_eq!(stats.start_date.as_deref(), Some("2014-01-02"));
        assert_eq!(stats.end_date.as_deref(), Some("2014-01-02"));
        assert_eq!(stats.errors, Some(0));
    }

    #[test]
    fn test_expenses_example_split_details() {
        let mut parser = QifParser::new();
        parser.parse_str(EXPENSES_QIF);

        let lunch = parser
            .transactions
            .values()
            .find(|tx| tx.memo.as_deref() == Some("Lunch at Marcy's"))
            .unwrap();
        assert_eq!(lunch.account_id.as_deref(), Some("Cash in Wallet"));
        assert_eq!(lunch.split_categories.len(), 1);
        assert_eq!(
            lunch.split_categories[0].category.as_deref(),
            Some("Expenses:Dining")
        );
        assert_eq!(lunch.split_amount_values, vec![Some(dec!(-7.80))]);
        assert_eq!(lunch.total_split_amount(), dec!(-7.80));

        let pc = parser
            .transactions
            .values()
            .find(|tx| tx.memo.as_deref() == Some("Expensive PC"))
            .unwrap();
        assert_eq!(pc.split_memos, vec!["Some note".to_string()]);
    }

    #[test]
    fn test_account_hierarchy_synthesis() {
        let mut parser = QifParser::new();
        parser.parse_str("!Account\nNExpenses:Food:Groceries\n^\n");

        assert_eq!(parser.accounts.len(), 3);
        assert!(parser.accounts["Expenses"].parent_account_id.is_none());
        assert_eq!(
            parser.accounts["Expenses:Food"].parent_account_id.as_deref(),
            Some("Expenses")
        );
        assert_eq!(
            parser.accounts["Expenses:Food:Groceries"]
                .parent_account_id
                .as_deref(),
            Some("Expenses:Food")
        );
        assert_eq!(parser.accounts["Expenses:Food"].name, "Food");

        // declaring the same path twice creates no duplicates
        parser.parse_str("!Account\nNExpenses:Food:Groceries\n^\n");
        assert_eq!(parser.accounts.len(), 3);
    }

    #[test]
    fn test_account_type_from_declaration() {
        let mut parser = QifParser::new();
        parser.parse_str("!Account\nNGiro\nTBank\nDmain account\n^\n");
        let giro = &parser.accounts["Giro"];
        assert_eq!(giro.account_type, AccountType::Bank);
        assert_eq!(giro.description, "main account");
    }

    #[test]
    fn test_classes_and_categories() {
        let qif = "!Type:Class\nN_VATCode_N1_I\nDVAT 19%\n^\n!Type:Cat\nNGroceries\nDfood\n^\nNUtilities\n^\n";
        let mut parser = QifParser::new();
        parser.parse_str(qif);
        assert_eq!(parser.classes.len(), 1);
        assert_eq!(parser.classes["_VATCode_N1_I"].description, "VAT 19%");
        assert_eq!(parser.categories.len(), 2);
        assert!(parser.categories.contains_key("Utilities"));
    }

    #[test]
    fn test_unparseable_line_is_collected_not_fatal() {
        let qif = "!Type:Bank\nD2024-01-02\nT-5.00\n*bogus line\n^\n";
        let mut parser = QifParser::new();
        parser.parse_str(qif);
        assert_eq!(parser.errors.len(), 1);
        assert_eq!(parser.errors[0].line, "*bogus line");
        assert_eq!(parser.transactions.len(), 1);
    }

    #[test]
    fn test_options_and_clear() {
        let qif = "!Option:AutoSwitch\n!Clear:AutoSwitch\n";
        let mut parser = QifParser::new();
        parser.parse_str(qif);
        assert_eq!(parser.options.get("AutoSwitch"), Some(&false));
    }

    #[test]
    fn test_transaction_id_uniqueness_same_day() {
        let qif = "!Account\nNGiro\n^\n!Type:Bank\nD2024-01-02\nT-5.00\n^\nD2024-01-02\nT-6.00\n^\n";
        let mut parser = QifParser::new();
        parser.parse_str(qif);
        assert_eq!(parser.transactions.len(), 2);
        for id in parser.transactions.keys() {
            assert!(id.starts_with("Giro:2024-01-02:"));
        }
    }

    #[test]
    fn test_bad_date_recorded_parse_continues() {
        let qif = "!Type:Bank\nDnot-a-date\nT-5.00\n^\n";
        let mut parser = QifParser::new();
        parser.parse_str(qif);
        let tx = parser.transactions.values().next().unwrap();
        assert_eq!(tx.isodate.as_deref(), Some("not-a-date"));
        assert!(tx.errors.contains_key("date"));
        let stats = parser.stats();
        assert_eq!(stats.start_date, None);
    }

    #[test]
    fn test_currency_sniffing() {
        let mut parser = QifParser::new();
        parser.parse_str("!Type:Bank\nD2024-01-02\nT5\nS[Giro]\n$5.00\n^\n!Account\nNLater\n^\n");
        // the `$` split-amount line flips the sniffed currency to USD
        assert_eq!(parser.currency, "USD");
        assert_eq!(parser.accounts["Later"].currency, "USD");
    }

    #[test]
    fn test_trailing_record_without_caret_is_flushed() {
        let qif = "!Type:Bank\nD2024-01-02\nT-5.00";
        let mut parser = QifParser::new();
        parser.parse_str(qif);
        assert_eq!(parser.transactions.len(), 1);
    }

    #[test]
    fn test_parse_file_latin1_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("umlaut.qif");
        // 0xE4 is 'ä' in Latin-1 and invalid standalone UTF-8
        std::fs::write(&path, b"!Type:Bank\nD2024-01-02\nT-1.00\nMGeb\xe4ck\n^\n").unwrap();
        let mut parser = QifParser::new();
        parser.parse_file(&path).unwrap();
        let tx = parser.transactions.values().next().unwrap();
        assert_eq!(tx.memo.as_deref(), Some("Gebäck"));
        assert_eq!(parser.name.as_deref(), Some("umlaut"));
    }

    #[test]
    fn test_field_histogram() {
        let mut parser = QifParser::new();
        parser.parse_str(EXPENSES_QIF);
        let stats = parser.stats();
        let histogram = stats.other.get("field_histogram").unwrap();
        let memo_count = histogram.get("memo").and_then(serde_yaml::Value::as_u64);
        assert_eq!(memo_count, Some(2));
    }
}
