//! Beancount directive model, printer and subset reader.
//!
//! The conversions only need two directive kinds: `open` (one per account)
//! and transactions with complete postings. The printer emits the preamble
//! and directives the way the original exporter did; the reader understands
//! exactly that printed subset (options, open directives, transactions with
//! indented postings and metadata), which is what round-trips require. A
//! full Beancount grammar is an external collaborator, not part of this
//! crate.

use nomina_core::{dates, Stats};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors from loading Beancount text.
#[derive(Debug, Error)]
pub enum BeanError {
    /// File I/O failed
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// An account-open directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeanOpen {
    /// Opening date, `YYYY-MM-DD`
    pub date: String,
    /// Fully qualified, sanitized account name
    pub account: String,
    /// Declared currencies
    pub currencies: Vec<String>,
    /// Optional `description` metadata
    pub description: Option<String>,
}

/// One posting of a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeanPosting {
    /// Fully qualified account name
    pub account: String,
    /// Posting amount
    pub amount: Decimal,
    /// Posting currency
    pub currency: String,
}

/// A transaction directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeanTransaction {
    /// Transaction date, `YYYY-MM-DD`
    pub date: String,
    /// Flag, `*` for cleared
    pub flag: char,
    /// Optional payee (first quoted string when two are present)
    pub payee: Option<String>,
    /// Narration
    pub narration: String,
    /// Optional `memo` metadata
    pub memo: Option<String>,
    /// The postings
    pub postings: Vec<BeanPosting>,
}

/// A directive in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BeanDirective {
    /// Account open
    Open(BeanOpen),
    /// Transaction
    Transaction(BeanTransaction),
}

/// The file header the exporter writes before any directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preamble {
    /// First transaction date
    pub start_date: String,
    /// Last transaction date
    pub end_date: String,
    /// Ledger title
    pub title: String,
    /// Operating currency
    pub currency: String,
}

impl Preamble {
    /// Render the preamble header text.
    #[must_use]
    pub fn as_header(&self) -> String {
        format!(
            ";; -*- mode: org; mode: beancount; -*-\n\
             ;; Dates: {} - {}\n\
             \n\
             * Options\n\
             \n\
             option \"title\" \"{}\"\n\
             option \"operating_currency\" \"{}\"\n\
             \n",
            self.start_date, self.end_date, self.title, self.currency
        )
    }
}

/// Replace characters Beancount account names cannot carry.
///
/// Keeps alphanumerics, `:` and `-`; everything else becomes `-`.
#[must_use]
pub fn sanitize_account_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == ':' || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// An in-memory Beancount file: options plus directives in order.
#[derive(Debug, Clone, Default)]
pub struct Beancount {
    /// `option "key" "value"` pairs
    pub options: BTreeMap<String, String>,
    /// Directives in file order
    pub entries: Vec<BeanDirective>,
    /// Lines the reader could not interpret
    pub errors: Vec<String>,
}

impl Beancount {
    /// Create an empty file model.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a directive.
    pub fn add_entry(&mut self, entry: BeanDirective) {
        self.entries.push(entry);
    }

    /// Load from a file.
    pub fn load_file(&mut self, path: &Path) -> Result<(), BeanError> {
        let text = std::fs::read_to_string(path)?;
        self.load_str(&text);
        Ok(())
    }

    /// Load from text.
    ///
    /// Unknown lines are collected into `errors` and skipped; the reader
    /// never fails on content.
    pub fn load_str(&mut self, text: &str) {
        let mut pending: Option<BeanTransaction> = None;
        for raw_line in text.lines() {
            let line = raw_line.trim_end();
            if line.trim().is_empty() {
                continue;
            }
            let trimmed = line.trim_start();
            if trimmed.starts_with(';') || trimmed.starts_with('*') {
                continue;
            }

            if line.starts_with(char::is_whitespace) {
                // metadata or posting, belongs to the pending transaction
                // or to the open directive just read
                if let Some(tx) = pending.as_mut() {
                    Self::parse_indented(tx, trimmed, &mut self.errors);
                } else if let Some(description) = metadata_value(trimmed, "description") {
                    if let Some(BeanDirective::Open(open)) = self.entries.last_mut() {
                        open.description = Some(description);
                    }
                } else {
                    self.errors
                        .push(format!("indented line outside transaction: {trimmed}"));
                }
                continue;
            }

            // a new top-level line finalizes any pending transaction
            if let Some(tx) = pending.take() {
                self.entries.push(BeanDirective::Transaction(tx));
            }

            if let Some(rest) = trimmed.strip_prefix("option ") {
                let strings = quoted_strings(rest);
                if strings.len() == 2 {
                    self.options
                        .insert(strings[0].clone(), strings[1].clone());
                } else {
                    self.errors.push(format!("malformed option: {trimmed}"));
                }
                continue;
            }

            match Self::parse_directive(trimmed) {
                Some(ParsedLine::Open(open)) => self.entries.push(BeanDirective::Open(open)),
                Some(ParsedLine::Transaction(tx)) => pending = Some(tx),
                None => self.errors.push(format!("unparsed line: {trimmed}")),
            }
        }
        if let Some(tx) = pending.take() {
            self.entries.push(BeanDirective::Transaction(tx));
        }
    }

    fn parse_directive(line: &str) -> Option<ParsedLine> {
        let mut parts = line.splitn(2, ' ');
        let date = parts.next()?;
        dates::parse_date_with(date, &[nomina_core::dates::DatePattern::Date("%Y-%m-%d")])?;
        let rest = parts.next()?.trim_start();

        if let Some(open_rest) = rest.strip_prefix("open ") {
            let mut tokens = open_rest.split_whitespace();
            let account = tokens.next()?.to_string();
            let currencies: Vec<String> = tokens
                .flat_map(|t| t.split(','))
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect();
            return Some(ParsedLine::Open(BeanOpen {
                date: date.to_string(),
                account,
                currencies,
                description: None,
            }));
        }

        let flag = match rest.chars().next()? {
            c @ ('*' | '!') => c,
            _ => return None,
        };
        let strings = quoted_strings(&rest[1..]);
        let (payee, narration) = match strings.len() {
            0 => (None, String::new()),
            1 => (None, strings[0].clone()),
            _ => (Some(strings[0].clone()), strings[1].clone()),
        };
        Some(ParsedLine::Transaction(BeanTransaction {
            date: date.to_string(),
            flag,
            payee,
            narration,
            memo: None,
            postings: Vec::new(),
        }))
    }

    fn parse_indented(tx: &mut BeanTransaction, line: &str, errors: &mut Vec<String>) {
        // metadata: `key: "value"`
        if let Some((key, value)) = line.split_once(": ") {
            if !key.contains(char::is_whitespace) && value.trim_start().starts_with('"') {
                let strings = quoted_strings(value);
                if let Some(value) = strings.first() {
                    if key == "memo" {
                        tx.memo = Some(value.clone());
                    }
                    return;
                }
            }
        }
        // posting: `Account  amount currency`
        let mut tokens = line.split_whitespace();
        let Some(account) = tokens.next() else {
            return;
        };
        let Some(amount_token) = tokens.next() else {
            errors.push(format!("posting without amount: {line}"));
            return;
        };
        let Ok(amount) = Decimal::from_str(amount_token) else {
            errors.push(format!("unparseable posting amount: {line}"));
            return;
        };
        let currency = tokens.next().unwrap_or("EUR").to_string();
        tx.postings.push(BeanPosting {
            account: account.to_string(),
            amount,
            currency,
        });
    }

    /// Render options are not re-emitted; the preamble carries them.
    #[must_use]
    pub fn to_text(&self, preamble: Option<&Preamble>) -> String {
        let mut out = String::new();
        if let Some(preamble) = preamble {
            out.push_str(&preamble.as_header());
        }
        out.push_str("* Expenses\n\n");
        for entry in &self.entries {
            match entry {
                BeanDirective::Open(open) => {
                    let _ = write!(out, "{} open {}", open.date, open.account);
                    if !open.currencies.is_empty() {
                        let _ = write!(out, " {}", open.currencies.join(","));
                    }
                    out.push('\n');
                    if let Some(description) = &open.description {
                        let _ = writeln!(out, "  description: \"{description}\"");
                    }
                }
                BeanDirective::Transaction(tx) => {
                    out.push('\n');
                    let _ = write!(out, "{} {}", tx.date, tx.flag);
                    if let Some(payee) = &tx.payee {
                        let _ = write!(out, " \"{payee}\"");
                    }
                    let _ = writeln!(out, " \"{}\"", tx.narration);
                    if let Some(memo) = &tx.memo {
                        let _ = writeln!(out, "  memo: \"{memo}\"");
                    }
                    for posting in &tx.postings {
                        let _ = writeln!(
                            out,
                            "  {}  {} {}",
                            posting.account, posting.amount, posting.currency
                        );
                    }
                }
            }
        }
        out
    }

    /// Statistics: open count, transaction count, transaction date range.
    #[must_use]
    pub fn get_stats(&self) -> Stats {
        let mut accounts = 0;
        let mut transactions = 0;
        let mut dates_seen: Vec<&str> = Vec::new();
        let mut currencies: BTreeMap<String, usize> = BTreeMap::new();
        for entry in &self.entries {
            match entry {
                BeanDirective::Open(open) => {
                    accounts += 1;
                    for currency in &open.currencies {
                        *currencies.entry(currency.clone()).or_default() += 1;
                    }
                }
                BeanDirective::Transaction(tx) => {
                    transactions += 1;
                    dates_seen.push(&tx.date);
                }
            }
        }
        dates_seen.sort_unstable();
        let mut stats = Stats::new(accounts, transactions);
        stats.start_date = dates_seen.first().map(|d| (*d).to_string());
        stats.end_date = dates_seen.last().map(|d| (*d).to_string());
        stats.errors = Some(self.errors.len());
        stats.currencies = currencies;
        stats
    }
}

enum ParsedLine {
    Open(BeanOpen),
    Transaction(BeanTransaction),
}

/// Extract a `key: "value"` metadata value for the given key.
fn metadata_value(line: &str, key: &str) -> Option<String> {
    let rest = line.strip_prefix(key)?.strip_prefix(':')?;
    quoted_strings(rest).into_iter().next()
}

/// Extract the contents of all double-quoted strings in a line.
fn quoted_strings(line: &str) -> Vec<String> {
    let mut strings = Vec::new();
    let mut current: Option<String> = None;
    for c in line.chars() {
        match (&mut current, c) {
            (None, '"') => current = Some(String::new()),
            (Some(s), '"') => {
                strings.push(std::mem::take(s));
                current = None;
            }
            (Some(s), c) => s.push(c),
            (None, _) => {}
        }
    }
    strings
}
