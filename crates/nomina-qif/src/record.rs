//! Typed QIF records and field normalization.
//!
//! While a record's lines are being consumed, fields accumulate in a draft
//! struct per record type; the draft is validated and converted into the
//! typed record only at the `^`/next-header finalization boundary. Every
//! record carries its source line range and a per-field error map for
//! diagnostics.

use crate::split::SplitCategory;
use nomina_core::AccountType;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::str::FromStr;
use thiserror::Error;

/// An amount string that could not be normalized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unable to parse amount: {0}")]
pub struct AmountParseError(pub String);

/// Parse a QIF amount string into a decimal.
///
/// Currency symbols and whitespace are stripped; only digits, `,`, `.` and
/// `-` survive. A comma without a dot is a decimal comma; when both appear,
/// the comma is a thousands separator.
pub fn parse_amount(raw: &str) -> Result<Decimal, AmountParseError> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, ',' | '.' | '-'))
        .collect();
    let normalized = if cleaned.contains(',') && !cleaned.contains('.') {
        cleaned.replace(',', ".")
    } else if cleaned.contains(',') {
        cleaned.replace(',', "")
    } else {
        cleaned
    };
    Decimal::from_str(&normalized).map_err(|_| AmountParseError(raw.to_string()))
}

/// A line the parser could not interpret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    /// First line of the enclosing record
    pub start_line: usize,
    /// Line the error occurred on
    pub end_line: usize,
    /// The raw line text
    pub line: String,
}

/// A QIF account declaration, with the full ancestor path as its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QifAccount {
    /// Colon-joined path id
    pub account_id: String,
    /// Leaf name
    pub name: String,
    /// Account description
    pub description: String,
    /// Resolved account type
    pub account_type: AccountType,
    /// Currency in effect when the account was declared
    pub currency: String,
    /// Parent path id, `None` for top-level accounts
    pub parent_account_id: Option<String>,
    /// First source line of the declaration
    pub start_line: usize,
    /// Last source line of the declaration
    pub end_line: usize,
}

/// A QIF class tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QifClass {
    /// Class name
    pub name: String,
    /// Description
    pub description: String,
    /// First source line
    pub start_line: usize,
    /// Last source line
    pub end_line: usize,
}

/// A QIF category tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QifCategory {
    /// Category name
    pub name: String,
    /// Description
    pub description: String,
    /// First source line
    pub start_line: usize,
    /// Last source line
    pub end_line: usize,
}

/// A normalized QIF transaction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QifTransaction {
    /// Canonical date if the raw value parsed, the raw value otherwise
    pub isodate: Option<String>,
    /// Raw amount string as seen in the file
    pub amount: Option<String>,
    /// Normalized amount, `None` when absent or unparseable
    pub amount_value: Option<Decimal>,
    /// The `N` field ("Vorgang" in German dialects), prepended to the memo
    pub name: Option<String>,
    /// Payee
    pub payee: Option<String>,
    /// Memo, with the name prepended when present
    pub memo: Option<String>,
    /// Category / transfer target of a non-split transaction
    pub category: Option<String>,
    /// Cheque or reference number
    pub number: Option<String>,
    /// Cleared flag value
    pub cleared: Option<String>,
    /// Address lines
    pub address: Option<String>,
    /// Split targets, one per `S` line
    pub split_categories: Vec<SplitCategory>,
    /// Split memos, one per `E` line
    pub split_memos: Vec<String>,
    /// Raw split amounts, one per `$` line
    pub split_amounts: Vec<String>,
    /// Normalized split amounts, index-aligned with `split_amounts`
    pub split_amount_values: Vec<Option<Decimal>>,
    /// Id of the account the enclosing `!Account` context declared
    pub account_id: Option<String>,
    /// Field codes recognized but not modeled
    pub extra: BTreeMap<char, String>,
    /// Normalization failures keyed by field name
    pub errors: BTreeMap<String, String>,
    /// First source line
    pub start_line: usize,
    /// Last source line
    pub end_line: usize,
}

impl QifTransaction {
    /// Whether the transaction declared any splits.
    #[must_use]
    pub fn has_splits(&self) -> bool {
        !self.split_categories.is_empty() && !self.split_amount_values.is_empty()
    }

    /// Sum of the successfully parsed split amounts.
    #[must_use]
    pub fn total_split_amount(&self) -> Decimal {
        self.split_amount_values.iter().flatten().sum()
    }

    /// Names of the fields that are present, for the field histogram.
    #[must_use]
    pub fn present_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        let scalars: [(&'static str, bool); 9] = [
            ("isodate", self.isodate.is_some()),
            ("amount", self.amount.is_some()),
            ("name", self.name.is_some()),
            ("payee", self.payee.is_some()),
            ("memo", self.memo.is_some()),
            ("category", self.category.is_some()),
            ("number", self.number.is_some()),
            ("cleared", self.cleared.is_some()),
            ("address", self.address.is_some()),
        ];
        for (field, present) in scalars {
            if present {
                fields.push(field);
            }
        }
        if !self.split_categories.is_empty() {
            fields.push("split_category");
        }
        if !self.split_memos.is_empty() {
            fields.push("split_memo");
        }
        if !self.split_amounts.is_empty() {
            fields.push("split_amount");
        }
        fields
    }
}

/// Field codes that occur in the wild but carry no modeled meaning.
///
/// Their values are retained in the transaction's `extra` map instead of
/// producing parse errors.
pub(crate) const PASSTHROUGH_CODES: &[char] = &[
    '~', '&', '%', '@', 'B', 'F', 'G', 'I', 'K', 'O', 'R', 'Q', 'V', 'Y',
];

/// Accumulator for an `!Account` record.
#[derive(Debug, Clone, Default)]
pub(crate) struct AccountDraft {
    pub name: Option<String>,
    pub type_str: Option<String>,
    pub description: Option<String>,
    pub extra: BTreeMap<char, String>,
}

impl AccountDraft {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.type_str.is_none()
            && self.description.is_none()
            && self.extra.is_empty()
    }

    /// Consume a field line; `false` means the code was not understood.
    pub fn apply(&mut self, code: char, value: &str) -> bool {
        match code {
            'N' => self.name = Some(value.to_string()),
            'T' => self.type_str = Some(value.to_string()),
            'D' => self.description = Some(value.to_string()),
            c if PASSTHROUGH_CODES.contains(&c) || c == 'L' => {
                self.extra.insert(c, value.to_string());
            }
            _ => return false,
        }
        true
    }
}

/// Accumulator for a `!Type:Class` or `!Type:Cat` record.
#[derive(Debug, Clone, Default)]
pub(crate) struct TagDraft {
    pub name: Option<String>,
    pub description: Option<String>,
    pub extra: BTreeMap<char, String>,
}

impl TagDraft {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.extra.is_empty()
    }

    pub fn apply(&mut self, code: char, value: &str) -> bool {
        match code {
            'N' => self.name = Some(value.to_string()),
            'D' => self.description = Some(value.to_string()),
            c if PASSTHROUGH_CODES.contains(&c) || matches!(c, 'T' | 'E' | 'S') => {
                self.extra.insert(c, value.to_string());
            }
            _ => return false,
        }
        true
    }
}

/// Accumulator for a transaction record.
#[derive(Debug, Clone, Default)]
pub(crate) struct TransactionDraft {
    pub isodate: Option<String>,
    pub amount: Option<String>,
    pub name: Option<String>,
    pub payee: Option<String>,
    pub memo: Option<String>,
    pub category: Option<String>,
    pub number: Option<String>,
    pub cleared: Option<String>,
    pub address: Option<String>,
    pub split_categories: Vec<SplitCategory>,
    pub split_memos: Vec<String>,
    pub split_amounts: Vec<String>,
    pub extra: BTreeMap<char, String>,
}

impl TransactionDraft {
    pub fn is_empty(&self) -> bool {
        self.isodate.is_none()
            && self.amount.is_none()
            && self.name.is_none()
            && self.payee.is_none()
            && self.memo.is_none()
            && self.category.is_none()
            && self.number.is_none()
            && self.cleared.is_none()
            && self.address.is_none()
            && self.split_categories.is_empty()
            && self.split_memos.is_empty()
            && self.split_amounts.is_empty()
            && self.extra.is_empty()
    }

    pub fn apply(&mut self, code: char, value: &str) -> bool {
        match code {
            'D' => self.isodate = Some(value.to_string()),
            // `U` carries the amount in some dialects; `T` wins when both appear
            'T' => self.amount = Some(value.to_string()),
            'U' => {
                if self.amount.is_none() {
                    self.amount = Some(value.to_string());
                }
            }
            'M' => self.memo = Some(value.to_string()),
            'P' => self.payee = Some(value.to_string()),
            'L' => self.category = Some(value.to_string()),
            'N' => self.name = Some(value.to_string()),
            'A' => self.address = Some(value.to_string()),
            'C' => self.cleared = Some(value.to_string()),
            'S' => self.split_categories.push(SplitCategory::parse(value)),
            'E' => self.split_memos.push(value.to_string()),
            '$' => self.split_amounts.push(value.to_string()),
            c if PASSTHROUGH_CODES.contains(&c) => {
                self.extra.insert(c, value.to_string());
            }
            _ => return false,
        }
        true
    }

    /// Normalize the draft into a typed transaction.
    ///
    /// Date and amount parse failures are recorded under field keys and do
    /// not abort the conversion; the raw values are retained.
    pub fn normalize(
        self,
        account_id: Option<String>,
        start_line: usize,
        end_line: usize,
    ) -> QifTransaction {
        let mut tx = QifTransaction {
            amount: self.amount,
            name: self.name,
            payee: self.payee,
            memo: self.memo,
            category: self.category,
            number: self.number,
            cleared: self.cleared,
            address: self.address,
            split_categories: self.split_categories,
            split_memos: self.split_memos,
            split_amounts: self.split_amounts,
            account_id,
            extra: self.extra,
            start_line,
            end_line,
            ..QifTransaction::default()
        };

        if let Some(raw_date) = self.isodate {
            match nomina_core::dates::parse_date(&raw_date) {
                Some(iso) => tx.isodate = Some(iso),
                None => {
                    tx.errors.insert(
                        "date".to_string(),
                        format!("unable to parse date: {raw_date}"),
                    );
                    tx.isodate = Some(raw_date);
                }
            }
        }

        if let Some(raw_amount) = &tx.amount {
            match parse_amount(raw_amount) {
                Ok(value) => tx.amount_value = Some(value),
                Err(err) => {
                    tx.errors.insert("amount".to_string(), err.to_string());
                }
            }
        }

        if let Some(name) = &tx.name {
            tx.memo = Some(match &tx.memo {
                Some(memo) => format!("{name}:{memo}"),
                None => name.clone(),
            });
        }

        for (i, raw) in tx.split_amounts.iter().enumerate() {
            match parse_amount(raw) {
                Ok(value) => tx.split_amount_values.push(Some(value)),
                Err(err) => {
                    tx.errors.insert(format!("split{i}"), err.to_string());
                    tx.split_amount_values.push(None);
                }
            }
        }

        tx
    }
}
