//! GnuCash XML object model and codec.
//!
//! Mirrors the subset of the `gnc-v2` schema the conversions need: the book,
//! its accounts and transactions with explicit debit/credit splits. Amounts
//! are carried in GnuCash's rational `numerator/denominator` form with a
//! commodity scale of 100 (cents).

use nomina_core::{dates, Stats};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors from the GnuCash codec.
#[derive(Debug, Error)]
pub enum GncError {
    /// XML (de)serialization failed
    #[error("xml error: {0}")]
    Xml(String),
    /// File I/O failed
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<quick_xml::DeError> for GncError {
    fn from(err: quick_xml::DeError) -> Self {
        Self::Xml(err.to_string())
    }
}

impl From<quick_xml::SeError> for GncError {
    fn from(err: quick_xml::SeError) -> Self {
        Self::Xml(err.to_string())
    }
}

/// A guid-typed id element, e.g. `<act:id type="guid">abc</act:id>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GncId {
    /// The `type` attribute, `guid` throughout
    #[serde(rename = "@type")]
    pub type_value: String,
    /// The id value
    #[serde(rename = "$text", default)]
    pub value: String,
}

impl GncId {
    /// Create a guid id.
    #[must_use]
    pub fn guid(value: impl Into<String>) -> Self {
        Self {
            type_value: "guid".to_string(),
            value: value.into(),
        }
    }
}

/// A commodity reference (`cmdty:space` + `cmdty:id`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GncCommodity {
    /// Namespace, `CURRENCY` for currencies
    #[serde(rename = "cmdty:space")]
    pub space: String,
    /// Commodity id, e.g. `EUR`
    #[serde(rename = "cmdty:id")]
    pub id: String,
}

impl GncCommodity {
    /// Create a currency commodity.
    #[must_use]
    pub fn currency(id: impl Into<String>) -> Self {
        Self {
            space: "CURRENCY".to_string(),
            id: id.into(),
        }
    }
}

/// A commodity declaration in the book header (same shape plus a version).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GncCommodityDecl {
    /// Schema version attribute
    #[serde(rename = "@version")]
    pub version: String,
    /// Namespace
    #[serde(rename = "cmdty:space")]
    pub space: String,
    /// Commodity id
    #[serde(rename = "cmdty:id")]
    pub id: String,
}

/// A timestamped date element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TsDate {
    /// Timestamp text, `YYYY-MM-DD HH:MM:SS +ZZZZ`
    #[serde(rename = "ts:date")]
    pub date: String,
}

impl TsDate {
    /// Create a timestamp from a date, padding plain dates to midnight UTC.
    #[must_use]
    pub fn new(date: impl Into<String>) -> Self {
        let mut date = date.into();
        if date.len() == 10 {
            date.push_str(" 00:00:00 +0000");
        }
        Self { date }
    }
}

/// A `count-data` bookkeeping element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountData {
    /// What is being counted (`book`, `account`, `transaction`)
    #[serde(rename = "@cd:type")]
    pub type_value: String,
    /// The count
    #[serde(rename = "$text", default)]
    pub value: u64,
}

impl CountData {
    /// Create a count-data entry.
    #[must_use]
    pub fn new(type_value: impl Into<String>, value: u64) -> Self {
        Self {
            type_value: type_value.into(),
            value,
        }
    }
}

/// A slot value holding a gdate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotValue {
    /// Value type attribute (`gdate`)
    #[serde(rename = "@type")]
    pub type_value: String,
    /// The date value
    #[serde(rename = "gdate", default, skip_serializing_if = "Option::is_none")]
    pub gdate: Option<String>,
}

/// A key/value slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    /// Slot key
    #[serde(rename = "slot:key")]
    pub key: String,
    /// Slot value
    #[serde(rename = "slot:value")]
    pub value: SlotValue,
}

/// A transaction slot list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slots {
    /// The slots
    #[serde(rename = "slot", default)]
    pub slot: Vec<Slot>,
}

impl Slots {
    /// The conventional `date-posted` gdate slot.
    #[must_use]
    pub fn date_posted(isodate: &str) -> Self {
        Self {
            slot: vec![Slot {
                key: "date-posted".to_string(),
                value: SlotValue {
                    type_value: "gdate".to_string(),
                    gdate: Some(isodate.to_string()),
                },
            }],
        }
    }
}

/// A GnuCash account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GncAccount {
    /// Schema version attribute
    #[serde(rename = "@version")]
    pub version: String,
    /// Account name
    #[serde(rename = "act:name")]
    pub name: String,
    /// Account guid
    #[serde(rename = "act:id")]
    pub id: GncId,
    /// GnuCash account type (`BANK`, `EXPENSE`, ...)
    #[serde(rename = "act:type")]
    pub account_type: String,
    /// Account commodity
    #[serde(rename = "act:commodity", default, skip_serializing_if = "Option::is_none")]
    pub commodity: Option<GncCommodity>,
    /// Smallest commodity unit, 100 for cents
    #[serde(
        rename = "act:commodity-scu",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub commodity_scu: Option<u32>,
    /// Description
    #[serde(
        rename = "act:description",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<String>,
    /// Parent account guid
    #[serde(rename = "act:parent", default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<GncId>,
}

/// One split of a GnuCash transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GncSplit {
    /// Split guid
    #[serde(rename = "split:id")]
    pub id: GncId,
    /// Memo
    #[serde(rename = "split:memo", default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    /// Reconciled state, `y`/`n`
    #[serde(rename = "split:reconciled-state")]
    pub reconciled_state: String,
    /// Value in rational form, e.g. `-780/100`
    #[serde(rename = "split:value")]
    pub value: String,
    /// Quantity in rational form
    #[serde(rename = "split:quantity")]
    pub quantity: String,
    /// Guid of the affected account
    #[serde(rename = "split:account")]
    pub account: GncId,
}

/// The split list of a transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GncSplits {
    /// The splits
    #[serde(rename = "trn:split", default)]
    pub split: Vec<GncSplit>,
}

/// A GnuCash transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GncTransaction {
    /// Schema version attribute
    #[serde(rename = "@version")]
    pub version: String,
    /// Transaction guid
    #[serde(rename = "trn:id")]
    pub id: GncId,
    /// Transaction currency
    #[serde(rename = "trn:currency")]
    pub currency: GncCommodity,
    /// Posting date
    #[serde(rename = "trn:date-posted")]
    pub date_posted: TsDate,
    /// Entry date
    #[serde(rename = "trn:date-entered")]
    pub date_entered: TsDate,
    /// Description
    #[serde(
        rename = "trn:description",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<String>,
    /// Slots (date-posted gdate)
    #[serde(rename = "trn:slots", default, skip_serializing_if = "Option::is_none")]
    pub slots: Option<Slots>,
    /// The splits
    #[serde(rename = "trn:splits", default)]
    pub splits: GncSplits,
}

/// The GnuCash book.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GncBook {
    /// Schema version attribute
    #[serde(rename = "@version")]
    pub version: String,
    /// Book guid
    #[serde(rename = "book:id")]
    pub id: GncId,
    /// Element counts
    #[serde(rename = "gnc:count-data", default)]
    pub count_data: Vec<CountData>,
    /// Declared commodities
    #[serde(rename = "gnc:commodity", default)]
    pub commodities: Vec<GncCommodityDecl>,
    /// Accounts
    #[serde(rename = "gnc:account", default)]
    pub accounts: Vec<GncAccount>,
    /// Transactions
    #[serde(rename = "gnc:transaction", default)]
    pub transactions: Vec<GncTransaction>,
}

impl GncBook {
    /// Refresh the `count-data` entries from the actual element counts.
    pub fn update_count_data(&mut self) {
        self.count_data = vec![
            CountData::new("commodity", self.commodities.len() as u64),
            CountData::new("account", self.accounts.len() as u64),
            CountData::new("transaction", self.transactions.len() as u64),
        ];
    }
}

/// The `gnc-v2` document root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename = "gnc-v2")]
pub struct GncV2 {
    /// `gnc` namespace declaration
    #[serde(rename = "@xmlns:gnc", default = "ns_gnc")]
    pub xmlns_gnc: String,
    /// `act` namespace declaration
    #[serde(rename = "@xmlns:act", default = "ns_act")]
    pub xmlns_act: String,
    /// `book` namespace declaration
    #[serde(rename = "@xmlns:book", default = "ns_book")]
    pub xmlns_book: String,
    /// `cd` namespace declaration
    #[serde(rename = "@xmlns:cd", default = "ns_cd")]
    pub xmlns_cd: String,
    /// `cmdty` namespace declaration
    #[serde(rename = "@xmlns:cmdty", default = "ns_cmdty")]
    pub xmlns_cmdty: String,
    /// `slot` namespace declaration
    #[serde(rename = "@xmlns:slot", default = "ns_slot")]
    pub xmlns_slot: String,
    /// `split` namespace declaration
    #[serde(rename = "@xmlns:split", default = "ns_split")]
    pub xmlns_split: String,
    /// `trn` namespace declaration
    #[serde(rename = "@xmlns:trn", default = "ns_trn")]
    pub xmlns_trn: String,
    /// `ts` namespace declaration
    #[serde(rename = "@xmlns:ts", default = "ns_ts")]
    pub xmlns_ts: String,
    /// Book count
    #[serde(rename = "gnc:count-data")]
    pub count_data: CountData,
    /// The book
    #[serde(rename = "gnc:book")]
    pub book: GncBook,
}

fn ns_gnc() -> String {
    "http://www.gnucash.org/XML/gnc".to_string()
}
fn ns_act() -> String {
    "http://www.gnucash.org/XML/act".to_string()
}
fn ns_book() -> String {
    "http://www.gnucash.org/XML/book".to_string()
}
fn ns_cd() -> String {
    "http://www.gnucash.org/XML/cd".to_string()
}
fn ns_cmdty() -> String {
    "http://www.gnucash.org/XML/cmdty".to_string()
}
fn ns_slot() -> String {
    "http://www.gnucash.org/XML/slot".to_string()
}
fn ns_split() -> String {
    "http://www.gnucash.org/XML/split".to_string()
}
fn ns_trn() -> String {
    "http://www.gnucash.org/XML/trn".to_string()
}
fn ns_ts() -> String {
    "http://www.gnucash.org/XML/ts".to_string()
}

impl GncV2 {
    /// Wrap a book into a document root with the standard namespace set.
    #[must_use]
    pub fn new(book: GncBook) -> Self {
        Self {
            xmlns_gnc: ns_gnc(),
            xmlns_act: ns_act(),
            xmlns_book: ns_book(),
            xmlns_cd: ns_cd(),
            xmlns_cmdty: ns_cmdty(),
            xmlns_slot: ns_slot(),
            xmlns_split: ns_split(),
            xmlns_trn: ns_trn(),
            xmlns_ts: ns_ts(),
            count_data: CountData::new("book", 1),
            book,
        }
    }

    /// Statistics: counts, posting date range, per-account currencies.
    #[must_use]
    pub fn get_stats(&self) -> Stats {
        let mut stats = Stats::new(self.book.accounts.len(), self.book.transactions.len());

        let mut parsed: Vec<String> = self
            .book
            .transactions
            .iter()
            .filter_map(|tx| dates::parse_date(&tx.date_posted.date))
            .collect();
        parsed.sort();
        stats.start_date = parsed.first().cloned();
        stats.end_date = parsed.last().cloned();

        for account in &self.book.accounts {
            let currency = account
                .commodity
                .as_ref()
                .map_or("EUR", |commodity| commodity.id.as_str());
            *stats.currencies.entry(currency.to_string()).or_default() += 1;
        }
        stats
    }
}

/// Parse a rational amount string (`-780/100`) into a decimal.
#[must_use]
pub fn parse_rational(value: &str) -> Option<Decimal> {
    let (numerator, denominator) = value.split_once('/')?;
    let numerator: i64 = numerator.trim().parse().ok()?;
    let denominator: i64 = denominator.trim().parse().ok()?;
    if denominator == 0 {
        return None;
    }
    Some(Decimal::from(numerator) / Decimal::from(denominator))
}

/// Render a decimal amount as a cents rational (`-7.80` -> `-780/100`).
#[must_use]
pub fn to_cents_rational(amount: Decimal) -> String {
    let cents = (amount * Decimal::from(100)).round();
    format!("{cents}/100")
}

/// Parse a GnuCash XML document.
pub fn parse_str(xml: &str) -> Result<GncV2, GncError> {
    Ok(quick_xml::de::from_str(xml)?)
}

/// Parse a GnuCash XML file.
pub fn parse_file(path: &Path) -> Result<GncV2, GncError> {
    let text = std::fs::read_to_string(path)?;
    parse_str(&text)
}

/// Serialize a document to XML text, with declaration and indentation.
pub fn to_xml(gnc_v2: &GncV2) -> Result<String, GncError> {
    let mut body = String::new();
    let mut serializer = quick_xml::se::Serializer::new(&mut body);
    serializer.indent(' ', 2);
    gnc_v2.serialize(serializer)?;
    Ok(format!("<?xml version=\"1.0\" encoding=\"utf-8\" ?>\n{body}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample() -> GncV2 {
        let account = GncAccount {
            version: "2.0.0".to_string(),
            name: "Cash".to_string(),
            id: GncId::guid("acct-1"),
            account_type: "BANK".to_string(),
            commodity: Some(GncCommodity::currency("EUR")),
            commodity_scu: Some(100),
            description: Some("wallet".to_string()),
            parent: None,
        };
        let split = GncSplit {
            id: GncId::guid("split-1"),
            memo: Some("lunch".to_string()),
            reconciled_state: "n".to_string(),
            value: "-780/100".to_string(),
            quantity: "-780/100".to_string(),
            account: GncId::guid("acct-1"),
        };
        let tx = GncTransaction {
            version: "2.0.0".to_string(),
            id: GncId::guid("tx-1"),
            currency: GncCommodity::currency("EUR"),
            date_posted: TsDate::new("2014-01-02"),
            date_entered: TsDate::new("2014-01-02"),
            description: Some("Lunch".to_string()),
            slots: Some(Slots::date_posted("2014-01-02")),
            splits: GncSplits { split: vec![split] },
        };
        let mut book = GncBook {
            version: "2.0.0".to_string(),
            id: GncId::guid("book-1"),
            count_data: Vec::new(),
            commodities: vec![GncCommodityDecl {
                version: "2.0.0".to_string(),
                space: "CURRENCY".to_string(),
                id: "EUR".to_string(),
            }],
            accounts: vec![account],
            transactions: vec![tx],
        };
        book.update_count_data();
        GncV2::new(book)
    }

    #[test]
    fn test_rational_parsing() {
        assert_eq!(parse_rational("-780/100"), Some(dec!(-7.80)));
        assert_eq!(parse_rational("150000/100"), Some(dec!(1500)));
        assert_eq!(parse_rational("1/0"), None);
        assert_eq!(parse_rational("garbage"), None);
    }

    #[test]
    fn test_cents_rational_rendering() {
        assert_eq!(to_cents_rational(dec!(-7.80)), "-780/100");
        assert_eq!(to_cents_rational(dec!(1500)), "150000/100");
        assert_eq!(to_cents_rational(dec!(0.01)), "1/100");
        assert_eq!(to_cents_rational(dec!(-0.01)), "-1/100");
    }

    #[test]
    fn test_ts_date_padding() {
        assert_eq!(TsDate::new("2014-01-02").date, "2014-01-02 00:00:00 +0000");
        assert_eq!(
            TsDate::new("2014-01-02 12:00:00 +0000").date,
            "2014-01-02 12:00:00 +0000"
        );
    }

    #[test]
    fn test_xml_roundtrip() {
        let doc = sample();
        let xml = to_xml(&doc).unwrap();
        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains("<gnc-v2"));
        assert!(xml.contains("<act:name>Cash</act:name>"));
        assert!(xml.contains("<split:value>-780/100</split:value>"));

        let back = parse_str(&xml).unwrap();
        assert_eq!(back.book.accounts.len(), 1);
        assert_eq!(back.book.transactions.len(), 1);
        assert_eq!(back.book.accounts[0].name, "Cash");
        assert_eq!(
            back.book.transactions[0].splits.split[0].value,
            "-780/100"
        );
    }

    #[test]
    fn test_stats() {
        let stats = sample().get_stats();
        assert_eq!(stats.accounts, 1);
        assert_eq!(stats.transactions, 1);
        assert_eq!(stats.start_date.as_deref(), Some("2014-01-02"));
        assert_eq!(stats.currencies.get("EUR"), Some(&1));
    }

    #[test]
    fn test_count_data() {
        let doc = sample();
        assert_eq!(doc.count_data.type_value, "book");
        assert_eq!(doc.count_data.value, 1);
        let account_count = doc
            .book
            .count_data
            .iter()
            .find(|cd| cd.type_value == "account")
            .unwrap();
        assert_eq!(account_count.value, 1);
    }
}
