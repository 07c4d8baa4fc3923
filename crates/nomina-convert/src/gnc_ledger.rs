//! GnuCash XML <-> ledger book conversion.
//!
//! GnuCash carries amounts as cents rationals (`-780/100`) and identifies
//! everything by guid; the ledger side uses decimal amounts and path ids.
//! Importing keeps the guids as account ids; exporting mints fresh guids
//! and remembers the mapping while wiring parents and split accounts.

use crate::{FromLedgerConverter, GuidSource, ToLedgerConverter};
use anyhow::{Context, Result};
use nomina_core::{
    dates, Account, AccountType, Book, ConversionLog, Split, Stats, Transaction,
};
use nomina_formats::gnucash::{
    self, GncAccount, GncBook, GncCommodity, GncCommodityDecl, GncId, GncSplit, GncSplits,
    GncTransaction, GncV2, Slots, TsDate,
};
use nomina_formats::FormatAcronym;
use std::collections::BTreeMap;
use std::path::Path;

/// Convert a GnuCash XML book to a ledger book.
#[derive(Debug, Default)]
pub struct GnuCashToLedgerConverter {
    gnc_v2: Option<GncV2>,
    log: ConversionLog,
}

impl GnuCashToLedgerConverter {
    /// Create a converter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn create_ledger_account(gnc_account: &GncAccount) -> Account {
        let mut account = Account::new(
            gnc_account.id.value.clone(),
            AccountType::from_gnucash(&gnc_account.account_type),
        )
        .with_name(gnc_account.name.clone())
        .with_description(gnc_account.description.clone().unwrap_or_default());
        if let Some(commodity) = &gnc_account.commodity {
            account = account.with_currency(commodity.id.clone());
        }
        if let Some(parent) = &gnc_account.parent {
            account = account.with_parent(parent.value.clone());
        }
        account
    }

    fn create_ledger_transaction(
        &mut self,
        gnc_transaction: &GncTransaction,
    ) -> Transaction {
        let isodate = dates::parse_date(&gnc_transaction.date_posted.date)
            .unwrap_or_else(|| gnc_transaction.date_posted.date.clone());
        let description = gnc_transaction.description.clone().unwrap_or_default();
        let mut tx = Transaction::new(isodate)
            .with_description(description.clone())
            .with_memo(description);
        for gnc_split in &gnc_transaction.splits.split {
            match gnucash::parse_rational(&gnc_split.value) {
                Some(amount) => {
                    let mut split = Split::new(amount, gnc_split.account.value.clone())
                        .with_memo(gnc_split.memo.clone().unwrap_or_default());
                    if gnc_split.reconciled_state == "y" {
                        split = split.reconciled();
                    }
                    tx.splits.push(split);
                }
                None => {
                    self.log.warn(
                        "split",
                        format!("unparseable split value {}", gnc_split.value),
                    );
                }
            }
        }
        tx
    }
}

impl ToLedgerConverter for GnuCashToLedgerConverter {
    fn from_format(&self) -> FormatAcronym {
        FormatAcronym::GcXml
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        let gnc_v2 = gnucash::parse_file(path)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        self.gnc_v2 = Some(gnc_v2);
        Ok(())
    }

    fn convert_to_target(&mut self) -> Result<Book> {
        let gnc_v2 = self
            .gnc_v2
            .take()
            .context("load must be called before convert_to_target")?;
        let mut book = Book::new();

        for gnc_account in &gnc_v2.book.accounts {
            book.add_account(Self::create_ledger_account(gnc_account));
        }
        for (sequence, gnc_transaction) in gnc_v2.book.transactions.iter().enumerate() {
            let tx = self.create_ledger_transaction(gnc_transaction);
            let tx_id = format!("{}:{sequence}", tx.isodate);
            book.add_transaction(tx_id, tx);
        }

        self.gnc_v2 = Some(gnc_v2);
        Ok(book)
    }

    fn source_stats(&self) -> Option<Stats> {
        self.gnc_v2.as_ref().map(GncV2::get_stats)
    }

    fn take_log(&mut self) -> ConversionLog {
        std::mem::take(&mut self.log)
    }
}

/// Convert a ledger book to a GnuCash XML book.
#[derive(Debug, Default)]
pub struct LedgerToGnuCashConverter {
    book: Option<Book>,
    target: Option<GncV2>,
    guids: GuidSource,
    log: ConversionLog,
}

impl LedgerToGnuCashConverter {
    /// Create a converter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn create_gnucash_account(
        account: &Account,
        guid_map: &BTreeMap<String, String>,
    ) -> GncAccount {
        GncAccount {
            version: "2.0.0".to_string(),
            name: account.name.clone(),
            id: GncId::guid(guid_map[&account.account_id].clone()),
            account_type: account.account_type.as_str().to_string(),
            commodity: Some(GncCommodity::currency(account.currency.clone())),
            commodity_scu: Some(100),
            description: if account.description.is_empty() {
                None
            } else {
                Some(account.description.clone())
            },
            parent: account
                .parent_account_id
                .as_ref()
                .and_then(|parent_id| guid_map.get(parent_id))
                .map(|guid| GncId::guid(guid.clone())),
        }
    }

    fn create_gnucash_split(
        &mut self,
        split: &Split,
        guid_map: &BTreeMap<String, String>,
    ) -> Option<GncSplit> {
        let Some(account_guid) = guid_map.get(&split.account_id) else {
            self.log.error(
                "split",
                format!("unknown split account {}", split.account_id),
            );
            return None;
        };
        let value = gnucash::to_cents_rational(split.amount);
        Some(GncSplit {
            id: GncId::guid(self.guids.next_guid()),
            memo: if split.memo.is_empty() {
                None
            } else {
                Some(split.memo.clone())
            },
            reconciled_state: if split.reconciled { "y" } else { "n" }.to_string(),
            value: value.clone(),
            quantity: value,
            account: GncId::guid(account_guid.clone()),
        })
    }

    fn create_gnucash_transaction(
        &mut self,
        tx: &Transaction,
        currency: &str,
        guid_map: &BTreeMap<String, String>,
    ) -> GncTransaction {
        let splits = tx
            .splits
            .iter()
            .filter_map(|split| self.create_gnucash_split(split, guid_map))
            .collect();
        GncTransaction {
            version: "2.0.0".to_string(),
            id: GncId::guid(self.guids.next_guid()),
            currency: GncCommodity::currency(currency),
            date_posted: TsDate::new(tx.isodate.clone()),
            date_entered: TsDate::new(tx.isodate.clone()),
            description: tx.description.clone(),
            slots: Some(Slots::date_posted(tx.date_part())),
            splits: GncSplits { split: splits },
        }
    }
}

impl FromLedgerConverter for LedgerToGnuCashConverter {
    fn to_format(&self) -> FormatAcronym {
        FormatAcronym::GcXml
    }

    fn set_source(&mut self, book: Book) {
        self.book = Some(book);
    }

    fn convert_to_target(&mut self) -> Result<()> {
        let book = self
            .book
            .take()
            .context("set_source must be called before convert_to_target")?;
        let currency = book
            .get_stats()
            .main_currency()
            .unwrap_or("EUR")
            .to_string();

        // mint guids for every account first so parents and splits can
        // reference accounts in any order
        let mut guid_map: BTreeMap<String, String> = BTreeMap::new();
        for account_id in book.accounts.keys() {
            guid_map.insert(account_id.clone(), self.guids.next_guid());
        }

        let accounts: Vec<GncAccount> = book
            .accounts
            .values()
            .map(|account| Self::create_gnucash_account(account, &guid_map))
            .collect();
        let transactions: Vec<GncTransaction> = book
            .transactions
            .values()
            .map(|tx| self.create_gnucash_transaction(tx, &currency, &guid_map))
            .collect();

        let mut gnc_book = GncBook {
            version: "2.0.0".to_string(),
            id: GncId::guid(self.guids.next_guid()),
            count_data: Vec::new(),
            commodities: vec![GncCommodityDecl {
                version: "2.0.0".to_string(),
                space: "CURRENCY".to_string(),
                id: currency,
            }],
            accounts,
            transactions,
        };
        gnc_book.update_count_data();

        self.book = Some(book);
        self.target = Some(GncV2::new(gnc_book));
        Ok(())
    }

    fn to_text(&mut self) -> Result<String> {
        let target = self
            .target
            .as_ref()
            .context("convert_to_target must be called before to_text")?;
        Ok(gnucash::to_xml(target)?)
    }

    fn target_stats(&self) -> Option<Stats> {
        self.target.as_ref().map(GncV2::get_stats)
    }

    fn take_log(&mut self) -> ConversionLog {
        std::mem::take(&mut self.log)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nomina_core::Decimal;
    use rust_decimal_macros::dec;

    fn sample_book() -> Book {
        let mut book = Book::new();
        book.create_account("Cash", AccountType::Bank, None).unwrap();
        book.create_account("Expenses:Dining", AccountType::Expense, None)
            .unwrap();
        book.add_transaction(
            "2014-01-02:0",
            Transaction::new("2014-01-02")
                .with_description("Lunch")
                .with_split(Split::new(dec!(-7.80), "Cash").with_memo("lunch"))
                .with_split(Split::new(dec!(7.80), "Expenses:Dining")),
        );
        book
    }

    fn roundtrip(book: &Book) -> Book {
        let mut to_gnc = LedgerToGnuCashConverter::new();
        to_gnc.set_source(book.clone());
        to_gnc.convert_to_target().unwrap();
        let xml = to_gnc.to_text().unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.gnucash");
        std::fs::write(&path, &xml).unwrap();

        let mut from_gnc = GnuCashToLedgerConverter::new();
        from_gnc.load(&path).unwrap();
        from_gnc.convert_to_target().unwrap()
    }

    #[test]
    fn test_roundtrip_counts_and_dates() {
        let book = sample_book();
        let back = roundtrip(&book);
        let stats = book.get_stats();
        let back_stats = back.get_stats();
        assert_eq!(stats.accounts, back_stats.accounts);
        assert_eq!(stats.transactions, back_stats.transactions);
        assert_eq!(stats.start_date, back_stats.start_date);
        assert_eq!(stats.end_date, back_stats.end_date);
    }

    #[test]
    fn test_roundtrip_preserves_amounts_to_cents() {
        let book = sample_book();
        let back = roundtrip(&book);
        let tx = back.transactions.values().next().unwrap();
        assert_eq!(tx.total_amount(), Decimal::ZERO);
        let amounts: Vec<Decimal> = tx.splits.iter().map(|s| s.amount).collect();
        assert!(amounts.contains(&dec!(-7.80)));
        assert!(amounts.contains(&dec!(7.80)));
    }

    #[test]
    fn test_roundtrip_preserves_hierarchy() {
        let book = sample_book();
        let back = roundtrip(&book);
        let dining = back
            .accounts
            .values()
            .find(|account| account.name == "Dining")
            .unwrap();
        let parent_id = dining.parent_account_id.as_ref().unwrap();
        assert_eq!(back.lookup_account(parent_id).unwrap().name, "Expenses");
    }

    #[test]
    fn test_unknown_split_account_is_logged_and_dropped() {
        let mut book = Book::new();
        book.create_account("Cash", AccountType::Bank, None).unwrap();
        book.add_transaction(
            "2014-01-02:0",
            Transaction::new("2014-01-02")
                .with_split(Split::new(dec!(1), "Cash"))
                .with_split(Split::new(dec!(-1), "Ghost")),
        );
        let mut converter = LedgerToGnuCashConverter::new();
        converter.set_source(book);
        converter.convert_to_target().unwrap();
        let log = converter.take_log();
        assert_eq!(log.count("split"), 1);
        let stats = converter.target_stats().unwrap();
        assert_eq!(stats.transactions, 1);
    }

    #[test]
    fn test_reconciled_state_roundtrip() {
        let mut book = Book::new();
        book.create_account("Cash", AccountType::Bank, None).unwrap();
        book.create_account("Expenses", AccountType::Expense, None)
            .unwrap();
        book.add_transaction(
            "2014-01-02:0",
            Transaction::new("2014-01-02")
                .with_split(Split::new(dec!(-1), "Cash").reconciled())
                .with_split(Split::new(dec!(1), "Expenses")),
        );
        let back = roundtrip(&book);
        let tx = back.transactions.values().next().unwrap();
        assert!(tx.splits.iter().any(|s| s.reconciled));
        assert!(tx.splits.iter().any(|s| !s.reconciled));
    }
}
