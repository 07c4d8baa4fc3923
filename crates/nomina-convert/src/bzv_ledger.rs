//! Banking ZV to ledger book conversion.
//!
//! Bank exports are single-amount feeds: each record carries one amount and
//! a credit/debit indicator. The bank account split gets the signed amount;
//! the balancing split goes to the record's category account, or to the
//! reserved `Dangling` account when no category was assigned, so the
//! double-entry invariant holds for every produced transaction.

use crate::qif_ledger::DANGLING_ACCOUNT;
use crate::ToLedgerConverter;
use anyhow::{Context, Result};
use nomina_core::{Account, AccountType, Book, ConversionLog, Decimal, Split, Stats, Transaction};
use nomina_formats::bzv::{BzvBook, BzvTransaction};
use nomina_formats::FormatAcronym;
use std::path::Path;
use std::str::FromStr;

/// Which on-disk shape the converter reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BzvShape {
    Json,
    Yaml,
}

/// Convert a Banking ZV export to a ledger book.
#[derive(Debug)]
pub struct BankingZvToLedgerConverter {
    shape: BzvShape,
    bzv_book: Option<BzvBook>,
    log: ConversionLog,
}

impl BankingZvToLedgerConverter {
    /// Converter for raw JSON transaction arrays.
    #[must_use]
    pub fn json() -> Self {
        Self {
            shape: BzvShape::Json,
            bzv_book: None,
            log: ConversionLog::new(),
        }
    }

    /// Converter for BZV book YAML files.
    #[must_use]
    pub fn yaml() -> Self {
        Self {
            shape: BzvShape::Yaml,
            bzv_book: None,
            log: ConversionLog::new(),
        }
    }

    fn create_ledger_account(
        bzv_account: &nomina_formats::bzv::BzvAccount,
        is_bank_account: bool,
    ) -> Account {
        let account_type = if is_bank_account {
            AccountType::Bank
        } else {
            AccountType::Category
        };
        let mut account = Account::new(bzv_account.account_id.clone(), account_type)
            .with_name(bzv_account.name.clone());
        if let Some(parent) = &bzv_account.parent_account_id {
            account = account.with_parent(parent.clone());
        }
        account
    }

    fn create_ledger_splits(&mut self, tx: &BzvTransaction) -> Option<Vec<Split>> {
        let Ok(mut amount) = Decimal::from_str(tx.amt.trim()) else {
            self.log.warn(
                "amount",
                format!("unparseable amount {} in transaction {}", tx.amt, tx.id),
            );
            return None;
        };
        if tx.cdt_dbt_ind == "DBIT" {
            amount = -amount;
        }
        let memo = tx.rmt_inf.clone().unwrap_or_default();

        let mut splits = vec![Split::new(amount, tx.acct_id.clone()).with_memo(memo.clone())];
        match &tx.category {
            Some(category) => {
                splits.push(Split::new(-amount, category.clone()).with_memo(memo));
            }
            None => {
                self.log.warn(
                    "dangling",
                    format!("no category for transaction {}, balancing via Dangling", tx.id),
                );
                splits.push(Split::new(-amount, DANGLING_ACCOUNT).with_memo(memo));
            }
        }
        Some(splits)
    }

    fn create_ledger_transaction(&mut self, tx: &BzvTransaction) -> Option<Transaction> {
        let splits = self.create_ledger_splits(tx)?;
        let mut ledger_tx = Transaction::new(tx.bookg_dt.clone())
            .with_description(
                tx.bookg_txt
                    .clone()
                    .unwrap_or_else(|| "No description".to_string()),
            )
            .with_memo(tx.rmt_inf.clone().unwrap_or_default());
        ledger_tx.splits = splits;
        Some(ledger_tx)
    }
}

impl ToLedgerConverter for BankingZvToLedgerConverter {
    fn from_format(&self) -> FormatAcronym {
        match self.shape {
            BzvShape::Json => FormatAcronym::BzvJson,
            BzvShape::Yaml => FormatAcronym::BzvYaml,
        }
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        let book = match self.shape {
            BzvShape::Json => BzvBook::load_json_file(path),
            BzvShape::Yaml => BzvBook::load_yaml_file(path),
        }
        .with_context(|| format!("failed to load {}", path.display()))?;
        self.bzv_book = Some(book);
        Ok(())
    }

    fn convert_to_target(&mut self) -> Result<Book> {
        let bzv_book = self
            .bzv_book
            .take()
            .context("load must be called before convert_to_target")?;
        let mut book = Book::new();
        book.name = bzv_book.name.clone();
        book.owner = bzv_book.owner.clone();
        book.url = bzv_book.url.clone();
        book.since = bzv_book.since.clone();

        book.create_account(DANGLING_ACCOUNT, AccountType::Error, None)?;
        // accounts referenced by a transaction's AcctId are bank accounts,
        // everything else came from category synthesis
        let bank_account_ids: std::collections::BTreeSet<&str> = bzv_book
            .transactions
            .iter()
            .map(|tx| tx.acct_id.as_str())
            .collect();
        for bzv_account in bzv_book.accounts.values() {
            book.add_account(Self::create_ledger_account(
                bzv_account,
                bank_account_ids.contains(bzv_account.account_id.as_str()),
            ));
        }

        for tx in &bzv_book.transactions {
            if let Some(ledger_tx) = self.create_ledger_transaction(tx) {
                let tx_id = format!("{}:{}", ledger_tx.isodate, tx.id);
                book.add_transaction(tx_id, ledger_tx);
            }
        }

        self.bzv_book = Some(bzv_book);
        Ok(book)
    }

    fn source_stats(&self) -> Option<Stats> {
        self.bzv_book.as_ref().map(BzvBook::get_stats)
    }

    fn take_log(&mut self) -> ConversionLog {
        std::mem::take(&mut self.log)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const SAMPLE_JSON: &str = r#"[
        {
            "Id": "1",
            "AcctId": "DE02120300000000202051",
            "OwnrAcctCcy": "EUR",
            "OwnrAcctNo": "202051",
            "OwnrAcctBankCode": "12030000",
            "BookgDt": "2024-03-01",
            "Amt": "42.00",
            "AmtCcy": "EUR",
            "CdtDbtInd": "DBIT",
            "RmtInf": "Groceries at the market",
            "BookgTxt": "Debit order",
            "BookgSts": "BOOK",
            "Category": "Expenses:Food",
            "ReadStatus": true,
            "Flag": "None"
        },
        {
            "Id": "2",
            "AcctId": "DE02120300000000202051",
            "OwnrAcctCcy": "EUR",
            "OwnrAcctNo": "202051",
            "OwnrAcctBankCode": "12030000",
            "BookgDt": "2024-03-05",
            "Amt": "1500.00",
            "AmtCcy": "EUR",
            "CdtDbtInd": "CRDT",
            "BookgTxt": "Salary",
            "BookgSts": "BOOK",
            "ReadStatus": false,
            "Flag": "None"
        }
    ]"#;

    fn convert_sample() -> (Book, ConversionLog) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("expenses2024.json");
        std::fs::write(&path, SAMPLE_JSON).unwrap();
        let mut converter = BankingZvToLedgerConverter::json();
        converter.load(&path).unwrap();
        let book = converter.convert_to_target().unwrap();
        (book, converter.take_log())
    }

    #[test]
    fn test_debit_sign_and_category_split() {
        let (book, _log) = convert_sample();
        let groceries = book.transactions.get("2024-03-01:1").unwrap();
        assert_eq!(groceries.splits[0].amount, dec!(-42.00));
        assert_eq!(groceries.splits[0].account_id, "DE02120300000000202051");
        assert_eq!(groceries.splits[1].amount, dec!(42.00));
        assert_eq!(groceries.splits[1].account_id, "Expenses:Food");
        assert_eq!(groceries.total_amount(), Decimal::ZERO);
    }

    #[test]
    fn test_credit_without_category_balances_via_dangling() {
        let (book, log) = convert_sample();
        let salary = book.transactions.get("2024-03-05:2").unwrap();
        assert_eq!(salary.splits[0].amount, dec!(1500.00));
        assert_eq!(salary.splits[1].account_id, DANGLING_ACCOUNT);
        assert_eq!(salary.total_amount(), Decimal::ZERO);
        assert_eq!(log.count("dangling"), 1);
    }

    #[test]
    fn test_account_types() {
        let (book, _log) = convert_sample();
        assert_eq!(
            book.lookup_account("DE02120300000000202051")
                .unwrap()
                .account_type,
            AccountType::Bank
        );
        assert_eq!(
            book.lookup_account("Expenses:Food").unwrap().account_type,
            AccountType::Category
        );
        assert_eq!(
            book.lookup_account("Expenses").unwrap().account_type,
            AccountType::Category
        );
    }

    #[test]
    fn test_every_split_resolves() {
        let (book, _log) = convert_sample();
        assert!(book.calc_balances(false).is_ok());
    }
}
