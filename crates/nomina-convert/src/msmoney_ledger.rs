//! Microsoft Money to ledger book conversion.
//!
//! Works on the ZIP table dump an external tool produces from a `.mny`
//! database. Account rows become ledger accounts keyed by their `hacct`
//! handle; transaction rows become single-amount transactions balanced
//! against the reserved `Dangling` account (the dump carries no usable
//! split table).

use crate::qif_ledger::DANGLING_ACCOUNT;
use crate::ToLedgerConverter;
use anyhow::{Context, Result};
use nomina_core::{Account, AccountType, Book, ConversionLog, Split, Stats, Transaction};
use nomina_formats::msmoney::MsMoney;
use nomina_formats::FormatAcronym;
use std::path::Path;

/// Convert a Microsoft Money ZIP dump to a ledger book.
#[derive(Debug, Default)]
pub struct MsMoneyToLedgerConverter {
    ms_money: Option<MsMoney>,
    log: ConversionLog,
}

impl MsMoneyToLedgerConverter {
    /// Create a converter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ToLedgerConverter for MsMoneyToLedgerConverter {
    fn from_format(&self) -> FormatAcronym {
        FormatAcronym::Money
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        let mut ms_money = MsMoney::new();
        ms_money
            .load(path)
            .with_context(|| format!("failed to load {}", path.display()))?;
        self.log.merge(std::mem::take(&mut ms_money.log));
        self.ms_money = Some(ms_money);
        Ok(())
    }

    fn convert_to_target(&mut self) -> Result<Book> {
        let ms_money = self
            .ms_money
            .take()
            .context("load must be called before convert_to_target")?;
        let mut book = Book::new();
        book.name = ms_money
            .header
            .as_ref()
            .map_or_else(|| Some("Unknown".to_string()), |h| Some(h.name.clone()));
        book.since = ms_money.header.as_ref().map(|h| h.date.clone());

        book.create_account(DANGLING_ACCOUNT, AccountType::Error, None)?;
        for money_account in ms_money.accounts() {
            let account_type = money_account
                .account_type
                .as_deref()
                .map_or(AccountType::Bank, AccountType::from_gnucash);
            let mut account = Account::new(money_account.hacct.clone(), account_type)
                .with_name(money_account.name.clone())
                .with_description(money_account.description.clone());
            if let Some(currency) = &money_account.currency {
                account = account.with_currency(currency.clone());
            }
            book.add_account(account);
        }
        self.log.info(
            "accounts",
            format!("accounts created: {}", book.accounts.len()),
        );

        for money_tx in ms_money.transactions() {
            let Some(isodate) = money_tx.isodate.clone() else {
                self.log.warn(
                    "date",
                    format!("transaction {} has no parseable date", money_tx.htrn),
                );
                continue;
            };
            let Some(amount) = money_tx.amount else {
                self.log.warn(
                    "amount",
                    format!("transaction {} has no amount", money_tx.htrn),
                );
                continue;
            };
            let account_id = match &money_tx.hacct {
                Some(hacct) if book.lookup_account(hacct).is_some() => hacct.clone(),
                _ => {
                    self.log.warn(
                        "dangling",
                        format!(
                            "transaction {} references no known account",
                            money_tx.htrn
                        ),
                    );
                    DANGLING_ACCOUNT.to_string()
                }
            };

            let mut tx = Transaction::new(isodate.clone())
                .with_description(format!("Transaction {}", money_tx.htrn))
                .with_memo(format!("Amount: {amount}"));
            tx.splits.push(
                Split::new(amount, account_id).with_memo(format!("Transaction {}", money_tx.htrn)),
            );
            // the dump has no counter-split; balance via the sink account
            tx.splits.push(Split::new(-amount, DANGLING_ACCOUNT));
            self.log.warn(
                "dangling",
                format!("transaction {} balanced via Dangling", money_tx.htrn),
            );

            book.add_transaction(format!("{isodate}:{}", money_tx.htrn), tx);
        }
        self.log.info(
            "transactions",
            format!("transactions created: {}", book.transactions.len()),
        );

        self.ms_money = Some(ms_money);
        Ok(book)
    }

    fn source_stats(&self) -> Option<Stats> {
        self.ms_money.as_ref().map(MsMoney::get_stats)
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
    use std::fs::File;
    use std::io::Write;

    fn write_sample_zip(dir: &tempfile::TempDir) -> std::path::PathBuf {
        let path = dir.path().join("sample.zip");
        let mut writer = zip::ZipWriter::new(File::create(&path).unwrap());
        let options: zip::write::SimpleFileOptions = Default::default();
        writer.start_file("nomina.yaml", options).unwrap();
        writer
            .write_all(
                b"file_type: NOMINA-MICROSOFT-MONEY-YAML\nversion: '0.1'\nname: sample.mny\n\
                  date: '2024-01-01T00:00:00'\nsize: 1024\nsha256: abc\njetversion: JET4\n",
            )
            .unwrap();
        writer.start_file("ACCT.json", options).unwrap();
        writer
            .write_all(br#"{"hacct": 1, "szFull": "Giro", "currency": "EUR"}"#)
            .unwrap();
        writer.start_file("TRN.json", options).unwrap();
        writer
            .write_all(
                br#"{"htrn": 10, "hacct": 1, "date": "2004-05-01 00:00:00", "amount": -12.5}"#,
            )
            .unwrap();
        writer.finish().unwrap();
        path
    }

    #[test]
    fn test_money_conversion() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sample_zip(&dir);
        let mut converter = MsMoneyToLedgerConverter::new();
        converter.load(&path).unwrap();
        let book = converter.convert_to_target().unwrap();

        assert_eq!(book.name.as_deref(), Some("sample.mny"));
        // Dangling + Giro
        assert_eq!(book.accounts.len(), 2);
        assert_eq!(book.transactions.len(), 1);

        let tx = book.transactions.get("2004-05-01:10").unwrap();
        assert_eq!(tx.splits[0].amount, dec!(-12.5));
        assert_eq!(tx.splits[0].account_id, "1");
        assert_eq!(tx.splits[1].account_id, DANGLING_ACCOUNT);
        assert_eq!(tx.total_amount(), Decimal::ZERO);

        let log = converter.take_log();
        assert!(log.count("dangling") >= 1);
    }

    #[test]
    fn test_source_stats() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sample_zip(&dir);
        let mut converter = MsMoneyToLedgerConverter::new();
        converter.load(&path).unwrap();
        let stats = converter.source_stats().unwrap();
        assert_eq!(stats.accounts, 1);
        assert_eq!(stats.transactions, 1);
        assert_eq!(stats.start_date.as_deref(), Some("2004-05-01"));
    }
}
