//! Beancount <-> ledger book conversion.
//!
//! Exporting prefixes every account with its type's Beancount namespace
//! (`ASSET` -> `Assets`, `EXPENSE` -> `Expenses`, ...), flattens the
//! hierarchy into fully qualified sanitized names and opens each account at
//! the book's start date. Importing reverses the mapping: the first name
//! segment selects the account type, the rest becomes the account name.

use crate::{FromLedgerConverter, ToLedgerConverter};
use anyhow::{Context, Result};
use nomina_core::{dates, Account, AccountType, Book, ConversionLog, Split, Stats, Transaction};
use nomina_formats::beancount::{
    sanitize_account_name, BeanDirective, BeanOpen, BeanPosting, BeanTransaction, Beancount,
    Preamble,
};
use nomina_formats::FormatAcronym;
use std::path::Path;

/// Convert a Beancount file to a ledger book.
#[derive(Debug, Default)]
pub struct BeancountToLedgerConverter {
    beancount: Option<Beancount>,
    log: ConversionLog,
}

impl BeancountToLedgerConverter {
    /// Create a converter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn convert_account(book: &mut Book, open: &BeanOpen) {
        let parts: Vec<&str> = open.account.split(':').collect();
        let account_type = AccountType::from_beancount_prefix(parts.first().unwrap_or(&""));
        let name = parts[1..].join(":");
        let account = Account::new(open.account.clone(), account_type)
            .with_name(if name.is_empty() {
                open.account.clone()
            } else {
                name
            })
            .with_currency(
                open.currencies
                    .first()
                    .cloned()
                    .unwrap_or_else(|| "EUR".to_string()),
            )
            .with_description(open.description.clone().unwrap_or_default());
        book.add_account(account);
    }

    fn convert_transaction(book: &mut Book, tx: &BeanTransaction, sequence: usize) {
        let mut ledger_tx = Transaction::new(tx.date.clone())
            .with_description(tx.narration.clone())
            .with_memo(tx.memo.clone().unwrap_or_default());
        if let Some(payee) = &tx.payee {
            ledger_tx = ledger_tx.with_payee(payee.clone());
        }
        for posting in &tx.postings {
            ledger_tx
                .splits
                .push(Split::new(posting.amount, posting.account.clone()));
        }
        book.add_transaction(format!("{}:{sequence}", tx.date), ledger_tx);
    }
}

impl ToLedgerConverter for BeancountToLedgerConverter {
    fn from_format(&self) -> FormatAcronym {
        FormatAcronym::Bean
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        let mut beancount = Beancount::new();
        beancount
            .load_file(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        for error in &beancount.errors {
            self.log.warn("parse", error.clone());
        }
        self.beancount = Some(beancount);
        Ok(())
    }

    fn convert_to_target(&mut self) -> Result<Book> {
        let beancount = self
            .beancount
            .as_ref()
            .context("load must be called before convert_to_target")?;
        let mut book = Book::new();
        if let Some(title) = beancount.options.get("title") {
            book.name = Some(title.clone());
        }
        let mut sequence = 0;
        for entry in &beancount.entries {
            match entry {
                BeanDirective::Open(open) => Self::convert_account(&mut book, open),
                BeanDirective::Transaction(tx) => {
                    Self::convert_transaction(&mut book, tx, sequence);
                    sequence += 1;
                }
            }
        }
        Ok(book)
    }

    fn source_stats(&self) -> Option<Stats> {
        self.beancount.as_ref().map(Beancount::get_stats)
    }

    fn take_log(&mut self) -> ConversionLog {
        std::mem::take(&mut self.log)
    }
}

/// Convert a ledger book to a Beancount file.
#[derive(Debug, Default)]
pub struct LedgerToBeancountConverter {
    book: Option<Book>,
    target: Option<Beancount>,
    preamble: Option<Preamble>,
    log: ConversionLog,
}

impl LedgerToBeancountConverter {
    /// Create a converter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The namespaced Beancount account name for a ledger account.
    fn beancount_name(book: &Book, account: &Account) -> Option<String> {
        let fq_name = sanitize_account_name(&book.fq_account_name(account, ":"));
        if fq_name.is_empty() {
            return None;
        }
        Some(format!(
            "{}:{fq_name}",
            account.account_type.beancount_prefix()
        ))
    }

    fn convert_account(
        book: &Book,
        account: &Account,
        start_date: &str,
    ) -> Option<BeanDirective> {
        let name = Self::beancount_name(book, account)?;
        Some(BeanDirective::Open(BeanOpen {
            date: start_date.to_string(),
            account: name,
            currencies: vec![account.currency.clone()],
            description: if account.description.is_empty() {
                None
            } else {
                Some(account.description.clone())
            },
        }))
    }

    fn convert_transaction(
        &mut self,
        book: &Book,
        tx: &Transaction,
    ) -> Option<BeanDirective> {
        let Some(date) = dates::parse_date(tx.date_part()) else {
            self.log.warn(
                "date_parse",
                format!("unable to parse date: {}", tx.isodate),
            );
            return None;
        };

        let mut postings = Vec::new();
        for split in &tx.splits {
            let Some(account) = book.lookup_account(&split.account_id) else {
                self.log.error(
                    "split",
                    format!("invalid split account: {}", split.account_id),
                );
                continue;
            };
            let Some(account_name) = Self::beancount_name(book, account) else {
                continue;
            };
            postings.push(BeanPosting {
                account: account_name,
                amount: split.amount,
                currency: if account.currency.is_empty() {
                    "EUR".to_string()
                } else {
                    account.currency.clone()
                },
            });
        }

        if postings.is_empty() {
            self.log.warn(
                "transaction_skip",
                format!(
                    "skipping transaction with no valid postings: {}",
                    tx.description.as_deref().unwrap_or("")
                ),
            );
            return None;
        }

        Some(BeanDirective::Transaction(BeanTransaction {
            date,
            flag: '*',
            payee: tx.payee.clone(),
            narration: tx.description.clone().unwrap_or_default(),
            memo: if tx.memo.is_empty() {
                None
            } else {
                Some(tx.memo.clone())
            },
            postings,
        }))
    }
}

impl FromLedgerConverter for LedgerToBeancountConverter {
    fn to_format(&self) -> FormatAcronym {
        FormatAcronym::Bean
    }

    fn set_source(&mut self, book: Book) {
        self.book = Some(book);
    }

    fn convert_to_target(&mut self) -> Result<()> {
        let book = self
            .book
            .take()
            .context("set_source must be called before convert_to_target")?;
        let stats = book.get_stats();
        let start_date = stats
            .start_date
            .clone()
            .unwrap_or_else(|| dates::iso_date(chrono::Local::now().date_naive()));

        let mut beancount = Beancount::new();
        for account in book.accounts.values() {
            if let Some(directive) = Self::convert_account(&book, account, &start_date) {
                beancount.add_entry(directive);
            }
        }
        let transactions: Vec<Transaction> = book.transactions.values().cloned().collect();
        let mut converted = 0_usize;
        for tx in &transactions {
            if let Some(directive) = self.convert_transaction(&book, tx) {
                beancount.add_entry(directive);
                converted += 1;
            }
        }
        if converted == 0 && !transactions.is_empty() {
            self.log.warn(
                "empty_result",
                "no transactions survived the Beancount conversion",
            );
        }

        self.preamble = Some(Preamble {
            start_date,
            end_date: stats.end_date.clone().unwrap_or_else(|| "Unknown".to_string()),
            title: book.name.clone().unwrap_or_else(|| "Converted Ledger".to_string()),
            currency: stats.main_currency().unwrap_or("EUR").to_string(),
        });
        self.book = Some(book);
        self.target = Some(beancount);
        Ok(())
    }

    fn to_text(&mut self) -> Result<String> {
        let target = self
            .target
            .as_ref()
            .context("convert_to_target must be called before to_text")?;
        Ok(target.to_text(self.preamble.as_ref()))
    }

    fn target_stats(&self) -> Option<Stats> {
        self.target.as_ref().map(Beancount::get_stats)
    }

    fn take_log(&mut self) -> ConversionLog {
        std::mem::take(&mut self.log)
    }
}
