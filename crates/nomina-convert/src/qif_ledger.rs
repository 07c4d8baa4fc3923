//! QIF to ledger book conversion.
//!
//! Reserved root accounts `Class`, `Category` and `Dangling` are created up
//! front; classes and categories become pseudo-accounts beneath their roots.
//! Split targets resolve in three steps (bracket literal, plain account,
//! `Category:` prefix) and fall back to `Dangling` with a warning, so a
//! conversion never fails on an unresolvable target and never drops an
//! imbalance silently.

use crate::ToLedgerConverter;
use anyhow::{Context, Result};
use nomina_core::{Account, AccountType, Book, ConversionLog, Decimal, Split, Stats, Transaction};
use nomina_formats::FormatAcronym;
use nomina_qif::{QifParser, QifTransaction, SplitCategory};
use std::path::Path;

/// Id of the reserved sink account for unresolvable split targets.
pub const DANGLING_ACCOUNT: &str = "Dangling";
/// Id of the root account collecting QIF classes.
pub const CLASS_ROOT: &str = "Class";
/// Id of the root account collecting QIF categories.
pub const CATEGORY_ROOT: &str = "Category";

/// Convert a Quicken QIF file to a ledger book.
#[derive(Debug, Default)]
pub struct QifToLedgerConverter {
    parser: QifParser,
    log: ConversionLog,
}

impl QifToLedgerConverter {
    /// Create a converter with a fresh parser.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Access the underlying parser (for diagnostics and stats).
    #[must_use]
    pub fn parser(&self) -> &QifParser {
        &self.parser
    }

    /// Create the reserved roots and one ledger account per QIF account,
    /// class and category.
    fn create_account_lookup(&mut self, book: &mut Book) -> Result<()> {
        book.create_account(CLASS_ROOT, AccountType::Class, None)?;
        book.create_account(CATEGORY_ROOT, AccountType::Category, None)?;
        book.create_account(DANGLING_ACCOUNT, AccountType::Error, None)?;

        // accounts are keyed by full path, so parents sort before children
        for qif_account in self.parser.accounts.values() {
            let mut account = Account::new(
                qif_account.account_id.clone(),
                qif_account.account_type,
            )
            .with_name(qif_account.name.clone())
            .with_description(qif_account.description.clone())
            .with_currency(qif_account.currency.clone());
            if let Some(parent) = &qif_account.parent_account_id {
                account = account.with_parent(parent.clone());
            }
            book.add_account(account);
        }

        for class_name in self.parser.classes.keys() {
            book.create_account(class_name, AccountType::Class, Some(CLASS_ROOT))?;
        }
        for category_name in self.parser.categories.keys() {
            book.create_account(category_name, AccountType::Category, Some(CATEGORY_ROOT))?;
        }
        Ok(())
    }

    /// Resolve a split target to an account id.
    ///
    /// Resolution order: bracket-quoted literal account, plain name as an
    /// existing account, `Category:<name>`; anything else routes to the
    /// reserved `Dangling` account with a warning.
    fn resolve_split_target(
        &mut self,
        book: &Book,
        target: Option<&SplitCategory>,
        context: &str,
    ) -> String {
        let Some(target) = target else {
            self.log
                .warn("split", format!("empty split target for {context}"));
            return DANGLING_ACCOUNT.to_string();
        };

        if let Some(account_name) = &target.account {
            if book.lookup_account(account_name).is_some() {
                return account_name.clone();
            }
        } else if let Some(category) = &target.category {
            if book.lookup_account(category).is_some() {
                return category.clone();
            }
            let category_id = format!("{CATEGORY_ROOT}:{category}");
            if book.lookup_account(&category_id).is_some() {
                return category_id;
            }
        }

        self.log.warn(
            "split",
            format!("invalid split target {} for {context}", target.markup),
        );
        DANGLING_ACCOUNT.to_string()
    }

    /// Build a balancing split for the given target.
    fn make_split(
        &mut self,
        book: &Book,
        amount: Option<Decimal>,
        target: Option<&SplitCategory>,
        memo: &str,
        context: &str,
        negate: bool,
    ) -> Split {
        let account_id = self.resolve_split_target(book, target, context);
        let mut amount = amount.unwrap_or_else(|| {
            self.log
                .warn("amount", format!("no amount for {context}"));
            Decimal::ZERO
        });
        if negate {
            amount = -amount;
        }
        Split::new(amount, account_id).with_memo(memo)
    }

    /// Create the debit and credit splits for one QIF transaction.
    fn calc_splits(&mut self, book: &Book, tx: &QifTransaction) -> Vec<Split> {
        let context = format!(
            "transaction at lines {}-{}",
            tx.start_line, tx.end_line
        );

        let Some(account_id) = tx
            .account_id
            .as_ref()
            .filter(|id| book.lookup_account(id.as_str()).is_some())
        else {
            self.log
                .warn("account", format!("unknown account in {context}"));
            return Vec::new();
        };
        let memo = tx.memo.clone().unwrap_or_default();

        let mut splits = Vec::new();
        if tx.has_splits() {
            // debit the transaction account with the split total,
            // credit each split target with its negated amount
            splits.push(
                Split::new(tx.total_split_amount(), account_id.clone()).with_memo(memo.clone()),
            );
            for (i, target) in tx.split_categories.iter().enumerate() {
                let amount = tx.split_amount_values.get(i).copied().flatten();
                let split_memo = tx.split_memos.get(i).map_or("", String::as_str);
                splits.push(self.make_split(
                    book,
                    amount.map(|a| -a),
                    Some(target),
                    split_memo,
                    &context,
                    false,
                ));
            }
        } else {
            let amount = tx.amount_value.unwrap_or_else(|| {
                self.log
                    .warn("amount", format!("no amount for {context}"));
                Decimal::ZERO
            });
            splits.push(Split::new(amount, account_id.clone()).with_memo(memo.clone()));
            let category = tx.category.as_deref().map(SplitCategory::parse);
            splits.push(self.make_split(
                book,
                Some(amount),
                category.as_ref(),
                &memo,
                &context,
                true,
            ));
        }
        splits
    }
}

impl ToLedgerConverter for QifToLedgerConverter {
    fn from_format(&self) -> FormatAcronym {
        FormatAcronym::Qif
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        self.parser
            .parse_file(path)
            .with_context(|| format!("failed to read {}", path.display()))
    }

    fn convert_to_target(&mut self) -> Result<Book> {
        let mut book = Book::new();
        book.name = self.parser.name.clone();
        self.create_account_lookup(&mut book)?;

        let transactions: Vec<(String, QifTransaction)> = self
            .parser
            .transactions
            .iter()
            .map(|(id, tx)| (id.clone(), tx.clone()))
            .collect();
        for (tx_id, qif_tx) in transactions {
            let splits = self.calc_splits(&book, &qif_tx);
            let memo = qif_tx.memo.clone().unwrap_or_default();
            let mut tx = Transaction::new(qif_tx.isodate.clone().unwrap_or_default())
                .with_memo(memo.clone());
            tx.description = qif_tx.memo.clone();
            tx.payee = qif_tx.payee.clone();
            tx.splits = splits;
            book.add_transaction(tx_id, tx);
        }
        Ok(book)
    }

    fn source_stats(&self) -> Option<Stats> {
        Some(self.parser.stats())
    }

    fn take_log(&mut self) -> ConversionLog {
        std::mem::take(&mut self.log)
    }
}
