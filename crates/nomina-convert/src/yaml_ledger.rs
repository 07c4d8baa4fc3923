//! Ledger book YAML load and save.
//!
//! LB-YAML is the canonical persisted form and the only format the core
//! fully owns, so both converter sides are thin: the loader deserializes a
//! book, the writer serializes one. The hub short-circuits the
//! LB-YAML -> LB-YAML identity pair without touching these converters.

use crate::{FromLedgerConverter, ToLedgerConverter};
use anyhow::{Context, Result};
use nomina_core::{Book, ConversionLog, Stats};
use nomina_formats::FormatAcronym;
use std::path::Path;

/// Load a ledger book from its YAML form.
#[derive(Debug, Default)]
pub struct LedgerBookLoader {
    book: Option<Book>,
    log: ConversionLog,
}

impl LedgerBookLoader {
    /// Create a loader.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ToLedgerConverter for LedgerBookLoader {
    fn from_format(&self) -> FormatAcronym {
        FormatAcronym::LbYaml
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        let book = Book::load_yaml_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?;
        self.book = Some(book);
        Ok(())
    }

    fn convert_to_target(&mut self) -> Result<Book> {
        self.book
            .clone()
            .context("load must be called before convert_to_target")
    }

    fn source_stats(&self) -> Option<Stats> {
        self.book.as_ref().map(Book::get_stats)
    }

    fn take_log(&mut self) -> ConversionLog {
        std::mem::take(&mut self.log)
    }
}

/// Serialize a ledger book to its YAML form.
#[derive(Debug, Default)]
pub struct LedgerToYamlConverter {
    book: Option<Book>,
    log: ConversionLog,
}

impl LedgerToYamlConverter {
    /// Create a converter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl FromLedgerConverter for LedgerToYamlConverter {
    fn to_format(&self) -> FormatAcronym {
        FormatAcronym::LbYaml
    }

    fn set_source(&mut self, book: Book) {
        self.book = Some(book);
    }

    fn convert_to_target(&mut self) -> Result<()> {
        // the book already is the target model
        self.book
            .as_ref()
            .map(|_| ())
            .context("set_source must be called before convert_to_target")
    }

    fn to_text(&mut self) -> Result<String> {
        let book = self
            .book
            .as_ref()
            .context("set_source must be called before to_text")?;
        Ok(book.to_yaml()?)
    }

    fn target_stats(&self) -> Option<Stats> {
        self.book.as_ref().map(Book::get_stats)
    }

    fn take_log(&mut self) -> ConversionLog {
        std::mem::take(&mut self.log)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nomina_core::{AccountType, Split, Transaction};
    use rust_decimal_macros::dec;

    #[test]
    fn test_load_and_save() {
        let mut book = Book::new();
        book.create_account("Cash", AccountType::Bank, None).unwrap();
        book.add_transaction(
            "2024-01-01:0",
            Transaction::new("2024-01-01").with_split(Split::new(dec!(1), "Cash")),
        );

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.yaml");
        book.save_yaml_file(&path).unwrap();

        let mut loader = LedgerBookLoader::new();
        loader.load(&path).unwrap();
        let loaded = loader.convert_to_target().unwrap();
        assert_eq!(loaded.accounts.len(), 1);

        let mut writer = LedgerToYamlConverter::new();
        writer.set_source(loaded);
        writer.convert_to_target().unwrap();
        let yaml = writer.to_text().unwrap();
        assert!(yaml.contains("file_type: NOMINA-LEDGER-BOOK-YAML"));
        assert_eq!(writer.target_stats().unwrap().transactions, 1);
    }
}
