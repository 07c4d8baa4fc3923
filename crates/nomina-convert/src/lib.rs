//! Hub-and-spoke conversion framework for nomina
//!
//! All format pairs convert through the canonical ledger [`Book`] rather
//! than needing a direct converter per pair:
//!
//! - [`ToLedgerConverter`] - native format -> ledger book
//! - [`FromLedgerConverter`] - ledger book -> native format
//! - [`Converter`] - the hub: detects the input format, selects the
//!   converter pair and orchestrates load -> convert -> serialize -> write
//!
//! Converter selection matches exhaustively on [`FormatAcronym`], so an
//! unsupported input or output acronym fails with a descriptive error
//! before any output I/O is attempted. Every conversion hands back a
//! structured [`ConversionLog`] the caller can print, store or assert on.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod beancount_ledger;
pub mod bzv_ledger;
pub mod gnc_ledger;
pub mod msmoney_ledger;
pub mod qif_ledger;
pub mod yaml_ledger;

use anyhow::{bail, Context, Result};
use nomina_core::{Book, ConversionLog, Stats};
use nomina_formats::{FormatAcronym, FormatRegistry};
use std::path::Path;

pub use beancount_ledger::{BeancountToLedgerConverter, LedgerToBeancountConverter};
pub use bzv_ledger::BankingZvToLedgerConverter;
pub use gnc_ledger::{GnuCashToLedgerConverter, LedgerToGnuCashConverter};
pub use msmoney_ledger::MsMoneyToLedgerConverter;
pub use qif_ledger::QifToLedgerConverter;
pub use yaml_ledger::{LedgerBookLoader, LedgerToYamlConverter};

/// Converts a native format into the canonical ledger book.
///
/// Implementations are stateful: construct, [`load`](Self::load), then
/// [`convert_to_target`](Self::convert_to_target). Each instance is
/// independently constructed per conversion and holds no shared state.
pub trait ToLedgerConverter {
    /// The source format this converter reads.
    fn from_format(&self) -> FormatAcronym;

    /// Load and parse the native input file.
    fn load(&mut self, path: &Path) -> Result<()>;

    /// Map the loaded native model into a ledger book.
    fn convert_to_target(&mut self) -> Result<Book>;

    /// Statistics of the loaded native model, `None` before `load`.
    fn source_stats(&self) -> Option<Stats>;

    /// Drain the diagnostics collected so far.
    fn take_log(&mut self) -> ConversionLog;
}

/// Converts the canonical ledger book into a native format.
pub trait FromLedgerConverter {
    /// The target format this converter writes.
    fn to_format(&self) -> FormatAcronym;

    /// Provide the source book.
    fn set_source(&mut self, book: Book);

    /// Map the book into the native target model.
    fn convert_to_target(&mut self) -> Result<()>;

    /// Serialize the target model to text.
    fn to_text(&mut self) -> Result<String>;

    /// Statistics of the converted target model, `None` before conversion.
    fn target_stats(&self) -> Option<Stats>;

    /// Drain the diagnostics collected so far.
    fn take_log(&mut self) -> ConversionLog;
}

/// The result of one hub conversion.
#[derive(Debug)]
pub struct ConversionOutcome {
    /// Detected input format
    pub input_format: FormatAcronym,
    /// Requested output format
    pub output_format: FormatAcronym,
    /// The serialized output
    pub text: String,
    /// Statistics of the native source model
    pub source_stats: Option<Stats>,
    /// Statistics of the native target model
    pub target_stats: Option<Stats>,
    /// All diagnostics collected along the way
    pub log: ConversionLog,
}

/// General converter for personal accounting formats (hub and spoke).
#[derive(Debug, Default)]
pub struct Converter {
    registry: FormatRegistry,
}

impl Converter {
    /// Create a converter with the default format registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: FormatRegistry::new(),
        }
    }

    /// The format registry used for detection.
    #[must_use]
    pub fn registry(&self) -> &FormatRegistry {
        &self.registry
    }

    /// Instantiate the to-ledger converter for a format.
    ///
    /// Errors name the unsupported acronym; the match is exhaustive over
    /// [`FormatAcronym`], so adding a format forces a decision here.
    pub fn to_ledger_converter(acronym: FormatAcronym) -> Result<Box<dyn ToLedgerConverter>> {
        match acronym {
            FormatAcronym::Qif => Ok(Box::new(QifToLedgerConverter::new())),
            FormatAcronym::GcXml => Ok(Box::new(GnuCashToLedgerConverter::new())),
            FormatAcronym::Bean => Ok(Box::new(BeancountToLedgerConverter::new())),
            FormatAcronym::BzvJson => Ok(Box::new(BankingZvToLedgerConverter::json())),
            FormatAcronym::BzvYaml => Ok(Box::new(BankingZvToLedgerConverter::yaml())),
            FormatAcronym::Money => Ok(Box::new(MsMoneyToLedgerConverter::new())),
            FormatAcronym::LbYaml => Ok(Box::new(LedgerBookLoader::new())),
            FormatAcronym::GcSqlite => {
                bail!("unsupported input format: {acronym}")
            }
        }
    }

    /// Instantiate the from-ledger converter for a format.
    pub fn from_ledger_converter(acronym: FormatAcronym) -> Result<Box<dyn FromLedgerConverter>> {
        match acronym {
            FormatAcronym::GcXml => Ok(Box::new(LedgerToGnuCashConverter::new())),
            FormatAcronym::Bean => Ok(Box::new(LedgerToBeancountConverter::new())),
            FormatAcronym::LbYaml => Ok(Box::new(LedgerToYamlConverter::new())),
            FormatAcronym::Qif
            | FormatAcronym::GcSqlite
            | FormatAcronym::BzvJson
            | FormatAcronym::BzvYaml
            | FormatAcronym::Money => {
                bail!("unsupported output format: {acronym}")
            }
        }
    }

    /// Supported input and output acronyms.
    #[must_use]
    pub fn supported_formats() -> (Vec<FormatAcronym>, Vec<FormatAcronym>) {
        let inputs = FormatAcronym::all()
            .into_iter()
            .filter(|a| Self::to_ledger_converter(*a).is_ok())
            .collect();
        let outputs = FormatAcronym::all()
            .into_iter()
            .filter(|a| Self::from_ledger_converter(*a).is_ok())
            .collect();
        (inputs, outputs)
    }

    /// Convert `input_path` to the requested output format.
    ///
    /// Both converters are selected before the input is loaded, so an
    /// unsupported pair fails before any conversion work or output I/O.
    pub fn convert_to_text(
        &self,
        input_path: &Path,
        output_format: FormatAcronym,
    ) -> Result<ConversionOutcome> {
        let input_format = self
            .registry
            .detect_format(input_path)
            .with_context(|| format!("cannot probe {}", input_path.display()))?
            .map(|format| format.acronym)
            .with_context(|| {
                format!(
                    "unsupported or unrecognized input format for file: {}",
                    input_path.display()
                )
            })?;

        let mut log = ConversionLog::new();

        // identity pair: pass the canonical form through untransformed
        if input_format == FormatAcronym::LbYaml && output_format == FormatAcronym::LbYaml {
            let text = std::fs::read_to_string(input_path)?;
            let stats = Book::from_yaml(&text).ok().map(|book| book.get_stats());
            log.info("identity", "LB-YAML to LB-YAML pass-through");
            return Ok(ConversionOutcome {
                input_format,
                output_format,
                text,
                source_stats: stats.clone(),
                target_stats: stats,
                log,
            });
        }

        let mut to_ledger = Self::to_ledger_converter(input_format)?;
        let mut from_ledger = Self::from_ledger_converter(output_format)?;

        to_ledger
            .load(input_path)
            .with_context(|| format!("failed to load {}", input_path.display()))?;
        let book = to_ledger.convert_to_target()?;
        let source_stats = to_ledger.source_stats();
        log.merge(to_ledger.take_log());

        if book.transactions.is_empty() {
            log.warn(
                "empty_result",
                format!(
                    "conversion of {} produced no transactions",
                    input_path.display()
                ),
            );
        }

        from_ledger.set_source(book);
        from_ledger.convert_to_target()?;
        let text = from_ledger.to_text()?;
        let target_stats = from_ledger.target_stats();
        log.merge(from_ledger.take_log());

        Ok(ConversionOutcome {
            input_format,
            output_format,
            text,
            source_stats,
            target_stats,
            log,
        })
    }

    /// Convert and write the result to `output_path`.
    ///
    /// The output file is only created once the conversion has succeeded;
    /// a failing conversion never leaves a partial file behind.
    pub fn convert(
        &self,
        input_path: &Path,
        output_format: FormatAcronym,
        output_path: &Path,
    ) -> Result<ConversionOutcome> {
        let outcome = self.convert_to_text(input_path, output_format)?;
        std::fs::write(output_path, &outcome.text)
            .with_context(|| format!("failed to write {}", output_path.display()))?;
        Ok(outcome)
    }
}

/// A deterministic hex guid source for formats that require opaque ids.
///
/// GnuCash wants 32-hex-digit guids; a per-conversion counter keeps output
/// reproducible without pulling in a uuid dependency.
#[derive(Debug, Default)]
pub(crate) struct GuidSource {
    counter: u64,
}

impl GuidSource {
    pub fn next_guid(&mut self) -> String {
        self.counter += 1;
        format!("{:032x}", self.counter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_output_fails_fast() {
        let err = Converter::from_ledger_converter(FormatAcronym::Qif)
            .err()
            .unwrap();
        assert!(err.to_string().contains("unsupported output format: QIF"));
        let err = Converter::from_ledger_converter(FormatAcronym::Money)
            .err()
            .unwrap();
        assert!(err.to_string().contains("MONEY"));
    }

    #[test]
    fn test_unsupported_input_fails_fast() {
        let err = Converter::to_ledger_converter(FormatAcronym::GcSqlite)
            .err()
            .unwrap();
        assert!(err
            .to_string()
            .contains("unsupported input format: GC-SQLITE"));
    }

    #[test]
    fn test_supported_formats() {
        let (inputs, outputs) = Converter::supported_formats();
        assert!(inputs.contains(&FormatAcronym::Qif));
        assert!(inputs.contains(&FormatAcronym::Money));
        assert!(!inputs.contains(&FormatAcronym::GcSqlite));
        assert_eq!(
            outputs,
            vec![
                FormatAcronym::Bean,
                FormatAcronym::GcXml,
                FormatAcronym::LbYaml
            ]
        );
    }

    #[test]
    fn test_guid_source_is_deterministic() {
        let mut guids = GuidSource::default();
        let first = guids.next_guid();
        assert_eq!(first.len(), 32);
        assert_ne!(first, guids.next_guid());
    }

    #[test]
    fn test_unsupported_output_creates_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("book.yaml");
        std::fs::write(
            &input,
            "file_type: NOMINA-LEDGER-BOOK-YAML\naccounts: {}\ntransactions: {}\n",
        )
        .unwrap();
        let output = dir.path().join("out.qif");
        let converter = Converter::new();
        let result = converter.convert(&input, FormatAcronym::Qif, &output);
        assert!(result.is_err());
        assert!(!output.exists());
    }
}
