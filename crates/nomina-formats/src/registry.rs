//! Accounting file format registry and detection.
//!
//! Each known format is described declaratively: a display name, a stable
//! acronym, an extension and a content pattern matched against the first
//! ~10,000 bytes of the file. Archive-based formats additionally name a ZIP
//! member whose content is matched instead.
//!
//! Declaration order matters when formats share an extension (GnuCash XML vs
//! GnuCash SQLite on `.gnucash`, ledger book vs Banking ZV on `.yaml`): the
//! more specific pattern is declared first and wins.

use regex::{Regex, RegexBuilder};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// How many bytes of a file are sniffed for the content pattern.
const SNIFF_BYTES: usize = 10_000;

/// The closed set of format identifiers.
///
/// Converter registries match exhaustively on this enum, so "no converter
/// registered for acronym" is a checked condition rather than a runtime
/// string-lookup surprise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatAcronym {
    /// Beancount text ledger
    Bean,
    /// GnuCash XML
    GcXml,
    /// GnuCash SQLite (detected, conversion unsupported)
    GcSqlite,
    /// nomina ledger book YAML (the canonical format)
    LbYaml,
    /// Quicken Interchange Format
    Qif,
    /// Banking ZV (Subsembly) JSON export
    BzvJson,
    /// Banking ZV book YAML
    BzvYaml,
    /// Microsoft Money ZIP table dump
    Money,
}

impl FormatAcronym {
    /// The stable identifier used in CLI arguments and registries.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bean => "BEAN",
            Self::GcXml => "GC-XML",
            Self::GcSqlite => "GC-SQLITE",
            Self::LbYaml => "LB-YAML",
            Self::Qif => "QIF",
            Self::BzvJson => "BZV-JSON",
            Self::BzvYaml => "BZV-YAML",
            Self::Money => "MONEY",
        }
    }

    /// All acronyms in registry declaration order.
    #[must_use]
    pub const fn all() -> [Self; 8] {
        [
            Self::Bean,
            Self::GcXml,
            Self::GcSqlite,
            Self::LbYaml,
            Self::BzvYaml,
            Self::Qif,
            Self::BzvJson,
            Self::Money,
        ]
    }
}

impl fmt::Display for FormatAcronym {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An acronym string that names no known format.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown format acronym: {0}")]
pub struct UnknownAcronym(pub String);

impl FromStr for FormatAcronym {
    type Err = UnknownAcronym;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "BEAN" => Ok(Self::Bean),
            "GC-XML" => Ok(Self::GcXml),
            "GC-SQLITE" => Ok(Self::GcSqlite),
            "LB-YAML" => Ok(Self::LbYaml),
            "QIF" => Ok(Self::Qif),
            "BZV-JSON" => Ok(Self::BzvJson),
            "BZV-YAML" => Ok(Self::BzvYaml),
            "MONEY" => Ok(Self::Money),
            other => Err(UnknownAcronym(other.to_string())),
        }
    }
}

/// A personal accounting file format descriptor.
#[derive(Debug, Clone)]
pub struct FileFormat {
    /// Display name
    pub name: &'static str,
    /// Stable identifier
    pub acronym: FormatAcronym,
    /// File extension including the dot
    pub ext: &'static str,
    /// Pattern matched against the decoded content prefix
    pub content_pattern: Regex,
    /// For archive formats: the ZIP member whose content is matched
    pub pattern_file: Option<&'static str>,
}

/// Errors from format detection.
#[derive(Debug, Error)]
pub enum DetectError {
    /// Reading the file failed
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Opening the archive failed
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

fn pattern(source: &str) -> Regex {
    RegexBuilder::new(source)
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
        .expect("format pattern must compile")
}

/// Decode a byte prefix: strict UTF-8 first, Latin-1 as the safe fallback.
fn decode_prefix(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(err) => {
            // the prefix may simply cut a multi-byte character short
            let valid = err.valid_up_to();
            if bytes.len() - valid < 4 && err.error_len().is_none() {
                String::from_utf8_lossy(&bytes[..valid]).into_owned()
            } else {
                bytes.iter().map(|&b| char::from(b)).collect()
            }
        }
    }
}

/// Detector for the known accounting file formats.
#[derive(Debug, Clone)]
pub struct FormatRegistry {
    formats: Vec<FileFormat>,
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatRegistry {
    /// Build the registry with all known formats in declaration order.
    #[must_use]
    pub fn new() -> Self {
        let formats = vec![
            FileFormat {
                name: "Beancount",
                acronym: FormatAcronym::Bean,
                ext: ".beancount",
                content_pattern: pattern(r#"option "title""#),
                pattern_file: None,
            },
            FileFormat {
                name: "GnuCash XML",
                acronym: FormatAcronym::GcXml,
                ext: ".gnucash",
                content_pattern: pattern(r"<gnc-v2"),
                pattern_file: None,
            },
            FileFormat {
                name: "GnuCash SQLite",
                acronym: FormatAcronym::GcSqlite,
                ext: ".gnucash",
                content_pattern: pattern(r"SQLite format 3"),
                pattern_file: None,
            },
            FileFormat {
                name: "nomina Ledger Book YAML",
                acronym: FormatAcronym::LbYaml,
                ext: ".yaml",
                content_pattern: pattern(r"file_type:\s*NOMINA-LEDGER-BOOK-YAML|accounts:\s*\w+:"),
                pattern_file: None,
            },
            FileFormat {
                name: "Banking ZV YAML",
                acronym: FormatAcronym::BzvYaml,
                ext: ".yaml",
                content_pattern: pattern(r"file_type:\s*NOMINA-BANKING-ZV-YAML|AcctId:"),
                pattern_file: None,
            },
            FileFormat {
                name: "Quicken Interchange Format",
                acronym: FormatAcronym::Qif,
                ext: ".qif",
                content_pattern: pattern(r"!Account|!Type:[A-Za-z]"),
                pattern_file: None,
            },
            FileFormat {
                name: "Banking ZV JSON",
                acronym: FormatAcronym::BzvJson,
                ext: ".json",
                content_pattern: pattern(r#""AcctId":\s*"[^"]+".*"OwnrAcctCcy":\s*"[^"]+""#),
                pattern_file: None,
            },
            FileFormat {
                name: "Microsoft Money ZIP dump",
                acronym: FormatAcronym::Money,
                ext: ".zip",
                content_pattern: pattern(r"file_type:\s*NOMINA-MICROSOFT-MONEY-YAML"),
                pattern_file: Some("nomina.yaml"),
            },
        ];
        Self { formats }
    }

    /// All declared formats.
    #[must_use]
    pub fn formats(&self) -> &[FileFormat] {
        &self.formats
    }

    /// Look a format up by its acronym.
    #[must_use]
    pub fn get_by_acronym(&self, acronym: FormatAcronym) -> Option<&FileFormat> {
        self.formats.iter().find(|f| f.acronym == acronym)
    }

    /// Detect the format of a file by extension and content.
    ///
    /// `.zip` archives are searched for the members declared by
    /// zip-capable formats; any other file contributes its first
    /// [`SNIFF_BYTES`] bytes, decoded best-effort. The first declared
    /// format whose extension and pattern both match wins; `Ok(None)`
    /// means no format matched.
    pub fn detect_format(&self, path: &Path) -> Result<Option<&FileFormat>, DetectError> {
        let ext = file_extension(path);
        if ext.eq_ignore_ascii_case(".zip") {
            return self.detect_in_zip(path);
        }

        let mut file = File::open(path)?;
        let mut buffer = vec![0_u8; SNIFF_BYTES];
        let read = file.read(&mut buffer)?;
        buffer.truncate(read);
        let content = decode_prefix(&buffer);

        Ok(self.formats.iter().find(|format| {
            format.pattern_file.is_none()
                && ext.eq_ignore_ascii_case(format.ext)
                && format.content_pattern.is_match(&content)
        }))
    }

    fn detect_in_zip(&self, path: &Path) -> Result<Option<&FileFormat>, DetectError> {
        let mut archive = zip::ZipArchive::new(File::open(path)?)?;
        for format in &self.formats {
            let Some(member_name) = format.pattern_file else {
                continue;
            };
            let Ok(mut member) = archive.by_name(member_name) else {
                continue;
            };
            let mut buffer = vec![0_u8; SNIFF_BYTES];
            let read = member.read(&mut buffer)?;
            buffer.truncate(read);
            if format.content_pattern.is_match(&decode_prefix(&buffer)) {
                return Ok(Some(format));
            }
        }
        Ok(None)
    }

    /// Look a format up by file extension alone, ignoring content.
    ///
    /// A fallback for callers that already trust the source; ambiguous
    /// extensions resolve to the first declared format.
    #[must_use]
    pub fn get_format_by_extension(&self, path: &Path) -> Option<&FileFormat> {
        let ext = file_extension(path);
        self.formats
            .iter()
            .find(|format| ext.eq_ignore_ascii_case(format.ext))
    }
}

fn file_extension(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &tempfile::TempDir, name: &str, content: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_acronym_roundtrip() {
        for acronym in FormatAcronym::all() {
            assert_eq!(acronym.as_str().parse::<FormatAcronym>(), Ok(acronym));
        }
        assert!("NOPE".parse::<FormatAcronym>().is_err());
    }

    #[test]
    fn test_detect_ledger_book_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "book.yaml",
            b"file_type: NOMINA-LEDGER-BOOK-YAML\nversion: '0.1'\naccounts: {}\n",
        );
        let registry = FormatRegistry::new();
        let format = registry.detect_format(&path).unwrap().unwrap();
        assert_eq!(format.acronym, FormatAcronym::LbYaml);
        // determinism: detecting twice yields the same acronym
        let again = registry.detect_format(&path).unwrap().unwrap();
        assert_eq!(again.acronym, FormatAcronym::LbYaml);
    }

    #[test]
    fn test_detect_qif_and_gnucash() {
        let dir = tempfile::tempdir().unwrap();
        let registry = FormatRegistry::new();

        let qif = write_file(&dir, "expenses.qif", b"!Account\nNCash\n^\n!Type:Cash\n");
        assert_eq!(
            registry.detect_format(&qif).unwrap().unwrap().acronym,
            FormatAcronym::Qif
        );

        let xml = write_file(
            &dir,
            "sample.gnucash",
            b"<?xml version=\"1.0\"?>\n<gnc-v2>\n</gnc-v2>\n",
        );
        assert_eq!(
            registry.detect_format(&xml).unwrap().unwrap().acronym,
            FormatAcronym::GcXml
        );

        let sqlite = write_file(&dir, "sample_sqlite.gnucash", b"SQLite format 3\x00junk");
        assert_eq!(
            registry.detect_format(&sqlite).unwrap().unwrap().acronym,
            FormatAcronym::GcSqlite
        );
    }

    #[test]
    fn test_detect_bzv_json() {
        let dir = tempfile::tempdir().unwrap();
        let registry = FormatRegistry::new();
        let json = write_file(
            &dir,
            "expenses2024.json",
            br#"[{"Id": "1", "AcctId": "DE02", "OwnrAcctCcy": "EUR"}]"#,
        );
        assert_eq!(
            registry.detect_format(&json).unwrap().unwrap().acronym,
            FormatAcronym::BzvJson
        );
    }

    #[test]
    fn test_detect_inside_zip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("money.zip");
        let file = File::create(&path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options: zip::write::SimpleFileOptions = Default::default();
        writer.start_file("nomina.yaml", options).unwrap();
        writer
            .write_all(b"file_type: NOMINA-MICROSOFT-MONEY-YAML\nversion: '0.1'\n")
            .unwrap();
        writer.start_file("ACCT.json", options).unwrap();
        writer.write_all(b"{}\n").unwrap();
        writer.finish().unwrap();

        let registry = FormatRegistry::new();
        let format = registry.detect_format(&path).unwrap().unwrap();
        assert_eq!(format.acronym, FormatAcronym::Money);
    }

    #[test]
    fn test_no_match_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let registry = FormatRegistry::new();
        // matching extension, non-matching content
        let path = write_file(&dir, "notes.yaml", b"just: some yaml\n");
        assert!(registry.detect_format(&path).unwrap().is_none());
        // unknown extension
        let path = write_file(&dir, "readme.txt", b"hello");
        assert!(registry.detect_format(&path).unwrap().is_none());
    }

    #[test]
    fn test_extension_only_fallback() {
        let registry = FormatRegistry::new();
        let format = registry
            .get_format_by_extension(Path::new("whatever.qif"))
            .unwrap();
        assert_eq!(format.acronym, FormatAcronym::Qif);
        assert!(registry
            .get_format_by_extension(Path::new("whatever.txt"))
            .is_none());
    }

    #[test]
    fn test_latin1_content_does_not_break_detection() {
        let dir = tempfile::tempdir().unwrap();
        let registry = FormatRegistry::new();
        let mut content = b"!Account\nNB\xe4ckerei\n^\n!Type:Bank\n".to_vec();
        content.extend_from_slice(b"D2024-01-02\n");
        let path = write_file(&dir, "umlaut.qif", &content);
        assert_eq!(
            registry.detect_format(&path).unwrap().unwrap().acronym,
            FormatAcronym::Qif
        );
    }
}
