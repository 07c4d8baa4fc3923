//! Structured conversion diagnostics.
//!
//! Conversions collect their warnings and errors into an explicit
//! [`ConversionLog`] value that is handed back to the caller, who decides
//! whether to print, store or assert on it. Entries are mirrored to
//! `tracing` so operators still see them live.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How severe a log entry is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational progress note
    Info,
    /// A recoverable anomaly; the conversion degraded gracefully
    Warning,
    /// A defect in the input or conversion
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => f.write_str("info"),
            Self::Warning => f.write_str("warning"),
            Self::Error => f.write_str("error"),
        }
    }
}

/// One diagnostic entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Entry severity
    pub severity: Severity,
    /// Machine-readable category, e.g. `split`, `date_parse`, `empty_result`
    pub kind: String,
    /// Human-readable message
    pub message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]: {}", self.severity, self.kind, self.message)
    }
}

/// An ordered collection of diagnostic entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionLog {
    entries: Vec<LogEntry>,
}

impl ConversionLog {
    /// Create an empty log.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Record an informational entry.
    pub fn info(&mut self, kind: impl Into<String>, message: impl Into<String>) {
        self.push(Severity::Info, kind, message);
    }

    /// Record a warning.
    pub fn warn(&mut self, kind: impl Into<String>, message: impl Into<String>) {
        self.push(Severity::Warning, kind, message);
    }

    /// Record an error.
    pub fn error(&mut self, kind: impl Into<String>, message: impl Into<String>) {
        self.push(Severity::Error, kind, message);
    }

    fn push(&mut self, severity: Severity, kind: impl Into<String>, message: impl Into<String>) {
        let kind = kind.into();
        let message = message.into();
        match severity {
            Severity::Info => tracing::info!(kind = %kind, "{message}"),
            Severity::Warning => tracing::warn!(kind = %kind, "{message}"),
            Severity::Error => tracing::error!(kind = %kind, "{message}"),
        }
        self.entries.push(LogEntry {
            severity,
            kind,
            message,
        });
    }

    /// All entries in insertion order.
    #[must_use]
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Entries of the given kind.
    pub fn of_kind<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a LogEntry> {
        self.entries.iter().filter(move |e| e.kind == kind)
    }

    /// Number of entries of the given kind.
    #[must_use]
    pub fn count(&self, kind: &str) -> usize {
        self.of_kind(kind).count()
    }

    /// Whether any entry has [`Severity::Error`].
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(|e| e.severity == Severity::Error)
    }

    /// Whether any entry has [`Severity::Warning`] or worse.
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        self.entries
            .iter()
            .any(|e| matches!(e.severity, Severity::Warning | Severity::Error))
    }

    /// Whether the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Append all entries of `other`.
    pub fn merge(&mut self, other: Self) {
        self.entries.extend(other.entries);
    }
}

impl fmt::Display for ConversionLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(f, "{entry}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_kinds_and_counts() {
        let mut log = ConversionLog::new();
        log.warn("split", "invalid split target [X]");
        log.warn("split", "invalid split target [Y]");
        log.info("accounts", "7 accounts created");
        assert_eq!(log.count("split"), 2);
        assert_eq!(log.count("accounts"), 1);
        assert_eq!(log.count("missing"), 0);
        assert!(!log.has_errors());
        assert!(log.has_warnings());
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn test_log_merge() {
        let mut a = ConversionLog::new();
        a.warn("split", "one");
        let mut b = ConversionLog::new();
        b.error("date", "two");
        a.merge(b);
        assert_eq!(a.len(), 2);
        assert!(a.has_errors());
    }

    #[test]
    fn test_log_display() {
        let mut log = ConversionLog::new();
        log.warn("split", "dangling target");
        assert_eq!(log.to_string(), "warning[split]: dangling target\n");
    }
}
