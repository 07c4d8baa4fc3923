//! Argument handling and command dispatch.

use anyhow::{bail, Context, Result};
use clap::Parser;
use nomina_convert::Converter;
use nomina_formats::{FormatAcronym, FormatRegistry};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Level;

/// Convert personal accounting files through the ledger book hub.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Input file to convert
    #[arg(long, value_name = "FILE")]
    pub convert: Option<PathBuf>,

    /// Output format acronym (e.g. LB-YAML, GC-XML, BEAN)
    #[arg(long, value_name = "ACRONYM")]
    pub format: Option<String>,

    /// Output file to write
    #[arg(long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Show statistics for the given file
    #[arg(long, value_name = "FILE")]
    pub stats: Option<PathBuf>,

    /// List the supported formats and exit
    #[arg(long)]
    pub list_formats: bool,

    /// Show verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

fn list_formats(out: &mut impl Write) -> Result<()> {
    let registry = FormatRegistry::new();
    let (inputs, outputs) = Converter::supported_formats();
    for format in registry.formats() {
        let readable = inputs.contains(&format.acronym);
        let writable = outputs.contains(&format.acronym);
        let direction = match (readable, writable) {
            (true, true) => "read/write",
            (true, false) => "read",
            (false, true) => "write",
            (false, false) => "detect only",
        };
        writeln!(
            out,
            "{:10} {:12} {:26} {}",
            format.acronym, format.ext, format.name, direction
        )?;
    }
    Ok(())
}

fn show_stats(path: &PathBuf, out: &mut impl Write) -> Result<()> {
    let converter = Converter::new();
    let format = converter
        .registry()
        .detect_format(path)
        .with_context(|| format!("cannot probe {}", path.display()))?
        .with_context(|| format!("unrecognized format for file: {}", path.display()))?;
    writeln!(out, "Format: {} ({})", format.name, format.acronym)?;

    let mut to_ledger = Converter::to_ledger_converter(format.acronym)?;
    to_ledger.load(path)?;
    if let Some(stats) = to_ledger.source_stats() {
        write!(out, "{stats}")?;
    }
    Ok(())
}

fn run(args: &Args, out: &mut impl Write) -> Result<()> {
    if args.list_formats {
        return list_formats(out);
    }

    if let Some(path) = &args.stats {
        return show_stats(path, out);
    }

    if let Some(input) = &args.convert {
        let Some(format) = &args.format else {
            bail!("--format is required with --convert");
        };
        let Some(output) = &args.output else {
            bail!("--output is required with --convert");
        };
        let output_format: FormatAcronym = format
            .parse()
            .with_context(|| format!("unknown output format: {format}"))?;

        let converter = Converter::new();
        let outcome = converter.convert(input, output_format, output)?;

        if args.verbose {
            writeln!(
                out,
                "converted {} ({}) to {} ({})",
                input.display(),
                outcome.input_format,
                output.display(),
                outcome.output_format
            )?;
            if let Some(stats) = &outcome.source_stats {
                writeln!(out, "source:")?;
                write!(out, "{stats}")?;
            }
            if let Some(stats) = &outcome.target_stats {
                writeln!(out, "target:")?;
                write!(out, "{stats}")?;
            }
        }
        for entry in outcome.log.entries() {
            if entry.severity != nomina_core::Severity::Info || args.verbose {
                writeln!(out, "{entry}")?;
            }
        }
        return Ok(());
    }

    bail!("nothing to do: use --convert, --stats or --list-formats")
}

/// Main entry point; returns the process exit code.
pub fn main() -> ExitCode {
    let args = Args::parse();

    if args.verbose {
        tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .init();
    }

    let mut stdout = io::stdout().lock();
    match run(&args, &mut stdout) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_to_string(args: &Args) -> Result<String> {
        let mut out = Vec::new();
        run(args, &mut out)?;
        Ok(String::from_utf8(out).unwrap())
    }

    fn base_args() -> Args {
        Args {
            convert: None,
            format: None,
            output: None,
            stats: None,
            list_formats: false,
            verbose: false,
        }
    }

    #[test]
    fn test_list_formats() {
        let args = Args {
            list_formats: true,
            ..base_args()
        };
        let text = run_to_string(&args).unwrap();
        assert!(text.contains("LB-YAML"));
        assert!(text.contains("GC-SQLITE"));
        assert!(text.contains("detect only"));
    }

    #[test]
    fn test_no_action_is_an_error() {
        let err = run_to_string(&base_args()).unwrap_err();
        assert!(err.to_string().contains("nothing to do"));
    }

    #[test]
    fn test_convert_requires_format_and_output() {
        let args = Args {
            convert: Some(PathBuf::from("x.qif")),
            ..base_args()
        };
        let err = run_to_string(&args).unwrap_err();
        assert!(err.to_string().contains("--format is required"));
    }

    #[test]
    fn test_convert_qif_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("expenses.qif");
        std::fs::write(
            &input,
            "!Account\nNCash\n^\n!Type:Cash\nD2014/1/2\nMLunch\nSExpenses:Dining\n$-7.80\n^\n",
        )
        .unwrap();
        let output = dir.path().join("expenses.yaml");

        let args = Args {
            convert: Some(input),
            format: Some("LB-YAML".to_string()),
            output: Some(output.clone()),
            ..base_args()
        };
        run_to_string(&args).unwrap();
        assert!(output.exists());
        let book = nomina_core::Book::load_yaml_file(&output).unwrap();
        assert_eq!(book.transactions.len(), 1);
    }

    #[test]
    fn test_unknown_format_acronym() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("x.qif");
        std::fs::write(&input, "!Type:Bank\n").unwrap();
        let args = Args {
            convert: Some(input),
            format: Some("NOPE".to_string()),
            output: Some(dir.path().join("out")),
            ..base_args()
        };
        let err = run_to_string(&args).unwrap_err();
        assert!(err.to_string().contains("unknown output format: NOPE"));
    }

    #[test]
    fn test_stats_for_qif() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("expenses.qif");
        std::fs::write(
            &input,
            "!Account\nNCash\n^\n!Type:Cash\nD2014/1/2\nT-7.80\n^\n",
        )
        .unwrap();
        let args = Args {
            stats: Some(input),
            ..base_args()
        };
        let text = run_to_string(&args).unwrap();
        assert!(text.contains("Quicken Interchange Format"));
        assert!(text.contains("# Transactions: 1"));
    }
}
