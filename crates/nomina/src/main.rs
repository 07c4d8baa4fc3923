//! Entry point for the `nomina` binary.

use std::process::ExitCode;

fn main() -> ExitCode {
    nomina::cmd::main()
}
