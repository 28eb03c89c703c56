//! CLI argument validation (spec.md §6: "Invocation takes no arguments").
//!
//! `Cli` declares no fields, so `clap`'s derive rejects anything beyond the
//! program name itself — positionals, flags, even `--help`/`--version` —
//! which matches the contract literally: any argument is an error.

use clap::Parser;

#[derive(Parser)]
#[command(name = "jsh", about = "An interactive command shell")]
struct Cli;

/// Exits the process with code 1 if the shell was invoked with any
/// arguments; otherwise returns.
pub fn parse() {
    if Cli::try_parse().is_err() {
        eprintln!("jsh: no arguments supported");
        std::process::exit(1);
    }
}
