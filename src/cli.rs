//! Command-line interface for mixbool.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "mixbool")]
#[command(about = "Mixed Boolean-Arithmetic program mutator", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Rewrite instructions of a program into equivalent MBA expressions
    Mutate {
        /// Program in textual IR form
        file: PathBuf,

        /// Seed for the random generator
        #[arg(long, default_value_t = 0)]
        seed: u64,

        /// Number of mutation rounds
        #[arg(long, default_value_t = 1)]
        rounds: usize,

        /// Upper bound on instructions rewritten per round
        #[arg(long, default_value_t = 7)]
        max_mutations: usize,

        /// Check equivalence on this many random inputs
        #[arg(long, default_value_t = 0)]
        check: usize,

        /// Print a JSON report of the applied rewrites to stderr
        #[arg(long)]
        report: bool,
    },

    /// Interpret a program on the given inputs
    Run {
        /// Program in textual IR form
        file: PathBuf,

        /// Input values, one per program input (`-3`, `0x7f`, `true`, ...)
        #[arg(allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// List the rewrite templates
    Catalog {
        /// Check every template against its operator on all 8-bit inputs
        #[arg(long)]
        verify: bool,
    },
}
