//! mixbool CLI entry point.

mod cli;

use std::path::Path;

use clap::Parser;
use cli::{Cli, Command};
use mixbool::mutators::{Catalog, MutatorConfig};
use mixbool::pipeline::{self, MutateOptions, PipelineError};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Mutate {
            file,
            seed,
            rounds,
            max_mutations,
            check,
            report,
        } => {
            let options = MutateOptions {
                seed,
                rounds,
                check,
                config: MutatorConfig::default().with_max_simultaneous_mutations(max_mutations),
            };
            mutate_file(&file, &options, report)
        }
        Command::Run { file, args } => run_file(&file, &args),
        Command::Catalog { verify } => list_catalog(verify),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn read_source(path: &Path) -> Result<String, PipelineError> {
    Ok(std::fs::read_to_string(path)?)
}

fn mutate_file(path: &Path, options: &MutateOptions, report: bool) -> Result<(), PipelineError> {
    let source = read_source(path)?;
    let outcome = pipeline::mutate_source(&source, options)?;
    print!("{}", outcome.program);
    if report {
        match serde_json::to_string_pretty(&outcome.reports) {
            Ok(json) => eprintln!("{json}"),
            Err(e) => eprintln!("failed to serialize report: {e}"),
        }
    }
    if outcome.checked > 0 {
        eprintln!("equivalent on {} random input(s)", outcome.checked);
    }
    Ok(())
}

fn run_file(path: &Path, args: &[String]) -> Result<(), PipelineError> {
    let source = read_source(path)?;
    let values = pipeline::run_source(&source, args)?;
    println!("{}", pipeline::join(&values));
    Ok(())
}

fn list_catalog(verify: bool) -> Result<(), PipelineError> {
    let entries = pipeline::describe_catalog(&Catalog::standard(), verify);
    for entry in &entries {
        println!("{entry}");
    }
    let failed = entries
        .iter()
        .filter(|entry| matches!(entry.verdict, Some(Err(_))))
        .count();
    if failed > 0 {
        eprintln!("{failed} template(s) failed verification");
        std::process::exit(2);
    }
    Ok(())
}
