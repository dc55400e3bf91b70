//! tally-report: merge per-process metric files and print one report.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use tally_core::registry;
use tally_report::{aggregate, cli::Args};

fn main() -> ExitCode {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let result = aggregate::merge_files(&args.inputs);
    for (path, err) in &result.failures {
        eprintln!("{}", aggregate::describe_failure(path, err));
    }

    if let Some(output) = &args.output {
        if let Err(e) = aggregate::write_merged(output) {
            eprintln!("{}", aggregate::describe_failure(output, &e));
            return ExitCode::FAILURE;
        }
        tracing::info!(path = %output.display(), "merged metrics written");
    }

    if !args.quiet {
        print!("{}", registry::report());
    }

    if result.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
