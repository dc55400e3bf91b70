//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// Merge metric files written by worker processes and print one report.
#[derive(Parser, Debug)]
#[command(name = "tally-report")]
#[command(version, about = "Merge per-process metric files into one report")]
pub struct Args {
    /// Metric files to merge, in order (`.json` for JSON, YAML otherwise)
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Also write the merged metrics to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Do not print the report
    #[arg(short, long)]
    pub quiet: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_inputs_and_flags() {
        let args = Args::parse_from(["tally-report", "-o", "all.yaml", "a.yaml", "b.json"]);
        assert_eq!(args.inputs, vec![PathBuf::from("a.yaml"), PathBuf::from("b.json")]);
        assert_eq!(args.output, Some(PathBuf::from("all.yaml")));
        assert!(!args.quiet);
    }

    #[test]
    fn inputs_are_required() {
        assert!(Args::try_parse_from(["tally-report", "--quiet"]).is_err());
    }
}
