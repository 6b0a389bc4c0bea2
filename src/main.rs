//! composite-action-lint CLI

use std::path::PathBuf;
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::Parser;
use colored::Colorize;

use composite_action_lint::Linter;

/// Exit status: 0 clean, 1 diagnostics found, 2 bad invocation, 3 fatal.
const EXIT_FOUND: u8 = 1;
const EXIT_USAGE: u8 = 2;
const EXIT_FATAL: u8 = 3;

#[derive(Parser)]
#[command(name = "composite-action-lint")]
#[command(about = "Linter for composite GitHub Actions metadata files")]
#[command(version)]
struct Cli {
    /// Paths of action.yml / action.yaml files to check
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

fn main() -> ExitCode {
    // Initialize tracing; logs go to stderr so they never mix with
    // diagnostics on stdout
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => EXIT_USAGE,
            };
            let _ = err.print();
            return ExitCode::from(code);
        }
    };

    let mut linter = Linter::new();
    match linter.lint_files(&cli.files) {
        Ok(diags) if diags.is_empty() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::from(EXIT_FOUND),
        Err(err) => {
            eprintln!("{} {err:#}", "error:".red().bold());
            ExitCode::from(EXIT_FATAL)
        }
    }
}
