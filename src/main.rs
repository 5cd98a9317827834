//! CLI entry point for the sproket tool.

use std::process::ExitCode;

use clap::Parser;
use tracing::debug;

mod app;
mod cli;

use cli::Args;

/// Process exit outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProcessExit {
    /// Every job succeeded, or the run stopped by policy (count, threshold).
    Success,
    /// Some jobs failed while others succeeded.
    Partial,
    /// Fatal error, or every job failed.
    Failure,
}

impl ProcessExit {
    pub(crate) fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
            Self::Partial => 2,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    app::terminal::init_tracing(app::terminal::default_log_level(args.verbose, args.quiet));
    debug!(?args, "CLI arguments parsed");

    let outcome = match app::runtime::run(args).await {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("error: {e:#}");
            ProcessExit::Failure
        }
    };
    ExitCode::from(outcome.code())
}
