mod cli;
mod commands;
mod error;
mod output;
mod progress;

use crate::cli::Cli;
use clap::Parser;
use stash_pipeline::Report;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    initialize_logging(cli.verbose);

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_interrupt(cancel.clone()));

    match cli.exec(cancel).await {
        Ok(report) => exit_code(&report),
        Err(err) => {
            eprintln!("Error: {}", *err);
            tracing::debug!("{err:?}");
            ExitCode::from(2)
        },
    }
}

/// Log to stderr; stdout is reserved for command output. `RUST_LOG` wins
/// over `-v`.
fn initialize_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

async fn cancel_on_interrupt(cancel: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::debug!("Interrupted, cancelling");
            cancel.cancel();
        },
        Err(e) => tracing::warn!(error = %e, "Could not listen for interrupts"),
    }
}

fn exit_code(report: &Report) -> ExitCode {
    match report {
        Report::Clean => ExitCode::SUCCESS,
        Report::Warnings { failed } => {
            tracing::debug!(?failed, "Entries that failed");
            eprintln!("Error: {report}");
            ExitCode::from(1)
        },
        Report::Failed(err) => {
            eprintln!("Error: {}", **err);
            tracing::debug!("{err:?}");
            ExitCode::from(2)
        },
    }
}
