use crate::commands::cat::{self, CatCommand};
use crate::commands::filestore::{self, FilestoreCommand};
use crate::error::{ErrorKind, Result, raise};
use clap::{ArgAction, Parser, Subcommand};
use stash_config::Config;
use stash_pipeline::Report;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Load this config file instead of looking in the config directory.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Log more; repeat for even more.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub async fn exec(self, cancel: CancellationToken) -> Result<Report> {
        let config = Config::load(self.config.as_deref()).map_err(|e| raise(e, ErrorKind::Config))?;
        tracing::debug!(repo = %config.repo.display(), "Loaded configuration");
        match self.command {
            Command::Cat(cmd) => cat::exec(cmd, &config, cancel).await,
            Command::Filestore(cmd) => filestore::exec(cmd, &config, cancel).await,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Write the contents of one or more objects to stdout, back to back.
    Cat(CatCommand),
    /// Interact with the filestore.
    #[command(subcommand)]
    Filestore(FilestoreCommand),
}
