use crate::error::{ErrorKind, Result, raise};
use crate::output::{Keys, Listing, Verification};
use clap::{Args, Subcommand};
use stash_config::Config;
use stash_pipeline::{Report, ResultStream, bridge, channel, drain, duplicates, per_key_action};
use stash_store::{Filestore, ListRes, LocalFilestore, StoreHandle};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Subcommand)]
pub enum FilestoreCommand {
    /// List objects in the filestore, or only the given ones.
    Ls(KeysCommand),
    /// Check that the backing files still hold the referenced data.
    Verify(KeysCommand),
    /// List objects that are in the filestore and the block store.
    Dups,
    /// Reference files from the filestore without copying them.
    Add(AddCommand),
}

#[derive(Debug, Args)]
pub struct KeysCommand {
    /// Keys to look at. All of them when none are given.
    pub keys: Vec<String>,
}

#[derive(Debug, Args)]
pub struct AddCommand {
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

pub async fn exec(cmd: FilestoreCommand, config: &Config, cancel: CancellationToken) -> Result<Report> {
    let report = match cmd {
        FilestoreCommand::Ls(KeysCommand { keys }) => {
            let records = records(open(config).await?, keys, Mode::List, cancel)?;
            bridge(records, &mut Listing::new(std::io::stdout(), std::io::stderr())).await
        },
        FilestoreCommand::Verify(KeysCommand { keys }) => {
            let records = records(open(config).await?, keys, Mode::Verify, cancel)?;
            bridge(records, &mut Verification::new(std::io::stdout(), std::io::stderr())).await
        },
        FilestoreCommand::Dups => bridge(duplicates(open(config).await?, cancel), &mut Keys::new(std::io::stdout())).await,
        FilestoreCommand::Add(AddCommand { files }) => {
            let store = stash_store::open_local(config).await.map_err(|e| raise(e, ErrorKind::Store))?;
            let added = add_files(store, absolute(files)?, cancel);
            bridge(added, &mut Listing::new(std::io::stdout(), std::io::stderr())).await
        },
    };
    Ok(report)
}

async fn open(config: &Config) -> Result<StoreHandle> {
    stash_store::open(config).await.map_err(|e| raise(e, ErrorKind::Store))
}

#[derive(Clone, Copy, Debug)]
enum Mode {
    List,
    Verify,
}

/// One record per key, or one per reference when no keys are given.
fn records(store: StoreHandle, keys: Vec<String>, mode: Mode, cancel: CancellationToken) -> Result<ResultStream<ListRes>> {
    if !keys.is_empty() {
        return Ok(per_key_action(
            keys,
            move |key| {
                let store = Arc::clone(&store);
                async move {
                    match mode {
                        Mode::List => store.list(&key).await,
                        Mode::Verify => store.verify(&key).await,
                    }
                }
            },
            cancel,
        ));
    }
    let source = match mode {
        Mode::List => store.list_all(),
        Mode::Verify => store.verify_all(),
    };
    Ok(drain(source.map_err(|e| raise(e, ErrorKind::Store))?, cancel))
}

fn absolute(files: Vec<PathBuf>) -> Result<Vec<PathBuf>> {
    files
        .into_iter()
        .map(|file| {
            std::path::absolute(&file).map_err(|e| exn::Exn::from(ErrorKind::InvalidFile(file.clone(), e.to_string())))
        })
        .collect()
}

fn add_files(store: LocalFilestore, files: Vec<PathBuf>, cancel: CancellationToken) -> ResultStream<ListRes> {
    channel::spawn(cancel, move |tx| async move {
        for file in files {
            let added = match tx.unless_cancelled(store.add_file(&file)).await {
                Some(Ok(added)) => added,
                Some(Err(err)) => {
                    let message = (*err).to_string();
                    tx.fail(err.raise(stash_pipeline::error::ErrorKind::Store(message))).await;
                    return;
                },
                None => return,
            };
            for record in added {
                if !tx.send(record).await {
                    return;
                }
            }
        }
    })
}
