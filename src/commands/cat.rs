use crate::error::{ErrorKind, Result, raise};
use crate::progress::Bar;
use clap::Args;
use stash_config::Config;
use stash_pipeline::{Report, ResultStream, assemble, bridge_payload, channel};
use stash_store::StoreHandle;
use std::sync::Arc;
use tokio_util::compat::TokioAsyncWriteCompatExt;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Args)]
pub struct CatCommand {
    /// Objects to print, as `<cid>` or `/stash/<cid>`.
    #[arg(required = true)]
    pub paths: Vec<String>,
}

pub async fn exec(cmd: CatCommand, config: &Config, cancel: CancellationToken) -> Result<Report> {
    let store = stash_store::open(config).await.map_err(|e| raise(e, ErrorKind::Store))?;
    let payload = fetch(store, cmd.paths, cancel);
    let visible = config.progress;
    let mut stdout = tokio::io::stdout().compat_write();
    Ok(bridge_payload(payload, &mut stdout, |length| Bar::for_payload(length, visible)).await)
}

/// Resolve every path and send back a single payload joining them, or the
/// first lookup failure.
fn fetch(store: StoreHandle, paths: Vec<String>, cancel: CancellationToken) -> ResultStream<stash_pipeline::Payload> {
    channel::spawn(cancel, move |tx| async move {
        let assembled = assemble(paths, |path| {
            let store = Arc::clone(&store);
            async move { store.fetch(&path).await }
        })
        .await;
        match assembled {
            Ok(payload) => tx.send(payload).await,
            Err(err) => tx.fail(err).await,
        };
    })
}
