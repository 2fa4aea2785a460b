//! Producers: turn a command's input into an ordered [`ResultStream`].

use crate::channel::{self, ResultStream};
use crate::error::ErrorKind;
use futures::{Stream, StreamExt};
use stash_store::{Cid, ListRes, StoreHandle, parse_key};
use std::fmt::Display;
use std::future::Future;
use std::pin::pin;
use tokio_util::sync::CancellationToken;

/// How many results may be waiting for the consumer before the producer has
/// to wait for it to catch up.
pub const CHANNEL_CAPACITY: usize = 128;

/// Results that can describe an argument that isn't a valid key.
pub trait FromInvalidKey {
    fn invalid_key(input: &str, reason: &dyn Display) -> Self;
}

impl FromInvalidKey for ListRes {
    fn invalid_key(input: &str, reason: &dyn Display) -> Self {
        ListRes::other_error(None, format!("{input}: {reason}"))
    }
}

/// Run `action` for each argument in order, yielding one result per
/// argument.
///
/// Arguments that don't parse as keys never reach `action`; their slot gets
/// a [`FromInvalidKey::invalid_key`] result instead and processing carries
/// on with the next argument. No new action is started once `cancel` fires.
///
/// # Examples
///
/// ```no_run
/// use futures::StreamExt;
/// use stash_pipeline::per_key_action;
/// use stash_store::StoreHandle;
/// use tokio_util::sync::CancellationToken;
/// # async fn example(store: StoreHandle) {
///
/// let args = vec!["bafkr4i...".to_string(), "not-a-key".to_string()];
/// let mut results = per_key_action(args, move |key| {
///     let store = store.clone();
///     async move { store.list(&key).await }
/// }, CancellationToken::new());
/// while let Some(Ok(record)) = results.next().await {
///     println!("{}", record.format_long());
/// }
/// # }
/// ```
pub fn per_key_action<T, I, A, Fut>(args: I, mut action: A, cancel: CancellationToken) -> ResultStream<T>
where
    T: FromInvalidKey + Send + 'static,
    I: IntoIterator<Item = String>,
    I::IntoIter: Send + 'static,
    A: FnMut(Cid) -> Fut + Send + 'static,
    Fut: Future<Output = T> + Send,
{
    let args = args.into_iter();
    channel::spawn(cancel, move |tx| async move {
        for arg in args {
            if tx.is_closed() {
                break;
            }
            let result = match parse_key(&arg) {
                Ok(key) => match tx.unless_cancelled(action(key)).await {
                    Some(result) => result,
                    None => break,
                },
                Err(e) => {
                    tracing::debug!(input = %arg, error = %e, "Argument is not a valid key");
                    T::invalid_key(&arg, &e)
                },
            };
            if !tx.send(result).await {
                break;
            }
        }
    })
}

/// Forward every item of a lazily-evaluated `source` in order.
///
/// `source` is only polled while there is room for its output, and is
/// dropped (not drained) once `cancel` fires.
pub fn drain<T, S>(source: S, cancel: CancellationToken) -> ResultStream<T>
where
    T: Send + 'static,
    S: Stream<Item = T> + Send + 'static,
{
    channel::spawn(cancel, move |tx| async move {
        let mut source = pin!(source);
        while let Some(Some(item)) = tx.unless_cancelled(source.next()).await {
            if !tx.send(item).await {
                return;
            }
        }
    })
}

/// Every filestore key that the main block store also holds a copy of, in
/// key order.
///
/// Failing to enumerate or look up a key is fatal: the error is sent in its
/// place and nothing follows it.
pub fn duplicates(store: StoreHandle, cancel: CancellationToken) -> ResultStream<Cid> {
    channel::spawn(cancel, move |tx| async move {
        let mut keys = match store.keys() {
            Ok(keys) => keys,
            Err(err) => {
                tx.fail(store_failure(err)).await;
                return;
            },
        };
        while let Some(Some(key)) = tx.unless_cancelled(keys.next()).await {
            let found = match key {
                Ok(key) => store.has_block(&key).await.map(|found| found.then_some(key)),
                Err(err) => Err(err),
            };
            let sent = match found {
                Ok(Some(key)) => tx.send(key).await,
                Ok(None) => true,
                Err(err) => {
                    tx.fail(store_failure(err)).await;
                    return;
                },
            };
            if !sent {
                return;
            }
        }
    })
}

fn store_failure(err: stash_store::error::Error) -> crate::error::Error {
    let message = (*err).to_string();
    err.raise(ErrorKind::Store(message))
}
