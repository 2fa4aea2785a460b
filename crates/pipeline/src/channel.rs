//! Bounded, ordered, cancellable result channel.
//!
//! [`spawn`] runs a producer on its own task and hands back the consuming
//! half as a [`ResultStream`]. The buffer between them is bounded, so a slow
//! consumer slows the producer down instead of letting results pile up.

use crate::dispatch::CHANNEL_CAPACITY;
use crate::error::{Error, Result};
use futures::Stream;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Run `produce` on a new task, feeding a [`ResultStream`].
///
/// The stream ends when `produce` returns (dropping its sender), or as soon
/// as `cancel` fires, whichever comes first. Dropping the stream aborts the
/// producer.
///
/// Must be called from within a tokio runtime.
pub fn spawn<T, F, Fut>(cancel: CancellationToken, produce: F) -> ResultStream<T>
where
    T: Send + 'static,
    F: FnOnce(ResultSender<T>) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);
    let producer = tokio::spawn(produce(ResultSender {
        sender,
        cancel: cancel.clone(),
    }));
    ResultStream {
        receiver,
        cancel,
        producer: Some(producer),
    }
}

/// Producing half of a result channel.
pub struct ResultSender<T> {
    sender: mpsc::Sender<Result<T>>,
    cancel: CancellationToken,
}

impl<T> ResultSender<T> {
    /// Queue a result, waiting for buffer space if necessary.
    ///
    /// Returns `false` if the result was not delivered because the request
    /// was cancelled or nobody is listening any more. Either way the producer
    /// should stop.
    pub async fn send(&self, item: T) -> bool {
        self.deliver(Ok(item)).await
    }

    /// Queue a fatal error. Producers should return straight afterwards.
    pub async fn fail(&self, err: Error) -> bool {
        self.deliver(Err(err)).await
    }

    async fn deliver(&self, item: Result<T>) -> bool {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            sent = self.sender.send(item) => sent.is_ok(),
        }
    }

    /// Run `work` unless, or until, the request is cancelled. Returns `None`
    /// if it was.
    pub async fn unless_cancelled<F: Future>(&self, work: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            _ = self.sender.closed() => None,
            output = work => Some(output),
        }
    }

    /// Whether the producer should stop before starting anything new.
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled() || self.sender.is_closed()
    }
}

/// Consuming half of a result channel. Yields results in the order the
/// producer sent them.
///
/// Cancellation is checked on every poll: once the token fires the stream
/// ends, even if results are still buffered. An early end looks exactly like
/// a clean one.
pub struct ResultStream<T> {
    receiver: mpsc::Receiver<Result<T>>,
    cancel: CancellationToken,
    producer: Option<JoinHandle<()>>,
}

impl<T> ResultStream<T> {
    /// Whether this stream's request has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// The token this stream stops on.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }
}

impl<T> Stream for ResultStream<T> {
    type Item = Result<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.cancel.is_cancelled() {
            this.receiver.close();
            return Poll::Ready(None);
        }
        this.receiver.poll_recv(cx)
    }
}

impl<T> Drop for ResultStream<T> {
    fn drop(&mut self) {
        if let Some(producer) = self.producer.take() {
            producer.abort();
        }
    }
}
