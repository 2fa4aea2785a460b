//! Consumers: turn a [`ResultStream`] into output.

use crate::assemble::Payload;
use crate::channel::ResultStream;
use crate::error::{Error, ErrorKind, Result};
use crate::present::present;
use exn::ResultExt;
use futures::io::AsyncWrite;
use futures::{Stream, StreamExt};
use stash_asyncutils::Progress;
use stash_store::{Cid, ListRes};
use std::fmt;

/// Reported once a stream finishes with at least one soft failure.
pub const PARTIAL_FAILURE: &str = "errors while displaying some entries";

/// A result record as far as the bridge cares: something that may carry a
/// soft failure, and that can be named in a failure summary.
pub trait Entry {
    /// The per-record error message, if this record describes a failure.
    fn soft_failure(&self) -> Option<&str>;

    /// How this record is named when listing failures.
    fn label(&self) -> String;
}

impl Entry for ListRes {
    fn soft_failure(&self) -> Option<&str> {
        self.is_error().then_some(self.error_msg.as_str())
    }

    fn label(&self) -> String {
        match &self.key {
            Some(key) => key.to_string(),
            None => self.error_msg.split(':').next().unwrap_or_default().to_string(),
        }
    }
}

impl Entry for Cid {
    fn soft_failure(&self) -> Option<&str> {
        None
    }

    fn label(&self) -> String {
        self.to_string()
    }
}

/// Where records end up.
pub trait Emitter<T> {
    /// Write a successful record.
    fn emit(&mut self, item: &T) -> std::io::Result<()>;

    /// Write a record carrying a soft failure, along with its message.
    fn diagnose(&mut self, item: &T, message: &str) -> std::io::Result<()>;
}

/// How a bridged stream went.
#[derive(Debug)]
pub enum Report {
    /// Everything was emitted and nothing failed (or the request was
    /// cancelled).
    Clean,
    /// Everything was emitted, but some records described failures.
    Warnings { failed: Vec<String> },
    /// Emission stopped early on a fatal error.
    Failed(Error),
}

impl Report {
    pub fn is_clean(&self) -> bool {
        matches!(self, Self::Clean)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clean => f.write_str("ok"),
            Self::Warnings { .. } => f.write_str(PARTIAL_FAILURE),
            Self::Failed(err) => write!(f, "{err}"),
        }
    }
}

/// Remote errors and broken response contracts are reported as they are; any
/// other failure to pull the next result is reported as a failed stream.
fn classify(err: Error) -> Error {
    if matches!(&*err, ErrorKind::Remote { .. } | ErrorKind::Stream(_) | ErrorKind::Contract(_)) {
        return err;
    }
    let message = ErrorKind::to_string(&err);
    err.raise(ErrorKind::Stream(message))
}

/// Pull records from `stream` in order and hand each to `emitter`.
///
/// Records carrying a soft failure are routed to [`Emitter::diagnose`] and
/// remembered; emission carries on. A fatal error from the stream, or a
/// failure to write, stops emission immediately.
pub async fn bridge<T, S, E>(mut stream: S, emitter: &mut E) -> Report
where
    T: Entry,
    S: Stream<Item = Result<T>> + Unpin,
    E: Emitter<T> + ?Sized,
{
    let mut failed = Vec::new();
    while let Some(next) = stream.next().await {
        let item = match next {
            Ok(item) => item,
            Err(err) => return Report::Failed(classify(err)),
        };
        let written = match item.soft_failure() {
            Some(message) => {
                failed.push(item.label());
                emitter.diagnose(&item, message)
            },
            None => emitter.emit(&item),
        };
        if let Err(err) = written.or_raise(|| ErrorKind::Emit) {
            return Report::Failed(err);
        }
    }
    if failed.is_empty() {
        Report::Clean
    } else {
        tracing::debug!(count = failed.len(), "Some entries failed");
        Report::Warnings { failed }
    }
}

/// Copy the single payload a fetch stream yields into `sink`, then close
/// `sink`.
///
/// Nothing is decided before the first result is pulled: only then is the
/// payload's declared length known, which decides (see [`present`]) whether
/// `progress` is asked for an observer.
pub async fn bridge_payload<W, P, F>(mut stream: ResultStream<Payload>, sink: &mut W, progress: F) -> Report
where
    W: AsyncWrite + Unpin + ?Sized,
    P: Progress,
    F: FnOnce(u64) -> P,
{
    let payload = match stream.next().await {
        Some(Ok(payload)) => payload,
        Some(Err(err)) => return Report::Failed(classify(err)),
        None if stream.is_cancelled() => return Report::Clean,
        None => {
            let err = exn::Exn::from(ErrorKind::Contract("response ended without a payload".to_string()));
            return Report::Failed(err);
        },
    };
    let plan = present(payload.length, payload.reader, progress);
    tracing::debug!(length = payload.length, direct = plan.is_direct(), "Presenting payload");
    let cancel = stream.cancellation().clone();
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Report::Clean,
        copied = plan.copy_into(sink) => match copied {
            Ok(_) => Report::Clean,
            Err(err) => Report::Failed(err),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::{ResultStream, channel, drain, per_key_action};
    use futures::stream;
    use rstest::rstest;
    use stash_asyncutils::MultiReader;
    use stash_store::backend::MockFilestore;
    use stash_store::{BlockRef, Filestore, Status, block_cid};
    use std::cell::Cell;
    use std::io::{Error as IoError, ErrorKind as IoErrorKind};
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    #[derive(Default)]
    struct Recorder {
        emitted: Vec<String>,
        diagnosed: Vec<String>,
        fail_after: Option<usize>,
    }

    impl Recorder {
        fn check(&self) -> std::io::Result<()> {
            match self.fail_after {
                Some(n) if self.emitted.len() + self.diagnosed.len() >= n => Err(IoError::from(IoErrorKind::BrokenPipe)),
                _ => Ok(()),
            }
        }
    }

    impl<T: Entry> Emitter<T> for Recorder {
        fn emit(&mut self, item: &T) -> std::io::Result<()> {
            self.check()?;
            self.emitted.push(item.label());
            Ok(())
        }

        fn diagnose(&mut self, item: &T, _message: &str) -> std::io::Result<()> {
            self.check()?;
            self.diagnosed.push(item.label());
            Ok(())
        }
    }

    fn record(n: u8) -> ListRes {
        ListRes::ok(block_cid(&[n]).unwrap(), &BlockRef::new("/f", u64::from(n), 1))
    }

    fn broken(n: u8) -> ListRes {
        ListRes::with_status(block_cid(&[n]).unwrap(), &BlockRef::new("/f", 0, 1), Status::FileNotFound, "/f: gone")
    }

    #[tokio::test]
    async fn test_all_ok_is_clean() {
        let mut out = Recorder::default();
        let report = bridge(stream::iter([record(1), record(2)].map(Ok)), &mut out).await;
        assert!(report.is_clean());
        assert_eq!(out.emitted.len(), 2);
    }

    #[tokio::test]
    async fn test_one_soft_failure_among_successes() {
        let records = vec![record(1), record(2), broken(3), record(4), record(5)];
        let mut out = Recorder::default();
        let report = bridge(stream::iter(records.into_iter().map(Ok)), &mut out).await;

        assert_eq!(out.emitted.len(), 4);
        assert_eq!(out.diagnosed, vec![block_cid(&[3]).unwrap().to_string()]);
        let Report::Warnings { failed } = &report else {
            panic!("expected warnings, got {report:?}");
        };
        assert_eq!(failed.len(), 1);
        assert_eq!(report.to_string(), PARTIAL_FAILURE);
    }

    #[test]
    fn test_invalid_key_label() {
        let invalid: ListRes = crate::FromInvalidKey::invalid_key("bad", &"selected encoding not supported");
        assert_eq!(invalid.label(), "bad");
    }

    #[tokio::test]
    async fn test_empty_stream_is_clean() {
        let mut out = Recorder::default();
        let report = bridge(stream::iter(Vec::<Result<ListRes>>::new()), &mut out).await;
        assert!(report.is_clean());
    }

    #[rstest]
    #[case::remote(ErrorKind::Remote { message: "boom".to_string(), code: ErrorCode::Client }, "boom", ErrorCode::Client)]
    #[case::contract(
        ErrorKind::Contract("no payload".to_string()),
        "unexpected response: no payload",
        ErrorCode::Implementation
    )]
    #[case::other(ErrorKind::Store("index unreadable".to_string()), "index unreadable", ErrorCode::Normal)]
    #[tokio::test]
    async fn test_fatal_error_stops_emission(#[case] kind: ErrorKind, #[case] message: &str, #[case] code: ErrorCode) {
        let items = vec![Ok(record(1)), Err(exn::Exn::from(kind)), Ok(record(2))];
        let mut out = Recorder::default();
        let report = bridge(stream::iter(items), &mut out).await;

        assert_eq!(out.emitted.len(), 1);
        let Report::Failed(err) = report else {
            panic!("expected a failure");
        };
        assert_eq!(err.to_string(), message);
        assert_eq!(err.code(), code);
    }

    #[tokio::test]
    async fn test_write_failure_is_fatal() {
        let mut out = Recorder {
            fail_after: Some(1),
            ..Default::default()
        };
        let report = bridge(stream::iter([record(1), record(2), record(3)].map(Ok)), &mut out).await;
        assert!(matches!(&report, Report::Failed(err) if matches!(&**err, ErrorKind::Emit)));
        assert_eq!(out.emitted.len(), 1);
    }

    #[tokio::test]
    async fn test_bridge_is_repeatable() {
        let store = Arc::new(MockFilestore::with_files([("/a", b"alpha".to_vec()), ("/b", b"bravo".to_vec())]));
        store.remove_file("/b");
        let keys = vec![
            block_cid(b"alpha").unwrap().to_string(),
            "bad".to_string(),
            block_cid(b"bravo").unwrap().to_string(),
        ];
        let verify = || {
            let store = Arc::clone(&store);
            per_key_action(
                keys.clone(),
                move |key| {
                    let store = Arc::clone(&store);
                    async move { store.verify(&key).await }
                },
                CancellationToken::new(),
            )
        };
        let verify_all = || drain(store.verify_all().unwrap(), CancellationToken::new());

        assert_repeatable(verify).await;
        assert_repeatable(verify_all).await;
    }

    async fn assert_repeatable(records: impl Fn() -> ResultStream<ListRes>) {
        let (mut first, mut second) = (Recorder::default(), Recorder::default());
        let a = bridge(records(), &mut first).await;
        let b = bridge(records(), &mut second).await;
        let (Report::Warnings { failed: a_failed }, Report::Warnings { failed: b_failed }) = (&a, &b) else {
            panic!("expected warnings, got {a:?} and {b:?}");
        };
        assert_eq!(a_failed, b_failed);
        assert_eq!(a.to_string(), b.to_string());
        assert_eq!(first.emitted, second.emitted);
        assert_eq!(first.diagnosed, second.diagnosed);
    }

    #[derive(Default)]
    struct Counter {
        started: Cell<Option<u64>>,
        bytes: Cell<u64>,
    }

    impl Progress for &Counter {
        fn start(&self, total: u64) {
            self.started.set(Some(total));
        }

        fn advance(&self, bytes: u64) {
            self.bytes.set(self.bytes.get() + bytes);
        }

        fn finish(&self) {}
    }

    fn payload_of(parts: Vec<Vec<u8>>) -> Payload {
        let length = parts.iter().map(|p| p.len() as u64).sum();
        let mut reader = MultiReader::default();
        for part in parts {
            reader.push(Box::new(futures::io::Cursor::new(part)));
        }
        Payload { reader, length }
    }

    #[rstest]
    #[case::small(1024, false)]
    #[case::large(9 * 1024 * 1024, true)]
    #[tokio::test]
    async fn test_payload_presentation(#[case] size: usize, #[case] with_progress: bool) {
        let payload = payload_of(vec![vec![7; size]]);
        let stream = channel::spawn(CancellationToken::new(), |tx| async move {
            tx.send(payload).await;
        });
        let counter = Counter::default();
        let mut sink = futures::io::Cursor::new(Vec::new());
        let report = bridge_payload(stream, &mut sink, |_| &counter).await;

        assert!(report.is_clean());
        assert_eq!(sink.into_inner().len(), size);
        assert_eq!(counter.started.get().is_some(), with_progress);
        if with_progress {
            assert_eq!(counter.bytes.get(), size as u64);
        }
    }

    #[tokio::test]
    async fn test_payload_failure() {
        let stream = channel::spawn::<Payload, _, _>(CancellationToken::new(), |tx| async move {
            tx.fail(exn::Exn::from(ErrorKind::Lookup("/stash/nope".to_string()))).await;
        });
        let counter = Counter::default();
        let mut sink = futures::io::Cursor::new(Vec::new());
        let report = bridge_payload(stream, &mut sink, |_| &counter).await;
        assert!(matches!(&report, Report::Failed(err) if matches!(&**err, ErrorKind::Stream(m) if m == "could not resolve /stash/nope")));
        assert!(sink.into_inner().is_empty());
    }

    #[tokio::test]
    async fn test_payload_missing_is_a_contract_violation() {
        let stream = channel::spawn::<Payload, _, _>(CancellationToken::new(), |_tx| async move {});
        let counter = Counter::default();
        let mut sink = futures::io::Cursor::new(Vec::new());
        let report = bridge_payload(stream, &mut sink, |_| &counter).await;
        assert!(matches!(&report, Report::Failed(err) if err.code() == ErrorCode::Implementation));
    }

    #[tokio::test]
    async fn test_payload_cancelled_is_clean() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let stream = channel::spawn(cancel, |tx| async move {
            tx.send(payload_of(vec![b"never".to_vec()])).await;
        });
        let counter = Counter::default();
        let mut sink = futures::io::Cursor::new(Vec::new());
        let report = bridge_payload(stream, &mut sink, |_| &counter).await;
        assert!(report.is_clean());
        assert!(sink.into_inner().is_empty());
    }
}
