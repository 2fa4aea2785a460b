use futures::io::AsyncRead;
use pin_project_lite::pin_project;
use std::io::Result;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};

/// Observer of a transfer. All methods take `&self` so that handles which are
/// cheap to clone (progress bars, atomics behind an `Arc`) can be shared with
/// whoever renders them.
pub trait Progress {
    /// Called once, before any bytes are transferred.
    fn start(&self, total: u64);
    /// Called with the size of every successful, non-empty read.
    fn advance(&self, bytes: u64);
    /// Called once when the wrapped reader reports EOF.
    fn finish(&self);
}

impl<P: Progress + ?Sized> Progress for Arc<P> {
    fn start(&self, total: u64) {
        (**self).start(total)
    }

    fn advance(&self, bytes: u64) {
        (**self).advance(bytes)
    }

    fn finish(&self) {
        (**self).finish()
    }
}

impl<P: Progress + ?Sized> Progress for Box<P> {
    fn start(&self, total: u64) {
        (**self).start(total)
    }

    fn advance(&self, bytes: u64) {
        (**self).advance(bytes)
    }

    fn finish(&self) {
        (**self).finish()
    }
}

pin_project! {
    /// Passes reads straight through to the inner reader and tells the
    /// [`Progress`] observer about them afterwards. It never delays, buffers or
    /// resizes a read, so copies through it run at the speed of the inner
    /// reader.
    pub struct ProgressReader<R, P> {
        #[pin]
        inner: R,
        progress: P,
        total: u64,
        transferred: u64,
        finished: bool,
    }
}

impl<R, P: Progress> ProgressReader<R, P> {
    /// Wrap `inner`, reporting against an expected `total` number of bytes.
    ///
    /// [`Progress::start`] is called here, before the first byte can possibly
    /// be read.
    pub fn new(inner: R, progress: P, total: u64) -> Self {
        progress.start(total);
        Self {
            inner,
            progress,
            total,
            transferred: 0,
            finished: false,
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn transferred(&self) -> u64 {
        self.transferred
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: AsyncRead, P: Progress> AsyncRead for ProgressReader<R, P> {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut [u8]) -> Poll<Result<usize>> {
        let this = self.project();
        let read = ready!(this.inner.poll_read(cx, buf))?;
        if read > 0 {
            *this.transferred += read as u64;
            this.progress.advance(read as u64);
        } else if !buf.is_empty() && !*this.finished {
            *this.finished = true;
            this.progress.finish();
        }
        Poll::Ready(Ok(read))
    }
}
