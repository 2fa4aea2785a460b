use futures::io::AsyncRead;
use std::collections::VecDeque;
use std::io::Result;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

/// A type-erased reader that can be moved into a spawned task.
pub type BoxAsyncRead = Box<dyn AsyncRead + Send + Unpin + 'static>;

/// Reads from each inner reader in turn until it is exhausted, then moves on
/// to the next one. Equivalent to chaining [`AsyncReadExt::chain`](futures::io::AsyncReadExt::chain)
/// an arbitrary number of times, without the nested types.
///
/// # Examples
///
/// ```
/// use futures::io::{AsyncReadExt, Cursor};
/// use stash_asyncutils::MultiReader;
///
/// # futures::executor::block_on(async {
/// let mut reader = MultiReader::new([
///     Box::new(Cursor::new(b"hello ".to_vec())) as _,
///     Box::new(Cursor::new(b"world".to_vec())) as _,
/// ]);
/// let mut out = String::new();
/// reader.read_to_string(&mut out).await.unwrap();
/// assert_eq!(out, "hello world");
/// # });
/// ```
#[derive(Default)]
pub struct MultiReader {
    readers: VecDeque<BoxAsyncRead>,
}

impl MultiReader {
    pub fn new(readers: impl IntoIterator<Item = BoxAsyncRead>) -> Self {
        Self { readers: readers.into_iter().collect() }
    }

    pub fn push(&mut self, reader: BoxAsyncRead) {
        self.readers.push_back(reader);
    }

    /// Number of readers that have not been exhausted yet.
    pub fn remaining(&self) -> usize {
        self.readers.len()
    }
}

impl AsyncRead for MultiReader {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut [u8]) -> Poll<Result<usize>> {
        // A zero-length read would look like EOF and drop a reader that still
        // has data in it.
        if buf.is_empty() {
            return Poll::Ready(Ok(0));
        }
        let this = self.get_mut();
        while let Some(reader) = this.readers.front_mut() {
            match ready!(Pin::new(reader).poll_read(cx, buf))? {
                0 => {
                    this.readers.pop_front();
                },
                n => return Poll::Ready(Ok(n)),
            }
        }
        Poll::Ready(Ok(0))
    }
}
