//! Filestore trait and implementations.
//!
//! A filestore keeps *references* to byte ranges of ordinary files instead of
//! copies of the data. Next to it lives the main block store, which does hold
//! copies. The [`Filestore`] trait exposes both, because listing duplicates
//! and fetching objects need to look at both.

mod local;
#[cfg(feature = "mock")]
mod mock;

pub use self::local::LocalFilestore;
#[cfg(feature = "mock")]
pub use self::mock::MockFilestore;
use crate::error::{ErrorKind, Result};
use crate::index::BlockRef;
use crate::key::{Cid, block_cid, parse_key};
use crate::status::{ListRes, Status};
use async_trait::async_trait;
use futures::Stream;
use stash_asyncutils::BoxAsyncRead;
use std::fmt;
use std::pin::Pin;

/// Records produced by a whole-store listing. Owns everything it needs, so it
/// can be moved into a spawned task.
pub type ListResStream = Pin<Box<dyn Stream<Item = ListRes> + Send + 'static>>;
/// Every key referenced by the filestore.
pub type KeyStream = Pin<Box<dyn Stream<Item = Result<Cid>> + Send + 'static>>;

/// An object opened for reading, along with the number of bytes the reader
/// will produce.
pub struct Fetched {
    pub reader: BoxAsyncRead,
    pub size: u64,
}

impl fmt::Debug for Fetched {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fetched").field("size", &self.size).finish_non_exhaustive()
    }
}

/// Unified interface for filestore backends.
///
/// Per-key operations ([`list`](Self::list), [`verify`](Self::verify)) never
/// fail: every outcome, including "something went badly wrong", is reported
/// as a [`ListRes`] so that one bad key never aborts a batch. Operations that
/// open the store or an object return [`Result`]s.
///
/// # Examples
///
/// ```
/// use futures::StreamExt;
/// use stash_store::{Filestore, Status};
/// # async fn example(store: &dyn Filestore) -> stash_store::error::Result<()> {
///
/// let mut records = store.verify_all()?;
/// while let Some(record) = records.next().await {
///     if record.status != Status::Ok {
///         println!("{} {}", record.status, record.format_long());
///     }
/// }
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait Filestore: Send + Sync {
    /// Name of the store, used for logging only.
    fn name(&self) -> &str;

    /// Look up the reference held for `key` without touching the backing
    /// file.
    async fn list(&self, key: &Cid) -> ListRes;

    /// Look up the reference held for `key` and check that the backing file
    /// still contains the referenced data.
    async fn verify(&self, key: &Cid) -> ListRes;

    /// Lazily list every reference, in key order.
    fn list_all(&self) -> Result<ListResStream>;

    /// Lazily verify every reference, in key order.
    fn verify_all(&self) -> Result<ListResStream>;

    /// Every key referenced by the filestore, in key order. Keys that can't
    /// be decoded are yielded as errors.
    fn keys(&self) -> Result<KeyStream>;

    /// Whether the main block store holds a copy of `key`.
    async fn has_block(&self, key: &Cid) -> Result<bool>;

    /// Open the object at `path` (see [`resolve_path`](crate::resolve_path))
    /// for reading. Filestore references are preferred over block store
    /// copies.
    ///
    /// Filestore references are read back and checked against the key before
    /// anything is served, so the reader always yields exactly `size` bytes
    /// of the requested object.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if neither
    /// store knows the key, and [`Changed`](crate::error::ErrorKind::Changed)
    /// if the backing file no longer holds the referenced data.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use futures::io::AsyncReadExt;
    /// # use stash_store::{Filestore, error::Result};
    /// # async fn example(store: &dyn Filestore) -> Result<()> {
    /// let mut fetched = store.fetch("/stash/bafkr4i...").await?;
    /// let mut data = Vec::with_capacity(fetched.size as usize);
    /// fetched.reader.read_to_end(&mut data).await.unwrap();
    /// assert_eq!(data.len() as u64, fetched.size);
    /// # Ok(())
    /// # }
    /// ```
    async fn fetch(&self, path: &str) -> Result<Fetched>;
}

/// Decode a key as stored in an index, or describe why it can't be.
pub(crate) fn decode_key(key: &str) -> std::result::Result<Cid, ListRes> {
    parse_key(key).map_err(|e| ListRes::other_error(None, format!("corrupt key {key:?} in filestore index: {e}")))
}

/// Turn the bytes read back from a backing file into a verification record.
pub(crate) fn check_block(key: Cid, block: &BlockRef, data: std::io::Result<Vec<u8>>) -> ListRes {
    let data = match data {
        Ok(data) => data,
        Err(e) => {
            let status = Status::from_io(&e);
            return ListRes::with_status(key, block, status, format!("{}: {e}", block.path.display()));
        },
    };
    match block_cid(&data) {
        Ok(actual) if actual == key => ListRes::ok(key, block),
        Ok(_) => ListRes::with_status(
            key,
            block,
            Status::FileChanged,
            format!("data in file did not match. {} offset {}", block.path.display(), block.offset),
        ),
        Err(e) => ListRes::with_status(key, block, Status::OtherError, e.to_string()),
    }
}

/// Serve the bytes read back for a filestore reference, but only if they
/// still hash to `key`. The declared size is always the number of bytes the
/// reader will produce.
pub(crate) fn serve_block(key: Cid, block: &BlockRef, data: std::io::Result<Vec<u8>>) -> Result<Fetched> {
    let path = block.path.display();
    let data = match data {
        Ok(data) => data,
        Err(e) => {
            let kind = match Status::from_io(&e) {
                Status::FileNotFound => ErrorKind::NotFound(path.to_string()),
                Status::FileChanged => ErrorKind::Changed(format!("{path}: {e}")),
                _ => ErrorKind::Io(e),
            };
            exn::bail!(kind);
        },
    };
    if block_cid(&data)? != key {
        exn::bail!(ErrorKind::Changed(format!("data in file did not match. {path} offset {}", block.offset)));
    }
    let size = data.len() as u64;
    Ok(Fetched { reader: Box::new(futures::io::Cursor::new(data)), size })
}
