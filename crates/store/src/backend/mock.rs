//! In-memory filestore for testing.

use crate::backend::{Fetched, KeyStream, ListResStream, check_block, decode_key, serve_block};
use crate::error::{ErrorKind, Result};
use crate::index::{BlockRef, Index};
use crate::key::{Cid, block_cid, parse_key};
use crate::path::resolve as resolve_path;
use crate::status::ListRes;
use crate::Filestore;
use async_trait::async_trait;
use exn::ResultExt;
use futures::StreamExt;
use futures::io::Cursor;
use std::collections::HashMap;
use std::io::{Error as IoError, ErrorKind as IoErrorKind};
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Default)]
struct State {
    /// Backing "files" that references point into.
    files: RwLock<HashMap<PathBuf, Vec<u8>>>,
    index: RwLock<Index>,
    /// Main block store.
    blocks: RwLock<HashMap<Cid, Vec<u8>>>,
}
impl State {
    fn lookup(&self, key: &Cid) -> Option<BlockRef> {
        self.index.read().unwrap_or_else(PoisonError::into_inner).get(&key.to_string()).cloned()
    }

    fn snapshot(&self) -> Vec<(String, BlockRef)> {
        let index = self.index.read().unwrap_or_else(PoisonError::into_inner);
        index.blocks.iter().map(|(k, b)| (k.clone(), b.clone())).collect()
    }

    fn read_range(&self, block: &BlockRef) -> std::io::Result<Vec<u8>> {
        let files = self.files.read().unwrap_or_else(PoisonError::into_inner);
        let data = files.get(&block.path).ok_or_else(|| IoError::from(IoErrorKind::NotFound))?;
        let start = usize::try_from(block.offset).map_err(IoError::other)?;
        let end = start + usize::try_from(block.size).map_err(IoError::other)?;
        data.get(start..end).map(<[u8]>::to_vec).ok_or_else(|| IoError::from(IoErrorKind::UnexpectedEof))
    }

    fn verify(&self, key: Cid, block: &BlockRef) -> ListRes {
        check_block(key, block, self.read_range(block))
    }
}

/// In-memory filestore for testing.
///
/// Backing files, the index and the block store are all `HashMap`s, so every
/// outcome a real store can produce (changed files, missing files, corrupt
/// index entries) can be staged without touching the filesystem.
///
/// Locks are only ever held for the duration of a single synchronous map
/// access, never across an `.await`.
///
/// # Examples
///
/// ```
/// use stash_store::backend::MockFilestore;
/// use stash_store::{Filestore, Status, block_cid};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let store = MockFilestore::with_files([("/data/a.txt", b"alpha")]);
/// let key = block_cid(b"alpha").unwrap();
/// assert_eq!(store.verify(&key).await.status, Status::Ok);
///
/// store.write_file("/data/a.txt", b"ALPHA");
/// assert_eq!(store.verify(&key).await.status, Status::FileChanged);
/// # }
/// ```
pub struct MockFilestore {
    name: String,
    state: Arc<State>,
}

impl MockFilestore {
    /// Create a mock filestore where each file is referenced, whole, as a
    /// single block.
    pub fn with_files(files: impl IntoIterator<Item = (impl Into<PathBuf>, impl Into<Vec<u8>>)>) -> Self {
        let store = Self::default();
        for (path, data) in files {
            let (path, data) = (path.into(), data.into());
            // The panic here is DELIBERATE. MockFilestore is intended to be
            // used in tests; if the setup is wrong the test should not pass.
            let Ok(key) = block_cid(&data) else {
                panic!("MockFilestore::with_files: could not hash {}", path.display());
            };
            let block = BlockRef::new(path.clone(), 0, data.len() as u64);
            store.write_file(path, data);
            store.insert_reference(key.to_string(), block);
        }
        store
    }

    /// Change the name of the mock filestore.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Add blocks to the main block store.
    pub fn with_blocks(self, blocks: impl IntoIterator<Item = impl Into<Vec<u8>>>) -> Self {
        for data in blocks {
            let data = data.into();
            let Ok(key) = block_cid(&data) else {
                panic!("MockFilestore::with_blocks: could not hash block");
            };
            self.state.blocks.write().unwrap_or_else(PoisonError::into_inner).insert(key, data);
        }
        self
    }

    /// Add a raw index entry. The key is not checked, which is the point.
    pub fn with_reference(self, key: impl Into<String>, block: BlockRef) -> Self {
        self.insert_reference(key, block);
        self
    }

    fn insert_reference(&self, key: impl Into<String>, block: BlockRef) {
        self.state.index.write().unwrap_or_else(PoisonError::into_inner).insert(key, block);
    }

    /// Replace (or create) a backing file.
    pub fn write_file(&self, path: impl Into<PathBuf>, data: impl Into<Vec<u8>>) {
        self.state.files.write().unwrap_or_else(PoisonError::into_inner).insert(path.into(), data.into());
    }

    /// Delete a backing file, leaving its references dangling.
    pub fn remove_file(&self, path: impl Into<PathBuf>) {
        self.state.files.write().unwrap_or_else(PoisonError::into_inner).remove(&path.into());
    }
}
impl Default for MockFilestore {
    fn default() -> Self {
        Self {
            name: "mock".to_string(),
            state: Arc::default(),
        }
    }
}

#[async_trait]
impl Filestore for MockFilestore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list(&self, key: &Cid) -> ListRes {
        match self.state.lookup(key) {
            Some(block) => ListRes::ok(*key, &block),
            None => ListRes::missing(*key),
        }
    }

    async fn verify(&self, key: &Cid) -> ListRes {
        match self.state.lookup(key) {
            Some(block) => self.state.verify(*key, &block),
            None => ListRes::missing(*key),
        }
    }

    fn list_all(&self) -> Result<ListResStream> {
        let records: Vec<ListRes> = self
            .state
            .snapshot()
            .into_iter()
            .map(|(key, block)| match decode_key(&key) {
                Ok(key) => ListRes::ok(key, &block),
                Err(corrupt) => corrupt,
            })
            .collect();
        Ok(Box::pin(futures::stream::iter(records)))
    }

    fn verify_all(&self) -> Result<ListResStream> {
        // Verification happens as the stream is polled, like the real thing.
        let state = Arc::clone(&self.state);
        let entries = state.snapshot();
        Ok(Box::pin(futures::stream::iter(entries).map(move |(key, block)| match decode_key(&key) {
            Ok(key) => state.verify(key, &block),
            Err(corrupt) => corrupt,
        })))
    }

    fn keys(&self) -> Result<KeyStream> {
        let keys: Vec<Result<Cid>> = self
            .state
            .snapshot()
            .into_iter()
            .map(|(key, _)| parse_key(&key).or_raise(|| ErrorKind::InvalidKey(key.clone())))
            .collect();
        Ok(Box::pin(futures::stream::iter(keys)))
    }

    async fn has_block(&self, key: &Cid) -> Result<bool> {
        Ok(self.state.blocks.read().unwrap_or_else(PoisonError::into_inner).contains_key(key))
    }

    async fn fetch(&self, path: &str) -> Result<Fetched> {
        let key = resolve_path(path)?;
        if let Some(block) = self.state.lookup(&key) {
            return serve_block(key, &block, self.state.read_range(&block));
        }
        let data = self
            .state
            .blocks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned()
            .ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path.to_string())))?;
        let size = data.len() as u64;
        Ok(Fetched { reader: Box::new(Cursor::new(data)), size })
    }
}
