//! Local filesystem filestore.
//!
//! A repository is a directory holding the filestore index
//! (`filestore.json`) and the main block store (`blocks/`, one file per
//! key). Backing files referenced by the index live anywhere on the local
//! filesystem and are accessed via `tokio::fs`.

use crate::backend::{Fetched, KeyStream, ListResStream, check_block, decode_key, serve_block};
use crate::error::{ErrorKind, Result};
use crate::index::{BlockRef, Index};
use crate::key::{CHUNK_SIZE, Cid, block_cid, parse_key};
use crate::path::resolve as resolve_path;
use crate::status::ListRes;
use crate::Filestore;
use async_stream::stream;
use async_trait::async_trait;
use exn::ResultExt;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::RwLock;
use tokio_util::compat::TokioAsyncReadCompatExt;

const INDEX_FILE: &str = "filestore.json";
const BLOCKS_DIR: &str = "blocks";

struct Inner {
    root: PathBuf,
    index: RwLock<Index>,
}
impl Inner {
    async fn lookup(&self, key: &Cid) -> Option<BlockRef> {
        self.index.read().await.get(&key.to_string()).cloned()
    }

    /// Copy the entries out so the lock isn't held across yield points.
    async fn snapshot(&self) -> Vec<(String, BlockRef)> {
        self.index.read().await.blocks.iter().map(|(k, b)| (k.clone(), b.clone())).collect()
    }
}

/// Filestore backed by a repository directory on the local filesystem.
///
/// Cloning is cheap; clones share the same in-memory index.
///
/// # Examples
///
/// ```no_run
/// use stash_store::backend::LocalFilestore;
///
/// # async fn example() -> stash_store::error::Result<()> {
/// let store = LocalFilestore::open("local", "/var/lib/stash").await?;
/// let added = store.add_file("/srv/media/film.mkv").await?;
/// println!("referenced {} blocks", added.len());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LocalFilestore {
    name: String,
    inner: Arc<Inner>,
}

impl LocalFilestore {
    /// Open (creating if necessary) the repository at `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not absolute, is not a directory, or
    /// holds an index that can't be parsed.
    pub async fn open(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::InvalidPath(root.display().to_string()));
        }
        if fs::try_exists(&root).await.map_err(ErrorKind::Io)? {
            if !fs::metadata(&root).await.map_err(ErrorKind::Io)?.is_dir() {
                exn::bail!(ErrorKind::InvalidPath(root.display().to_string()));
            }
        }
        fs::create_dir_all(root.join(BLOCKS_DIR)).await.map_err(ErrorKind::Io)?;
        let index = Index::load(&root.join(INDEX_FILE)).await?;
        tracing::debug!(root = %root.display(), references = index.len(), "Opened filestore");
        Ok(Self {
            name: name.into(),
            inner: Arc::new(Inner { root, index: RwLock::new(index) }),
        })
    }

    fn index_path(&self) -> PathBuf {
        self.inner.root.join(INDEX_FILE)
    }

    fn block_path(&self, key: &Cid) -> PathBuf {
        self.inner.root.join(BLOCKS_DIR).join(key.to_string())
    }

    /// Reference every chunk of `file` from the filestore, without copying
    /// any data. The file must stay where it is for the references to stay
    /// valid.
    pub async fn add_file(&self, file: impl AsRef<Path>) -> Result<Vec<ListRes>> {
        let file = file.as_ref();
        if !file.is_absolute() {
            exn::bail!(ErrorKind::RelativeFile(file.to_path_buf()));
        }
        let mut reader = fs::File::open(file).await.map_err(|e| Self::map_io_error(e, file))?;
        let mut added = Vec::new();
        let mut offset = 0u64;
        loop {
            let mut chunk = Vec::with_capacity(CHUNK_SIZE);
            (&mut reader).take(CHUNK_SIZE as u64).read_to_end(&mut chunk).await.map_err(ErrorKind::Io)?;
            if chunk.is_empty() {
                break;
            }
            let size = chunk.len() as u64;
            added.push((block_cid(&chunk)?, BlockRef::new(file, offset, size)));
            offset += size;
        }

        let mut index = self.inner.index.write().await;
        for (key, block) in &added {
            index.insert(key.to_string(), block.clone());
        }
        index.save(&self.index_path()).await?;
        tracing::info!(file = %file.display(), blocks = added.len(), bytes = offset, "Added file to filestore");
        Ok(added.iter().map(|(key, block)| ListRes::ok(*key, block)).collect())
    }

    /// Copy `data` into the main block store.
    pub async fn put_block(&self, data: &[u8]) -> Result<Cid> {
        let key = block_cid(data)?;
        fs::write(self.block_path(&key), data).await.map_err(ErrorKind::Io)?;
        Ok(key)
    }

    fn map_io_error(e: std::io::Error, path: &Path) -> ErrorKind {
        match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound(path.display().to_string()),
            _ => ErrorKind::Io(e),
        }
    }
}

/// Read exactly the referenced range; a file that got shorter surfaces as
/// [`UnexpectedEof`](std::io::ErrorKind::UnexpectedEof).
async fn read_range(block: &BlockRef) -> std::io::Result<Vec<u8>> {
    let mut file = fs::File::open(&block.path).await?;
    file.seek(SeekFrom::Start(block.offset)).await?;
    let mut buffer = vec![0; usize::try_from(block.size).map_err(std::io::Error::other)?];
    file.read_exact(&mut buffer).await?;
    Ok(buffer)
}

#[async_trait]
impl Filestore for LocalFilestore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list(&self, key: &Cid) -> ListRes {
        match self.inner.lookup(key).await {
            Some(block) => ListRes::ok(*key, &block),
            None => ListRes::missing(*key),
        }
    }

    async fn verify(&self, key: &Cid) -> ListRes {
        match self.inner.lookup(key).await {
            Some(block) => check_block(*key, &block, read_range(&block).await),
            None => ListRes::missing(*key),
        }
    }

    fn list_all(&self) -> Result<ListResStream> {
        let inner = Arc::clone(&self.inner);
        Ok(Box::pin(stream! {
            for (key, block) in inner.snapshot().await {
                match decode_key(&key) {
                    Ok(key) => yield ListRes::ok(key, &block),
                    Err(corrupt) => yield corrupt,
                }
            }
        }))
    }

    fn verify_all(&self) -> Result<ListResStream> {
        let inner = Arc::clone(&self.inner);
        Ok(Box::pin(stream! {
            for (key, block) in inner.snapshot().await {
                match decode_key(&key) {
                    Ok(key) => yield check_block(key, &block, read_range(&block).await),
                    Err(corrupt) => yield corrupt,
                }
            }
        }))
    }

    fn keys(&self) -> Result<KeyStream> {
        let inner = Arc::clone(&self.inner);
        Ok(Box::pin(stream! {
            for (key, _) in inner.snapshot().await {
                yield parse_key(&key).or_raise(|| ErrorKind::InvalidKey(key.clone()));
            }
        }))
    }

    async fn has_block(&self, key: &Cid) -> Result<bool> {
        Ok(fs::try_exists(self.block_path(key)).await.map_err(ErrorKind::Io)?)
    }

    async fn fetch(&self, path: &str) -> Result<Fetched> {
        let key = resolve_path(path)?;
        if let Some(block) = self.inner.lookup(&key).await {
            tracing::debug!(%key, file = %block.path.display(), offset = block.offset, "Serving from filestore");
            return serve_block(key, &block, read_range(&block).await);
        }
        let file = match fs::File::open(self.block_path(&key)).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => exn::bail!(ErrorKind::NotFound(path.to_string())),
            Err(e) => exn::bail!(ErrorKind::Io(e)),
        };
        let size = file.metadata().await.map_err(ErrorKind::Io)?.len();
        tracing::debug!(%key, "Serving from block store");
        Ok(Fetched { reader: Box::new(file.compat()), size })
    }
}
