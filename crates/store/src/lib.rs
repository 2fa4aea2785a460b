pub mod backend;
pub mod error;
mod index;
mod key;
mod path;
mod status;

pub use crate::backend::{Fetched, Filestore, LocalFilestore};
use crate::error::{ErrorKind, Result};
pub use crate::index::{BlockRef, Index};
pub use crate::key::{BLAKE3, CHUNK_SIZE, Cid, RAW, block_cid, parse_key};
pub use crate::path::{PATH_NAMESPACE, resolve as resolve_path};
pub use crate::status::{ListRes, Status};
use stash_config::Config;
use std::sync::Arc;

pub type StoreHandle = Arc<dyn Filestore>;

/// Open the filestore of the repository `config` points at.
///
/// Fails with [`NotEnabled`](ErrorKind::NotEnabled) when the filestore is
/// switched off.
pub async fn open(config: &Config) -> Result<StoreHandle> {
    Ok(Arc::new(open_local(config).await?))
}

/// Like [`open`], for callers that need to add files.
pub async fn open_local(config: &Config) -> Result<LocalFilestore> {
    if !config.filestore.enabled {
        exn::bail!(ErrorKind::NotEnabled);
    }
    LocalFilestore::open("filestore", &config.repo).await
}
