//! Filestore index: which byte range of which backing file each key refers
//! to.
//!
//! Keys are kept as the strings they were written with and only decoded when
//! they're used, so that one bad entry shows up as a single `ERROR` record
//! instead of making the whole index unreadable.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A byte range of a file on the local filesystem.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRef {
    pub path: PathBuf,
    pub offset: u64,
    pub size: u64,
}
impl BlockRef {
    pub fn new(path: impl Into<PathBuf>, offset: u64, size: u64) -> Self {
        Self { path: path.into(), offset, size }
    }
}

/// Ordered by key, so every listing of an unchanged index comes out the
/// same.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    #[serde(default)]
    pub blocks: BTreeMap<String, BlockRef>,
}

impl Index {
    /// Load an index from disk. A file that doesn't exist yet is an empty
    /// index.
    pub async fn load(path: &Path) -> Result<Self> {
        let data = match tokio::fs::read(path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(ErrorKind::Io(e).into()),
        };
        serde_json::from_slice(&data).or_raise(|| ErrorKind::Index(path.to_path_buf()))
    }

    /// Write the index next to its final location then move it into place,
    /// so a crash never leaves a half-written index behind.
    pub async fn save(&self, path: &Path) -> Result<()> {
        let data = serde_json::to_vec_pretty(self).or_raise(|| ErrorKind::Index(path.to_path_buf()))?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, data).await.map_err(ErrorKind::Io)?;
        tokio::fs::rename(&tmp, path).await.map_err(ErrorKind::Io)?;
        Ok(())
    }

    pub fn insert(&mut self, key: impl Into<String>, block: BlockRef) {
        self.blocks.insert(key.into(), block);
    }

    pub fn get(&self, key: &str) -> Option<&BlockRef> {
        self.blocks.get(key)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let index = Index::load(&dir.path().join("filestore.json")).await.unwrap();
        assert!(index.is_empty());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("filestore.json");
        let mut index = Index::default();
        index.insert("b-key", BlockRef::new("/data/b", 0, 10));
        index.insert("a-key", BlockRef::new("/data/a", 10, 20));
        index.save(&path).await.unwrap();
        assert!(!path.with_extension("json.tmp").exists());

        let loaded = Index::load(&path).await.unwrap();
        assert_eq!(loaded, index);
        let keys: Vec<_> = loaded.blocks.keys().cloned().collect();
        assert_eq!(keys, vec!["a-key", "b-key"]);
    }

    #[tokio::test]
    async fn test_corrupt_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("filestore.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();
        let err = Index::load(&path).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Index(_)));
    }
}
