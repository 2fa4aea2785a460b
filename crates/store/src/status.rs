//! Per-object records produced by listing and verification.

use crate::index::BlockRef;
use crate::key::Cid;
use derive_more::Display;
use std::io::{Error as IoError, ErrorKind as IoErrorKind};

/// Outcome of looking up (and optionally re-reading) a single filestore
/// reference.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash)]
pub enum Status {
    /// The block can be reconstructed from its backing file.
    #[display("ok")]
    Ok,
    /// The contents of the backing file have changed.
    #[display("changed")]
    FileChanged,
    /// The backing file could not be found.
    #[display("no-file")]
    FileNotFound,
    /// Some other problem reading the backing file.
    #[display("error")]
    FileError,
    /// The key is not in the filestore.
    #[display("missing")]
    KeyNotFound,
    /// Internal error, most likely a corrupt index.
    #[display("ERROR")]
    OtherError,
}

impl Status {
    /// Classify a failed read of a backing file.
    pub fn from_io(err: &IoError) -> Self {
        match err.kind() {
            IoErrorKind::NotFound => Status::FileNotFound,
            // The file got shorter since it was added.
            IoErrorKind::UnexpectedEof => Status::FileChanged,
            _ => Status::FileError,
        }
    }
}

/// A single listing or verification record.
///
/// A non-empty [`error_msg`](Self::error_msg) marks the record as an
/// application-level failure: the record is still data, and the rest of a
/// batch carries on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListRes {
    pub status: Status,
    pub error_msg: String,
    /// `None` when the key itself could not be decoded.
    pub key: Option<Cid>,
    pub file_path: String,
    pub offset: u64,
    pub size: u64,
}

impl ListRes {
    /// A healthy reference.
    pub fn ok(key: Cid, block: &BlockRef) -> Self {
        Self::with_status(key, block, Status::Ok, String::new())
    }

    pub fn with_status(key: Cid, block: &BlockRef, status: Status, error_msg: impl Into<String>) -> Self {
        Self {
            status,
            error_msg: error_msg.into(),
            key: Some(key),
            file_path: block.path.display().to_string(),
            offset: block.offset,
            size: block.size,
        }
    }

    /// The key isn't referenced by the filestore at all.
    pub fn missing(key: Cid) -> Self {
        Self {
            status: Status::KeyNotFound,
            error_msg: format!("{key}: not found in filestore"),
            key: Some(key),
            file_path: String::new(),
            offset: 0,
            size: 0,
        }
    }

    /// Something went wrong that has nothing to do with the backing file.
    pub fn other_error(key: Option<Cid>, error_msg: impl Into<String>) -> Self {
        Self {
            status: Status::OtherError,
            error_msg: error_msg.into(),
            key,
            file_path: String::new(),
            offset: 0,
            size: 0,
        }
    }

    pub fn is_error(&self) -> bool {
        !self.error_msg.is_empty()
    }

    /// `<hash> <size> <path> <offset>`
    ///
    /// ```
    /// use stash_store::{BlockRef, ListRes, block_cid};
    ///
    /// let key = block_cid(b"abc").unwrap();
    /// let res = ListRes::ok(key, &BlockRef::new("/data/file.bin", 262144, 3));
    /// assert_eq!(res.format_long(), format!("{:<50}      3 /data/file.bin 262144", key.to_string()));
    /// ```
    pub fn format_long(&self) -> String {
        let key = match &self.key {
            Some(key) => key.to_string(),
            None => "<corrupt key>".to_string(),
        };
        format!("{key:<50} {:>6} {} {}", self.size, self.file_path, self.offset)
    }
}
