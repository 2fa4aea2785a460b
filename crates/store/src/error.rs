//! Store Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::path::PathBuf;

/// A store error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The repository was opened with the filestore switched off.
    #[display("filestore not enabled")]
    NotEnabled,
    /// Neither the filestore nor the block store hold the requested object.
    #[display("object not found: {_0}")]
    NotFound(#[error(not(source))] String),
    /// Path contains invalid characters, escapes the namespace or names a
    /// sub-path we can't resolve.
    #[display("invalid path: {_0}")]
    InvalidPath(#[error(not(source))] String),
    /// A content identifier could not be decoded or constructed.
    #[display("invalid key: {_0}")]
    InvalidKey(#[error(not(source))] String),
    /// A backing file no longer holds the data it was referenced for.
    #[display("object changed on disk: {_0}")]
    Changed(#[error(not(source))] String),
    /// Backing files must be referenced by absolute path.
    #[display("backing file must be absolute: {}", _0.display())]
    RelativeFile(#[error(not(source))] PathBuf),
    /// Underlying I/O error
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// The on-disk index could not be read or written.
    #[display("invalid filestore index: {}", _0.display())]
    Index(#[error(not(source))] PathBuf),
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_display() {
        assert_eq!(ErrorKind::NotEnabled.to_string(), "filestore not enabled");
        assert_eq!(ErrorKind::NotFound("bafk".to_string()).to_string(), "object not found: bafk");
        assert_eq!(
            ErrorKind::Changed("/srv/a.bin offset 0".to_string()).to_string(),
            "object changed on disk: /srv/a.bin offset 0"
        );
        assert_eq!(
            ErrorKind::RelativeFile(PathBuf::from("a/b")).to_string(),
            "backing file must be absolute: a/b"
        );
    }

    #[test]
    fn error_kind_retryable() {
        assert!(ErrorKind::Io(IoError::other("flaky")).is_retryable());
        assert!(!ErrorKind::NotEnabled.is_retryable());
        assert!(!ErrorKind::InvalidKey("nope".to_string()).is_retryable());
    }
}
