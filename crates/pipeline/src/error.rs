//! Pipeline Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.
//!
//! Only *fatal* problems are errors. Per-object failures are data (records
//! with an error message) and cancellation is an early end of the stream.

use derive_more::{Display, Error};

/// A pipeline error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification reported alongside an error message, mirroring
/// what a remote end can send back.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum ErrorCode {
    /// An ordinary operational failure.
    #[display("normal")]
    Normal,
    /// The request itself was wrong.
    #[display("client")]
    Client,
    /// A bug: something produced a value of the wrong shape.
    #[display("implementation")]
    Implementation,
}

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The far end of the response reported an error of its own.
    #[display("{message}")]
    Remote { message: String, code: ErrorCode },
    /// Pulling the next result failed. Carries the underlying message, which
    /// is also kept in the error tree.
    #[display("{_0}")]
    Stream(#[error(not(source))] String),
    /// A produced value wasn't what the consuming step expects.
    #[display("unexpected response: {_0}")]
    Contract(#[error(not(source))] String),
    /// Writing to the output failed.
    #[display("failed to write output")]
    Emit,
    /// A store operation failed. Carries the store's message.
    #[display("{_0}")]
    Store(#[error(not(source))] String),
    /// An object path couldn't be resolved.
    #[display("could not resolve {_0}")]
    Lookup(#[error(not(source))] String),
}

impl ErrorKind {
    /// The code this error is reported with.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Remote { code, .. } => *code,
            Self::Contract(_) => ErrorCode::Implementation,
            Self::Lookup(_) => ErrorCode::Client,
            _ => ErrorCode::Normal,
        }
    }

    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Stream(_) | Self::Store(_))
    }
}
