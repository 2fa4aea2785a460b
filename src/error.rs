use derive_more::{Display, Error};

/// A command error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for commands.
pub type Result<T> = std::result::Result<T, Error>;

/// Problems that stop a command before it produces any output. Each carries
/// the message of the error it was raised from.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("{_0}")]
    Config(#[error(not(source))] String),
    #[display("{_0}")]
    Store(#[error(not(source))] String),
    #[display("{}: {_1}", _0.display())]
    InvalidFile(#[error(not(source))] std::path::PathBuf, #[error(not(source))] String),
}

/// Raise `err` into `kind`, keeping its message.
pub fn raise<E>(err: exn::Exn<E>, kind: impl FnOnce(String) -> ErrorKind) -> Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    let message = (*err).to_string();
    err.raise(kind(message))
}
