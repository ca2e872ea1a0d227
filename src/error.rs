//! Error types for jem operations.

use std::io;

use thiserror::Error;

/// Errors that can occur while addressing, streaming, or caching content.
#[derive(Error, Debug)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("out of range: {0}")]
    OutOfRange(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[cfg(feature = "remote")]
    #[error("remote fetch failed: {0}")]
    Remote(#[from] reqwest::Error),
}

/// Coarse classification of an [`Error`].
///
/// Callers that only need to decide between "missing", "bad offsets",
/// "stale handle", and "the bytes could not be moved" match on this
/// instead of the full error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    OutOfRange,
    InvalidState,
    IoFailure,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::OutOfRange(_) => ErrorKind::OutOfRange,
            Error::InvalidState(_) => ErrorKind::InvalidState,
            Error::Io(e) if e.kind() == io::ErrorKind::NotFound => ErrorKind::NotFound,
            Error::Zip(zip::result::ZipError::FileNotFound) => ErrorKind::NotFound,
            _ => ErrorKind::IoFailure,
        }
    }

    pub(crate) fn out_of_range(msg: impl Into<String>) -> Self {
        Error::OutOfRange(msg.into())
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(e) => e,
            other => {
                let kind = match other.kind() {
                    ErrorKind::NotFound => io::ErrorKind::NotFound,
                    ErrorKind::OutOfRange => io::ErrorKind::InvalidInput,
                    ErrorKind::InvalidState => io::ErrorKind::Other,
                    ErrorKind::IoFailure => io::ErrorKind::Other,
                };
                io::Error::new(kind, other)
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
