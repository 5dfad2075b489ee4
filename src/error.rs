//! Centralized error types for mailferry.

use std::path::PathBuf;
use thiserror::Error;

use crate::transcribe::TranscribeError;

/// All errors produced by the mailferry library.
#[derive(Error, Debug)]
pub enum FerryError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The local mailbox does not exist and cannot be created.
    #[error("Mailbox not found: {0}")]
    MailboxNotFound(PathBuf),

    /// The path exists but is not a mailbox of the requested format.
    #[error("Not a usable mailbox: {0}")]
    InvalidMailbox(PathBuf),

    /// A spool item could not be read or written.
    #[error("Invalid spool item '{path}': {reason}")]
    Spool { path: PathBuf, reason: String },

    /// The exclusive lock on the mailbox could not be taken.
    #[error("Could not lock '{path}': {source}")]
    Lock {
        path: PathBuf,
        source: nix::errno::Errno,
    },

    /// The transcribed document could not be serialized.
    #[error("Rendering error: {0}")]
    Render(String),

    /// A remote message could not be transcribed.
    #[error(transparent)]
    Transcribe(#[from] TranscribeError),
}

/// Convenience alias for `Result<T, FerryError>`.
pub type Result<T> = std::result::Result<T, FerryError>;

impl FerryError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a `Spool` variant from a path and anything printable.
    pub fn spool(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        Self::Spool {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Allow `?` on `std::io::Error` when no path context is available
/// (rare, prefer `FerryError::io`).
impl From<std::io::Error> for FerryError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}
