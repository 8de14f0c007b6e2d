use std::path::PathBuf;

use thiserror::Error;

/// Error type for every engine operation.
///
/// Line-level problems in map and rename files are not errors; they are
/// skipped and counted in the report returned by the loader.
#[derive(Debug, Error)]
pub enum Error {
    /// An expected input file does not exist.
    ///
    /// Callers typically fall back (e.g. re-scan a default range) instead of
    /// surfacing this to the user as a failure.
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The file exists but its header, version, or record stream is not
    /// something we know how to read.
    #[error("Unrecognized format in {}: {reason}", path.display())]
    Format { path: PathBuf, reason: String },

    /// Reading or writing a file failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The request was rejected before any work was done.
    #[error("Precondition violated: {0}")]
    Precondition(String),

    /// Part of the requested range is not backed by the memory image.
    #[error("Unmapped memory: {length:#x} bytes at {address:#010x}")]
    Unmapped { address: u32, length: u32 },

    /// The configuration file could not be parsed.
    #[error("Invalid configuration in {}: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Convenience result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Map an I/O error on `path`, turning `ErrorKind::NotFound` into [`Error::NotFound`].
    pub(crate) fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Error::NotFound(path)
        } else {
            Error::Io { path, source }
        }
    }

    /// True when this is the "expected file absent" case.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}
