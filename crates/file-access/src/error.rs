//! Error types for the access lifecycle and read path.

use std::io;
use std::path::PathBuf;

/// Terminal failures of [`crate::FileAccess::open`].
///
/// No descriptor exists after any of these; a handle acquired before the
/// failure has already been released.
#[derive(Debug, thiserror::Error)]
pub enum OpenError {
    #[error("unknown access mode `{0}`")]
    UnknownAccess(String),

    #[error("cannot stat() file `{path}`: {source}")]
    Stat {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unknown file type for `{path}`")]
    UnsupportedType { path: PathBuf },

    #[error("cannot open file `{path}`: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("file `{path}` is empty, aborting")]
    EmptySource { path: PathBuf },
}

/// Failure surfaced by [`crate::FileAccess::read`].
///
/// Interrupted and would-block conditions never reach the caller; they come
/// back as a zero-byte read instead.
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("read failed: {0}")]
    Io(#[from] io::Error),
}

impl ReadError {
    /// Underlying OS error kind.
    pub fn kind(&self) -> io::ErrorKind {
        match self {
            Self::Io(e) => e.kind(),
        }
    }

    /// Whether this would have been absorbed as zero progress.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Io(e) => is_transient(e),
        }
    }
}

impl From<ReadError> for io::Error {
    fn from(err: ReadError) -> Self {
        match err {
            ReadError::Io(e) => e,
        }
    }
}

/// Settings file failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// True for conditions that mean "no progress yet" rather than failure.
pub(crate) fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
    )
}
