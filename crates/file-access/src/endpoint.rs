//! Endpoint naming and classification.
//!
//! Turns the caller's identifier into an [`AccessRequest`] and decides, from
//! filesystem metadata, whether the endpoint is seekable and how large it is.

use std::fmt;
use std::fs::FileType;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::OpenError;

/// Name that selects the process standard input.
pub const STDIN_NAME: &str = "-";

/// Access mode chosen by the caller before open.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AccessMode {
    /// Files, devices, pipes and stdin; reads are paced by the caller.
    #[default]
    File,
    /// Raw non-seekable stream read through the readiness wait.
    Stream,
    /// Raw stream whose driver reports readiness unreliably; blind retries.
    Kfir,
}

impl AccessMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Stream => "stream",
            Self::Kfir => "kfir",
        }
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessMode {
    type Err = OpenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "file" => Ok(Self::File),
            "stream" => Ok(Self::Stream),
            "kfir" => Ok(Self::Kfir),
            other => Err(OpenError::UnknownAccess(other.to_string())),
        }
    }
}

/// What to open and how.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessRequest {
    pub mode: AccessMode,
    pub path: PathBuf,
}

impl AccessRequest {
    pub fn new(mode: AccessMode, path: impl Into<PathBuf>) -> Self {
        Self {
            mode,
            path: path.into(),
        }
    }

    /// Split an `access:path` or `access://path` identifier.
    ///
    /// A prefix that is not a known access mode (or a one-letter drive name)
    /// stays part of the path and the default mode is used.
    pub fn parse(mrl: &str) -> Self {
        if let Some((prefix, rest)) = mrl.split_once(':') {
            if prefix.len() > 1 {
                if let Ok(mode) = prefix.parse::<AccessMode>() {
                    let path = rest.strip_prefix("//").unwrap_or(rest);
                    return Self::new(mode, path);
                }
            }
        }
        Self::new(AccessMode::File, mrl)
    }

    /// True for the single-character standard input sentinel.
    pub fn is_stdin(&self) -> bool {
        self.path == Path::new(STDIN_NAME)
    }
}

impl fmt::Display for AccessRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.mode, self.path.display())
    }
}

/// Endpoint type as reported by the filesystem.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EndpointKind {
    Stdin,
    Regular,
    CharDevice,
    BlockDevice,
    Fifo,
    Socket,
    Other,
}

impl EndpointKind {
    #[cfg(unix)]
    pub fn from_file_type(ft: FileType) -> Self {
        use std::os::unix::fs::FileTypeExt;

        if ft.is_file() {
            Self::Regular
        } else if ft.is_char_device() {
            Self::CharDevice
        } else if ft.is_block_device() {
            Self::BlockDevice
        } else if ft.is_fifo() {
            Self::Fifo
        } else if ft.is_socket() {
            Self::Socket
        } else {
            Self::Other
        }
    }

    #[cfg(not(unix))]
    pub fn from_file_type(ft: FileType) -> Self {
        if ft.is_file() {
            Self::Regular
        } else {
            Self::Other
        }
    }
}

/// Seekability and size derived at open.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Classification {
    pub seekable: bool,
    pub total_size: u64,
}

impl Classification {
    pub const UNBOUNDED: Self = Self {
        seekable: false,
        total_size: 0,
    };
}

/// Per-target rule for classifying non-stdin paths.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EndpointPolicy {
    /// Decide by file type; size comes from path metadata.
    FileType,
    /// Every path is seekable; size comes from the opened handle.
    AlwaysSeekable,
}

impl EndpointPolicy {
    /// Policy for the compilation target.
    pub const fn native() -> Self {
        if cfg!(unix) {
            Self::FileType
        } else {
            Self::AlwaysSeekable
        }
    }

    /// Whether the size must be re-read once the handle is open.
    pub fn size_from_handle(self) -> bool {
        matches!(self, Self::AlwaysSeekable)
    }

    /// `None` means the endpoint type cannot be read from.
    pub fn classify(self, kind: EndpointKind, metadata_size: u64) -> Option<Classification> {
        if kind == EndpointKind::Stdin {
            return Some(Classification::UNBOUNDED);
        }
        match self {
            Self::AlwaysSeekable => Some(Classification {
                seekable: true,
                total_size: metadata_size,
            }),
            Self::FileType => match kind {
                EndpointKind::Regular | EndpointKind::CharDevice | EndpointKind::BlockDevice => {
                    Some(Classification {
                        seekable: true,
                        total_size: metadata_size,
                    })
                }
                EndpointKind::Fifo | EndpointKind::Socket => Some(Classification::UNBOUNDED),
                EndpointKind::Stdin | EndpointKind::Other => None,
            },
        }
    }
}
