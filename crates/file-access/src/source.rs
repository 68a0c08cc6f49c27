//! Source descriptor lifecycle: open and close.

use std::time::Duration;

use crate::config::AccessConfig;
use crate::endpoint::{AccessMode, AccessRequest, Classification, EndpointKind, EndpointPolicy};
use crate::error::OpenError;
use crate::handle::SourceHandle;
use crate::reader::ReadStrategy;
use crate::state::{SharedStream, lock};

/// An opened endpoint.
///
/// Holds the only OS handle for the session. Reads and seeks borrow it
/// mutably; [`FileAccess::close`] consumes it.
#[derive(Debug)]
pub struct FileAccess {
    pub(crate) handle: SourceHandle,
    pub(crate) strategy: ReadStrategy,
    pub(crate) timing: AccessConfig,
    pub(crate) read_count: u64,
    request: AccessRequest,
}

/// Result of a successful open.
#[derive(Debug)]
pub struct Opened {
    pub access: FileAccess,
    /// Buffering delay the consumer should apply (`file-caching`).
    pub caching: Duration,
}

impl FileAccess {
    /// Open `request` and initialize `stream` for it.
    pub fn open(
        request: &AccessRequest,
        stream: &SharedStream,
        config: &AccessConfig,
    ) -> Result<Opened, OpenError> {
        Self::open_with_policy(request, stream, config, EndpointPolicy::native())
    }

    /// Open with an explicit classification policy.
    pub fn open_with_policy(
        request: &AccessRequest,
        stream: &SharedStream,
        config: &AccessConfig,
        policy: EndpointPolicy,
    ) -> Result<Opened, OpenError> {
        let stdin = request.is_stdin();
        let path = &request.path;

        let (class, pace_controlled, workaround) = match request.mode {
            AccessMode::Stream => (Classification::UNBOUNDED, false, false),
            AccessMode::Kfir => (Classification::UNBOUNDED, false, true),
            AccessMode::File if stdin => (Classification::UNBOUNDED, true, false),
            AccessMode::File => {
                let meta = std::fs::metadata(path).map_err(|source| {
                    tracing::warn!(path = %path.display(), error = %source, "cannot stat() file");
                    OpenError::Stat {
                        path: path.clone(),
                        source,
                    }
                })?;
                let kind = EndpointKind::from_file_type(meta.file_type());
                let class = policy.classify(kind, meta.len()).ok_or_else(|| {
                    tracing::error!(path = %path.display(), ?kind, "unknown file type");
                    OpenError::UnsupportedType { path: path.clone() }
                })?;
                (class, true, false)
            }
        };

        {
            let mut s = lock(stream);
            s.pace_controlled = pace_controlled;
            s.seekable = class.seekable;
            s.total_size = class.total_size;
            s.position = 0;
            s.size_changed = false;
        }

        tracing::debug!(path = %path.display(), mode = %request.mode, "opening file");
        let acquired = if stdin {
            SourceHandle::stdin()
        } else {
            SourceHandle::open(path)
        };
        let handle = acquired.map_err(|source| {
            tracing::error!(path = %path.display(), error = %source, "cannot open file");
            OpenError::Open {
                path: path.clone(),
                source,
            }
        })?;

        let mut total_size = class.total_size;
        if class.seekable && policy.size_from_handle() {
            match handle.size() {
                Ok(size) => {
                    total_size = size;
                    lock(stream).total_size = size;
                }
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "handle size unavailable"),
            }
        }

        if class.seekable && total_size == 0 {
            tracing::error!(path = %path.display(), "file is empty, aborting");
            return Err(OpenError::EmptySource { path: path.clone() });
        }

        let strategy = ReadStrategy::select(pace_controlled, workaround);
        tracing::debug!(
            seekable = class.seekable,
            pace_controlled,
            total_size,
            ?strategy,
            "source opened"
        );

        Ok(Opened {
            access: FileAccess {
                handle,
                strategy,
                timing: config.clone(),
                read_count: 0,
                request: request.clone(),
            },
            caching: config.caching,
        })
    }

    /// Release the handle. Never fails.
    pub fn close(self) {
        tracing::info!(mrl = %self.request, reads = self.read_count, "closing");
    }

    pub fn mode(&self) -> AccessMode {
        self.request.mode
    }

    pub fn strategy(&self) -> ReadStrategy {
        self.strategy
    }

    /// Read attempts completed so far.
    pub fn read_count(&self) -> u64 {
        self.read_count
    }

    /// True when the blind-retry read strategy is active.
    pub fn is_workaround(&self) -> bool {
        self.strategy == ReadStrategy::RetryOnEmpty
    }
}
