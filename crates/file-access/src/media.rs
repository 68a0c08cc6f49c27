//! Consumer-side view of an opened source.
//!
//! [`AccessStream`] plays the role of the demux pipeline's stream object: it
//! advances `position` as bytes are delivered and exposes the source as a
//! Symphonia [`MediaSource`].

use std::io::{self, Read, Seek, SeekFrom};
use std::time::Duration;

use symphonia::core::io::MediaSource;

use crate::config::AccessConfig;
use crate::endpoint::AccessRequest;
use crate::error::OpenError;
use crate::source::FileAccess;
use crate::state::{InputFlags, SharedStream, StreamState, lock};

/// Blocking `Read + Seek` over a [`FileAccess`] and its stream state.
pub struct AccessStream {
    access: FileAccess,
    stream: SharedStream,
    flags: InputFlags,
}

impl AccessStream {
    pub fn new(access: FileAccess, stream: SharedStream, flags: InputFlags) -> Self {
        Self {
            access,
            stream,
            flags,
        }
    }

    /// Open `request` with a fresh stream state.
    ///
    /// Returns the stream and the caching delay to apply.
    pub fn open(
        request: &AccessRequest,
        config: &AccessConfig,
        flags: InputFlags,
    ) -> Result<(Self, Duration), OpenError> {
        let stream = StreamState::shared();
        let opened = FileAccess::open(request, &stream, config)?;
        Ok((Self::new(opened.access, stream, flags), opened.caching))
    }

    /// Snapshot of the stream state.
    pub fn state(&self) -> StreamState {
        lock(&self.stream).clone()
    }

    pub fn shared_state(&self) -> SharedStream {
        self.stream.clone()
    }

    pub fn access(&self) -> &FileAccess {
        &self.access
    }

    /// Read and clear the size-changed flag.
    pub fn take_size_changed(&self) -> bool {
        std::mem::take(&mut lock(&self.stream).size_changed)
    }

    pub fn close(self) {
        self.access.close();
    }

    fn resolve(&self, pos: SeekFrom) -> (bool, u64, i64) {
        let s = lock(&self.stream);
        let position = i64::try_from(s.position).unwrap_or(i64::MAX);
        let target = match pos {
            SeekFrom::Start(x) => i64::try_from(x).unwrap_or(i64::MAX),
            SeekFrom::Current(d) => position.saturating_add(d),
            SeekFrom::End(d) => i64::try_from(s.total_size)
                .unwrap_or(i64::MAX)
                .saturating_add(d),
        };
        (s.seekable, s.position, target)
    }
}

impl Read for AccessStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.access.read(&self.stream, &self.flags, buf)?;
        if n > 0 {
            let mut s = lock(&self.stream);
            s.position = s.position.saturating_add(n as u64);
        }
        Ok(n)
    }
}

impl Seek for AccessStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let (seekable, position, target) = self.resolve(pos);
        if !seekable {
            if matches!(pos, SeekFrom::Current(0)) {
                return Ok(position);
            }
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "source is not seekable",
            ));
        }
        self.access.seek(&self.stream, target);
        Ok(lock(&self.stream).position)
    }
}

impl MediaSource for AccessStream {
    fn is_seekable(&self) -> bool {
        lock(&self.stream).seekable
    }

    fn byte_len(&self) -> Option<u64> {
        let s = lock(&self.stream);
        (s.seekable && s.total_size > 0).then_some(s.total_size)
    }
}
