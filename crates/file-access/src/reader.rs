//! Read and seek on an opened source.
//!
//! Each read runs a small state machine. Every iteration has exactly one
//! suspension point (a readiness wait slice or a retry sleep), and the stop
//! flags are checked on every transition out of a suspension, so a raised flag
//! ends the read within one slice.

use std::io;

use crate::error::{ReadError, is_transient};
use crate::handle::{Readiness, SourceHandle};
use crate::source::FileAccess;
use crate::state::{InputFlags, SharedStream, lock};

/// How reads are issued, fixed at open.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadStrategy {
    /// One blocking read. Used when the caller paces reads.
    Direct,
    /// Wait for readability in bounded slices, then read once.
    AwaitReadiness,
    /// Read; on an empty result sleep and read again.
    RetryOnEmpty,
}

impl ReadStrategy {
    pub fn select(pace_controlled: bool, workaround: bool) -> Self {
        if pace_controlled || !SourceHandle::SUPPORTS_READINESS {
            Self::Direct
        } else if workaround {
            Self::RetryOnEmpty
        } else {
            Self::AwaitReadiness
        }
    }

    fn first_phase(self) -> ReadPhase {
        match self {
            Self::AwaitReadiness => ReadPhase::AwaitReadiness,
            Self::Direct | Self::RetryOnEmpty => ReadPhase::Transfer,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ReadPhase {
    AwaitReadiness,
    Transfer,
    Backoff,
}

#[derive(Debug)]
enum Attempt {
    Data(usize),
    /// Stop flag seen while waiting for readiness; no read was issued.
    Stopped,
    WaitFailed(io::Error),
    ReadFailed(io::Error),
}

/// Where a seek landed relative to its target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeekOutcome {
    Exact,
    /// Target beyond the known size; position set to the size.
    ClampedHigh,
    /// Target before the start; position set to 0.
    ClampedLow,
}

/// Clamp `target` into `[0, total_size]`.
pub fn clamp_position(target: i64, total_size: u64) -> (u64, SeekOutcome) {
    match u64::try_from(target) {
        Err(_) => (0, SeekOutcome::ClampedLow),
        Ok(t) if t > total_size => (total_size, SeekOutcome::ClampedHigh),
        Ok(t) => (t, SeekOutcome::Exact),
    }
}

impl FileAccess {
    /// Read up to `buf.len()` bytes.
    ///
    /// `Ok(0)` means end of data, no data yet, or a stop requested through
    /// `flags`. The consumer advances `position`; this only maintains
    /// `total_size` and `size_changed`.
    pub fn read(
        &mut self,
        stream: &SharedStream,
        flags: &InputFlags,
        buf: &mut [u8],
    ) -> Result<usize, ReadError> {
        if buf.is_empty() {
            return Ok(0);
        }

        let result = match self.attempt(flags, buf) {
            Attempt::Data(n) => Ok(n),
            Attempt::Stopped => return Ok(0),
            Attempt::WaitFailed(e) => {
                tracing::error!(error = %e, "select error");
                return Err(ReadError::Io(e));
            }
            Attempt::ReadFailed(e) => {
                let transient = is_transient(&e);
                if !transient {
                    tracing::error!(error = %e, "read failed");
                }
                // Keeps an unconnected FIFO from spinning the caller.
                std::thread::sleep(self.timing.error_delay);
                if transient { Ok(0) } else { Err(ReadError::Io(e)) }
            }
        };

        self.read_count += 1;
        self.refresh_size(stream);
        result
    }

    fn attempt(&mut self, flags: &InputFlags, buf: &mut [u8]) -> Attempt {
        let retry = self.strategy == ReadStrategy::RetryOnEmpty;
        let mut phase = self.strategy.first_phase();
        loop {
            phase = match phase {
                ReadPhase::AwaitReadiness => {
                    match self.handle.wait_readable(self.timing.poll_slice) {
                        Ok(Readiness::Ready) => ReadPhase::Transfer,
                        Ok(Readiness::TimedOut | Readiness::Interrupted) => {
                            if flags.should_stop() {
                                return Attempt::Stopped;
                            }
                            ReadPhase::AwaitReadiness
                        }
                        Err(e) => return Attempt::WaitFailed(e),
                    }
                }
                ReadPhase::Transfer => match self.handle.read(buf) {
                    Ok(0) if retry => ReadPhase::Backoff,
                    Err(e) if retry && is_transient(&e) => ReadPhase::Backoff,
                    Ok(n) => return Attempt::Data(n),
                    Err(e) => return Attempt::ReadFailed(e),
                },
                ReadPhase::Backoff => {
                    if flags.should_stop() {
                        return Attempt::Data(0);
                    }
                    std::thread::sleep(self.timing.retry_interval);
                    ReadPhase::Transfer
                }
            };
        }
    }

    /// Re-check the size every `size_refresh_reads` reads of a sized source.
    fn refresh_size(&mut self, stream: &SharedStream) {
        let every = u64::from(self.timing.size_refresh_reads.max(1));
        if self.read_count % every != 0 || lock(stream).total_size == 0 {
            return;
        }

        match self.handle.size() {
            Ok(size) => {
                let mut s = lock(stream);
                if s.total_size != size {
                    tracing::debug!(old = s.total_size, new = size, "source size changed");
                    s.total_size = size;
                    s.size_changed = true;
                }
            }
            Err(e) => tracing::warn!(error = %e, "couldn't stat again the file"),
        }
    }

    /// Move to `target`, clamped into `[0, total_size]`.
    ///
    /// Runs under the stream guard. Repositioning the OS handle is best effort.
    pub fn seek(&mut self, stream: &SharedStream, target: i64) -> SeekOutcome {
        let mut s = lock(stream);
        let (pos, outcome) = clamp_position(target, s.total_size);
        match outcome {
            SeekOutcome::ClampedHigh => {
                tracing::error!(requested = target, size = s.total_size, "seeking too far")
            }
            SeekOutcome::ClampedLow => tracing::error!(requested = target, "seeking too early"),
            SeekOutcome::Exact => {}
        }

        if let Err(e) = self.handle.seek_to(pos) {
            tracing::debug!(pos, error = %e, "handle seek failed");
        }
        s.position = pos;
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AccessConfig;
    use crate::endpoint::{AccessMode, AccessRequest};
    use crate::state::StreamState;
    use std::io::Write;
    use std::time::{Duration, Instant};

    fn fast_config() -> AccessConfig {
        AccessConfig {
            error_delay: Duration::from_millis(5),
            retry_interval: Duration::from_millis(5),
            ..AccessConfig::default()
        }
    }

    fn open(mode: AccessMode, path: &std::path::Path, stream: &SharedStream) -> FileAccess {
        let req = AccessRequest::new(mode, path);
        FileAccess::open(&req, stream, &fast_config())
            .expect("open")
            .access
    }

    fn file_with(bytes: &[u8]) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().expect("tempfile");
        f.write_all(bytes).expect("write");
        f.flush().expect("flush");
        f
    }

    #[test]
    fn strategy_selection() {
        assert_eq!(ReadStrategy::select(true, false), ReadStrategy::Direct);
        assert_eq!(ReadStrategy::select(true, true), ReadStrategy::Direct);
        if SourceHandle::SUPPORTS_READINESS {
            assert_eq!(ReadStrategy::select(false, false), ReadStrategy::AwaitReadiness);
            assert_eq!(ReadStrategy::select(false, true), ReadStrategy::RetryOnEmpty);
        }
    }

    #[test]
    fn clamp_position_bounds() {
        assert_eq!(clamp_position(-10, 100), (0, SeekOutcome::ClampedLow));
        assert_eq!(clamp_position(i64::MIN, 100), (0, SeekOutcome::ClampedLow));
        assert_eq!(clamp_position(0, 100), (0, SeekOutcome::Exact));
        assert_eq!(clamp_position(100, 100), (100, SeekOutcome::Exact));
        assert_eq!(clamp_position(150, 100), (100, SeekOutcome::ClampedHigh));
        assert_eq!(clamp_position(i64::MAX, 0), (0, SeekOutcome::ClampedHigh));
    }

    #[test]
    fn seek_clamps_then_reads_from_start() {
        let f = file_with(&(0u8..100).collect::<Vec<_>>());
        let stream = StreamState::shared();
        let flags = InputFlags::new();
        let mut access = open(AccessMode::File, f.path(), &stream);

        assert_eq!(access.seek(&stream, 150), SeekOutcome::ClampedHigh);
        assert_eq!(stream.lock().unwrap().position, 100);

        assert_eq!(access.seek(&stream, -10), SeekOutcome::ClampedLow);
        assert_eq!(stream.lock().unwrap().position, 0);

        let mut buf = [0u8; 10];
        let n = access.read(&stream, &flags, &mut buf).expect("read");
        assert_eq!(n, 10);
        assert_eq!(buf, [0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
        assert_eq!(access.read_count(), 1);
    }

    #[test]
    fn seek_exact_moves_handle() {
        let f = file_with(&(0u8..100).collect::<Vec<_>>());
        let stream = StreamState::shared();
        let flags = InputFlags::new();
        let mut access = open(AccessMode::File, f.path(), &stream);

        assert_eq!(access.seek(&stream, 42), SeekOutcome::Exact);
        assert_eq!(stream.lock().unwrap().position, 42);
        let mut buf = [0u8; 2];
        access.read(&stream, &flags, &mut buf).expect("read");
        assert_eq!(buf, [42, 43]);
    }

    #[test]
    fn empty_buffer_reads_nothing() {
        let f = file_with(b"abc");
        let stream = StreamState::shared();
        let mut access = open(AccessMode::File, f.path(), &stream);
        assert_eq!(access.read(&stream, &InputFlags::new(), &mut []).unwrap(), 0);
        assert_eq!(access.read_count(), 0);
    }

    #[test]
    fn size_refresh_waits_for_threshold() {
        let mut f = file_with(&[1u8; 100]);
        let stream = StreamState::shared();
        let flags = InputFlags::new();
        let mut access = open(AccessMode::File, f.path(), &stream);

        f.write_all(&[2u8; 50]).expect("append");
        f.flush().expect("flush");

        let mut buf = [0u8; 4];
        for _ in 0..9 {
            access.read(&stream, &flags, &mut buf).expect("read");
        }
        {
            let s = stream.lock().unwrap();
            assert_eq!(s.total_size, 100);
            assert!(!s.size_changed);
        }

        access.read(&stream, &flags, &mut buf).expect("read");
        let s = stream.lock().unwrap();
        assert_eq!(s.total_size, 150);
        assert!(s.size_changed);
    }

    #[test]
    fn unsized_source_is_never_restated() {
        let f = file_with(&[1u8; 64]);
        let stream = StreamState::shared();
        let flags = InputFlags::new();
        let mut access = open(AccessMode::Stream, f.path(), &stream);

        let mut buf = [0u8; 1];
        for _ in 0..10 {
            access.read(&stream, &flags, &mut buf).expect("read");
        }
        let s = stream.lock().unwrap();
        assert_eq!(s.total_size, 0);
        assert!(!s.size_changed);
    }

    #[cfg(unix)]
    mod fifo {
        use super::*;
        use std::ffi::CString;
        use std::os::unix::ffi::OsStrExt;
        use std::path::{Path, PathBuf};

        fn make_fifo(dir: &Path) -> PathBuf {
            let path = dir.join("pipe");
            let c = CString::new(path.as_os_str().as_bytes()).expect("cstring");
            // SAFETY: `c` is a valid NUL-terminated path.
            let rc = unsafe { libc::mkfifo(c.as_ptr(), 0o600) };
            assert_eq!(rc, 0, "mkfifo: {}", io::Error::last_os_error());
            path
        }

        #[test]
        fn readiness_wait_returns_zero_on_cancel() {
            let dir = tempfile::tempdir().expect("tempdir");
            let path = make_fifo(dir.path());
            let stream = StreamState::shared();
            let flags = InputFlags::new();
            let mut access = open(AccessMode::Stream, &path, &stream);
            assert_eq!(access.strategy(), ReadStrategy::AwaitReadiness);

            let canceller = flags.clone();
            let t = std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(100));
                canceller.cancel();
            });

            let start = Instant::now();
            let mut buf = [0u8; 16];
            let n = access.read(&stream, &flags, &mut buf).expect("read");
            let elapsed = start.elapsed();
            t.join().unwrap();

            assert_eq!(n, 0);
            assert!(elapsed >= Duration::from_millis(100));
            assert!(elapsed < Duration::from_millis(100) + Duration::from_millis(500) * 2);
            assert_eq!(access.read_count(), 0);
        }

        #[test]
        fn readiness_wait_delivers_written_data() {
            let dir = tempfile::tempdir().expect("tempdir");
            let path = make_fifo(dir.path());
            let stream = StreamState::shared();
            let flags = InputFlags::new();
            let mut access = open(AccessMode::Stream, &path, &stream);

            let writer_path = path.clone();
            let t = std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(50));
                let mut w = std::fs::OpenOptions::new()
                    .write(true)
                    .open(writer_path)
                    .expect("open writer");
                w.write_all(b"payload").expect("write");
                w
            });

            let mut buf = [0u8; 16];
            let n = access.read(&stream, &flags, &mut buf).expect("read");
            let _writer = t.join().unwrap();
            assert_eq!(&buf[..n], b"payload");
        }

        #[test]
        fn workaround_retries_until_data_arrives() {
            let dir = tempfile::tempdir().expect("tempdir");
            let path = make_fifo(dir.path());
            let stream = StreamState::shared();
            let flags = InputFlags::new();
            let mut access = open(AccessMode::Kfir, &path, &stream);
            assert!(access.is_workaround());

            let writer_path = path.clone();
            let t = std::thread::spawn(move || {
                // Several empty reads happen before the writer shows up.
                std::thread::sleep(Duration::from_millis(60));
                let mut w = std::fs::OpenOptions::new()
                    .write(true)
                    .open(writer_path)
                    .expect("open writer");
                w.write_all(b"late").expect("write");
                w
            });

            let mut buf = [0u8; 8];
            let n = access.read(&stream, &flags, &mut buf).expect("read");
            let _writer = t.join().unwrap();
            assert_eq!(&buf[..n], b"late");
            assert_eq!(access.read_count(), 1);
        }

        #[test]
        fn workaround_stops_on_upstream_failure() {
            let dir = tempfile::tempdir().expect("tempdir");
            let path = make_fifo(dir.path());
            let stream = StreamState::shared();
            let flags = InputFlags::new();
            let mut access = open(AccessMode::Kfir, &path, &stream);

            let failer = flags.clone();
            let t = std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(30));
                failer.fail();
            });

            let mut buf = [0u8; 8];
            let n = access.read(&stream, &flags, &mut buf).expect("read");
            t.join().unwrap();
            assert_eq!(n, 0);
            assert_eq!(access.read_count(), 1);
        }

        #[test]
        fn fifo_in_file_mode_is_paced_and_unbounded() {
            let dir = tempfile::tempdir().expect("tempdir");
            let path = make_fifo(dir.path());
            let stream = StreamState::shared();
            let access = open(AccessMode::File, &path, &stream);

            let s = stream.lock().unwrap().clone();
            assert!(!s.seekable);
            assert!(s.pace_controlled);
            assert_eq!(s.total_size, 0);
            assert_eq!(access.strategy(), ReadStrategy::Direct);
        }

        #[test]
        fn unconnected_fifo_direct_read_is_zero_progress() {
            let dir = tempfile::tempdir().expect("tempdir");
            let path = make_fifo(dir.path());
            let stream = StreamState::shared();
            let flags = InputFlags::new();
            let mut access = open(AccessMode::File, &path, &stream);

            // Hold a writer open without writing: the non-blocking read would block.
            let _writer = std::fs::OpenOptions::new()
                .write(true)
                .open(&path)
                .expect("open writer");
            let mut buf = [0u8; 8];
            let n = access.read(&stream, &flags, &mut buf).expect("transient read");
            assert_eq!(n, 0);
            assert_eq!(access.read_count(), 1);
        }

        #[test]
        fn hard_read_error_is_returned_after_delay() {
            // A directory opens fine as a raw stream, polls readable, then fails with EISDIR.
            let dir = tempfile::tempdir().expect("tempdir");
            let stream = StreamState::shared();
            let flags = InputFlags::new();
            let mut access = open(AccessMode::Stream, dir.path(), &stream);
            assert_eq!(access.strategy(), ReadStrategy::AwaitReadiness);

            let start = Instant::now();
            let mut buf = [0u8; 8];
            let err = access
                .read(&stream, &flags, &mut buf)
                .expect_err("directory read must fail");

            assert_eq!(err.kind(), io::ErrorKind::IsADirectory);
            assert!(!err.is_transient());
            assert!(start.elapsed() >= fast_config().error_delay);
            assert_eq!(access.read_count(), 1);
        }
    }
}
