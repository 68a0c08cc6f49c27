//! OS handle behind an opened source.
//!
//! One type for every target; acquisition and the readiness wait differ per
//! platform. On Unix the path is opened with `O_NONBLOCK` and readiness is a
//! `poll(2)` on the descriptor. Other targets have no readiness wait and report
//! every handle as ready.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::time::Duration;

/// Outcome of one bounded readiness wait.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    TimedOut,
    Interrupted,
}

/// Exclusively owned read handle. Dropping it releases the OS resource.
#[derive(Debug)]
pub struct SourceHandle {
    file: File,
    stdin: bool,
}

impl SourceHandle {
    /// Whether [`SourceHandle::wait_readable`] actually waits on this target.
    pub const SUPPORTS_READINESS: bool = cfg!(unix);

    /// Adopt the process standard input.
    ///
    /// The handle is a duplicate, so releasing it leaves the process stdin open.
    pub fn stdin() -> io::Result<Self> {
        Ok(Self {
            file: dup_stdin()?,
            stdin: true,
        })
    }

    /// Open `path` for reading, non-blocking where the platform allows it.
    pub fn open(path: &Path) -> io::Result<Self> {
        let mut opts = std::fs::OpenOptions::new();
        opts.read(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            opts.custom_flags(libc::O_NONBLOCK);
        }
        Ok(Self {
            file: opts.open(path)?,
            stdin: false,
        })
    }

    pub fn is_stdin(&self) -> bool {
        self.stdin
    }

    pub fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }

    /// Reposition to an absolute offset.
    pub fn seek_to(&mut self, pos: u64) -> io::Result<u64> {
        self.file.seek(SeekFrom::Start(pos))
    }

    /// Current size as reported by the handle's own metadata.
    pub fn size(&self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    /// Wait up to `timeout` for the handle to become readable.
    #[cfg(unix)]
    pub fn wait_readable(&self, timeout: Duration) -> io::Result<Readiness> {
        use std::os::unix::io::AsRawFd;

        let mut pfd = libc::pollfd {
            fd: self.file.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        let ms = timeout.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;
        // SAFETY: `pfd` is a single valid pollfd that outlives the call.
        let ret = unsafe { libc::poll(&mut pfd, 1, ms) };
        match ret {
            0 => Ok(Readiness::TimedOut),
            n if n > 0 => Ok(Readiness::Ready),
            _ => {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    Ok(Readiness::Interrupted)
                } else {
                    Err(err)
                }
            }
        }
    }

    #[cfg(not(unix))]
    pub fn wait_readable(&self, _timeout: Duration) -> io::Result<Readiness> {
        Ok(Readiness::Ready)
    }
}

#[cfg(unix)]
fn dup_stdin() -> io::Result<File> {
    use std::os::fd::AsFd;
    let fd = io::stdin().as_fd().try_clone_to_owned()?;
    Ok(File::from(fd))
}

#[cfg(windows)]
fn dup_stdin() -> io::Result<File> {
    use std::os::windows::io::AsHandle;
    let handle = io::stdin().as_handle().try_clone_to_owned()?;
    Ok(File::from(handle))
}

#[cfg(not(any(unix, windows)))]
fn dup_stdin() -> io::Result<File> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "standard input is not available as a file handle on this target",
    ))
}
