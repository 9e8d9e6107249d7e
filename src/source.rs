//! Everything related to per-source descriptors, buffering, and delimiter
//! accounting.

use std::fs::File;
use std::io;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd, RawFd};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, trace};

/// The byte marking a line boundary.
pub const DELIMITER: u8 = b'\n';

/// Chunk size for each non-blocking read.
const READ_CHUNK: usize = 4096;

/// Error type for source registration and the merge loop.
///
/// Every variant is fatal to the merge: there is no partial-failure mode and
/// no attempt to keep going when a single source misbehaves.
#[derive(Debug, Error)]
pub enum Error {
    /// A path given to [`MergedLines::add_file`] could not be opened.
    ///
    /// [`MergedLines::add_file`]: crate::MergedLines::add_file
    #[error("failed to open {}: {source}", .path.display())]
    Open {
        /// The path as supplied by the caller.
        path: PathBuf,
        /// The underlying open failure.
        source: io::Error,
    },
    /// A descriptor could not be prepared for non-blocking reads.
    #[error("failed to configure descriptor as non-blocking: {0}")]
    Configure(#[source] io::Error),
    /// The readiness wait failed for a reason other than interruption.
    #[error("readiness wait failed: {0}")]
    Wait(#[source] io::Error),
    /// A source read failed for a reason other than would-block or
    /// interruption.
    #[error("read from source failed: {0}")]
    Read(#[source] io::Error),
    /// An emitted line could not be written to the output stream.
    #[error("write to output failed: {0}")]
    Write(#[source] io::Error),
}

/// One registered input: an owned descriptor plus the bytes read from it that
/// have not yet been split off as emitted lines.
///
/// `pending` always equals the number of delimiter bytes currently sitting in
/// `buf`; `eof` only ever transitions from `false` to `true`.
#[derive(Debug)]
pub(crate) struct Source {
    fd: OwnedFd,
    buf: Vec<u8>,
    pending: usize,
    eof: bool,
}

impl Source {
    /// Opens `path` read-only and registers it as a source.
    ///
    /// Directories are rejected up front rather than left to fail on the
    /// first read.
    pub(crate) fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();

        if path.is_dir() {
            return Err(Error::Open {
                path: path.to_path_buf(),
                source: io::Error::from_raw_os_error(libc::EISDIR),
            });
        }

        let file = File::open(path).map_err(|source| Error::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let source = Self::from_fd(file.into())?;
        debug!(path = %path.display(), fd = source.raw_fd(), "registered file source");

        Ok(source)
    }

    /// Registers the process's standard input as a source.
    ///
    /// The descriptor is duplicated so that descriptor 0 itself stays valid
    /// for the rest of the process. Note that the non-blocking flag lives on
    /// the shared open file description, as it would were descriptor 0 used
    /// directly.
    pub(crate) fn stdin() -> Result<Self, Error> {
        let fd = io::stdin()
            .as_fd()
            .try_clone_to_owned()
            .map_err(Error::Configure)?;

        let source = Self::from_fd(fd)?;
        debug!(fd = source.raw_fd(), "registered standard input");

        Ok(source)
    }

    /// Wraps an arbitrary descriptor, switching it to non-blocking mode.
    pub(crate) fn from_fd(fd: OwnedFd) -> Result<Self, Error> {
        configure_nonblocking(fd.as_fd()).map_err(Error::Configure)?;

        Ok(Source {
            fd,
            buf: Vec::new(),
            pending: 0,
            eof: false,
        })
    }

    pub(crate) fn raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }

    pub(crate) fn pending_lines(&self) -> usize {
        self.pending
    }

    pub(crate) fn is_eof(&self) -> bool {
        self.eof
    }

    /// A source is exhausted once it has hit end-of-input and every buffered
    /// line has been popped. The merge terminates when all sources are.
    pub(crate) fn is_exhausted(&self) -> bool {
        self.eof && self.pending == 0
    }

    /// Opportunistically reads as much as is currently available, stopping as
    /// soon as a complete line is buffered so emission can proceed.
    ///
    /// Returns without touching `eof` when a read would block; sets `eof` on
    /// a zero-byte read; retries transparently on interruption. Any other
    /// read failure is fatal.
    pub(crate) fn fill(&mut self) -> Result<(), Error> {
        let mut chunk = [0u8; READ_CHUNK];

        while self.pending == 0 && !self.eof {
            let n = unsafe {
                libc::read(self.raw_fd(), chunk.as_mut_ptr().cast(), chunk.len())
            };

            if n < 0 {
                let err = io::Error::last_os_error();
                match err.kind() {
                    io::ErrorKind::WouldBlock => break,
                    io::ErrorKind::Interrupted => continue,
                    _ => return Err(Error::Read(err)),
                }
            }

            if n == 0 {
                self.eof = true;
                trace!(fd = self.raw_fd(), "source reached end of input");
                break;
            }

            let chunk = &chunk[..n as usize];
            self.buf.extend_from_slice(chunk);
            self.pending += chunk.iter().filter(|&&b| b == DELIMITER).count();
        }

        Ok(())
    }

    /// Pops the first buffered line, delimiter stripped, or `None` if no
    /// complete line is buffered.
    ///
    /// Bytes after the last delimiter stay in the buffer; if end-of-input
    /// arrives before another delimiter they are never emitted.
    pub(crate) fn pop_line(&mut self) -> Option<Vec<u8>> {
        if self.pending == 0 {
            return None;
        }

        let at = self
            .buf
            .iter()
            .position(|&b| b == DELIMITER)
            .expect("pending lines but no delimiter buffered");

        let line = self.buf[..at].to_vec();
        self.buf.drain(..=at);
        self.pending -= 1;

        Some(line)
    }
}

fn configure_nonblocking(fd: BorrowedFd<'_>) -> io::Result<()> {
    let raw = fd.as_raw_fd();

    let flags = unsafe { libc::fcntl(raw, libc::F_GETFL, 0) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }

    let result = unsafe { libc::fcntl(raw, libc::F_SETFL, flags | libc::O_NONBLOCK) };
    if result < 0 {
        return Err(io::Error::last_os_error());
    }

    Ok(())
}
