//! Everything related to waiting for readiness, sweeping sources, and
//! emitting merged lines.

use std::io::{self, Write};
use std::mem;
use std::os::fd::OwnedFd;
use std::path::Path;

use tracing::{debug, trace};

use crate::source::{Error, Source, DELIMITER};

/// A single complete line captured from one of the merged sources.
///
/// The delimiter byte is stripped, and the line carries no indication of
/// which source produced it.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Line {
    bytes: Vec<u8>,
}

impl Line {
    /// Returns the line's bytes, delimiter excluded.
    pub fn as_bytes(&self) -> &[u8] {
        self.bytes.as_slice()
    }

    /// Returns the number of bytes in the line.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns `true` if the line contained nothing but its delimiter.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Consumes the line, returning the underlying bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl AsRef<[u8]> for Line {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

/// Merges registered sources, and can be pulled for complete lines.
///
/// ## Pulling merged lines
///
/// `MergedLines` implements [`Iterator`], which internally:
///   1. Sweeps every source in registration order, reading each one
///      opportunistically (without blocking) and emitting at most one
///      buffered line per source.
///   2. Repeats full sweeps for as long as the previous sweep emitted
///      anything, so a source with a deep backlog cannot starve sources
///      producing data more slowly.
///   3. Once a sweep comes up empty, blocks on `poll(2)` across every
///      source that has not reached end-of-input, then starts over.
///
/// The iterator ends once every source has reached end-of-input with no
/// buffered line left. A trailing fragment not closed by the delimiter is
/// dropped when its source reaches end-of-input.
#[derive(Debug, Default)]
pub struct MergedLines {
    sources: Vec<Source>,
    /// Index of the next source to visit in the current sweep.
    cursor: usize,
    /// Whether the current sweep has emitted at least one line.
    progressed: bool,
}

impl MergedLines {
    /// Constructs a new `MergedLines` instance with no sources.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the process's standard input to the merge.
    ///
    /// The descriptor is duplicated and switched to non-blocking mode;
    /// returns [`Error::Configure`] if either step fails.
    pub fn add_stdin(&mut self) -> Result<(), Error> {
        self.sources.push(Source::stdin()?);
        Ok(())
    }

    /// Adds a given file to the merge, opened read-only.
    ///
    /// Returns [`Error::Open`] if the path cannot be opened or names a
    /// directory, [`Error::Configure`] if the descriptor cannot be switched
    /// to non-blocking mode.
    pub fn add_file(&mut self, path: impl AsRef<Path>) -> Result<(), Error> {
        self.sources.push(Source::open(path)?);
        Ok(())
    }

    /// Adds an arbitrary readable descriptor (a pipe end, for instance) to
    /// the merge, switching it to non-blocking mode.
    pub fn add_fd(&mut self, fd: OwnedFd) -> Result<(), Error> {
        self.sources.push(Source::from_fd(fd)?);
        Ok(())
    }

    /// Returns the next merged line, blocking until one is available.
    ///
    /// Returns `Ok(None)` once every source is exhausted (end-of-input
    /// reached and every buffered line emitted).
    pub fn next_line(&mut self) -> Result<Option<Line>, Error> {
        loop {
            // Resume the sweep in progress, visiting sources in
            // registration order.
            while self.cursor < self.sources.len() {
                let index = self.cursor;
                self.cursor += 1;

                let source = &mut self.sources[index];
                if source.pending_lines() == 0 && !source.is_eof() {
                    source.fill()?;
                }

                if let Some(bytes) = source.pop_line() {
                    self.progressed = true;
                    return Ok(Some(Line { bytes }));
                }
            }

            // Sweep complete. Run another as long as the last one emitted
            // something; otherwise every source is drained of ready lines.
            self.cursor = 0;
            if mem::take(&mut self.progressed) {
                continue;
            }

            if self.sources.iter().all(Source::is_exhausted) {
                debug!("all sources exhausted, merge complete");
                return Ok(None);
            }

            self.wait_readable()?;
        }
    }

    /// Drives the merge to completion, writing each emitted line followed by
    /// one delimiter byte to `out` and flushing so consumers see lines as
    /// soon as they are emitted.
    ///
    /// Returns the number of lines written.
    pub fn copy_to<W: Write>(&mut self, out: &mut W) -> Result<u64, Error> {
        let mut emitted = 0;

        while let Some(line) = self.next_line()? {
            out.write_all(line.as_bytes()).map_err(Error::Write)?;
            out.write_all(&[DELIMITER]).map_err(Error::Write)?;
            out.flush().map_err(Error::Write)?;
            emitted += 1;
        }

        Ok(emitted)
    }

    /// Blocks until at least one non-end-of-input source is readable.
    ///
    /// A wait interrupted by a signal is retried transparently; any other
    /// failure is fatal. Which descriptors are actually ready is not
    /// recorded: the following sweep probes every live source, which is
    /// cheap and correct under non-blocking reads.
    fn wait_readable(&self) -> Result<(), Error> {
        let mut fds: Vec<libc::pollfd> = self
            .sources
            .iter()
            .filter(|source| !source.is_eof())
            .map(|source| libc::pollfd {
                fd: source.raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            })
            .collect();

        // The caller only waits after ruling out completion.
        debug_assert!(!fds.is_empty());

        trace!(live_sources = fds.len(), "blocking on readiness wait");

        loop {
            let res = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, -1) };
            if res >= 0 {
                return Ok(());
            }

            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(Error::Wait(err));
        }
    }
}

impl Iterator for MergedLines {
    type Item = Result<Line, Error>;

    /// Equivalent to [`MergedLines::next_line`], with the result transposed
    /// for iteration.
    fn next(&mut self) -> Option<Self::Item> {
        self.next_line().transpose()
    }
}
