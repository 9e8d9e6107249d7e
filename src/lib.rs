//! A library and CLI providing readiness-driven, multiplexed merging of
//! line-oriented streams.
//!
//! An arbitrary number of line-delimited byte streams (standard input plus
//! any number of files) are merged into a single stream: each source is read
//! without blocking into its own buffer, and complete lines are emitted
//! round-robin as soon as they are available, so no source is drained to
//! exhaustion while the others sit on ready data.
//!
//! ## Example
//!
//! ```no_run
//! use linemerge::MergedLines;
//!
//! fn main() -> Result<(), linemerge::Error> {
//!     let mut lines = MergedLines::new();
//!
//!     // Register the sources to merge; standard input is one among others.
//!     lines.add_stdin()?;
//!     lines.add_file("some/file.log")?;
//!     lines.add_file("/some/other/file.log")?;
//!
//!     // Pull merged lines until every source is exhausted.
//!     while let Some(line) = lines.next_line()? {
//!         println!("{}", String::from_utf8_lossy(line.as_bytes()));
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Caveats
//!
//! Lines are emitted in readiness order and carry no indication of their
//! originating source. A source that never produces the delimiter buffers
//! without bound, and a trailing fragment not closed by the delimiter is
//! dropped at end-of-input.

#[cfg(not(unix))]
compile_error!("linemerge waits on poll(2) over raw descriptors and only supports Unix platforms");

mod merge;
mod source;

pub use merge::{Line, MergedLines};
pub use source::{Error, DELIMITER};

#[cfg(doctest)]
doc_comment::doctest!("../README.md");
