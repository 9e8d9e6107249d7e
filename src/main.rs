//! Merge line-oriented streams into a single stream.
//!
//! Usage:
//!     linemerge [path...]
//!
//! Standard input is always merged as the first source, whether or not file
//! arguments are given. Merged lines go to standard output; diagnostics go
//! to standard error.

use std::io;
use std::process;

use tracing::debug;
use tracing_subscriber::EnvFilter;

use linemerge::MergedLines;

fn run() -> Result<u64, linemerge::Error> {
    let mut lines = MergedLines::new();

    lines.add_stdin()?;
    for path in std::env::args_os().skip(1) {
        lines.add_file(path)?;
    }

    let mut out = io::stdout().lock();
    lines.copy_to(&mut out)
}

fn main() {
    // Diagnostics must stay off stdout, which carries the merged stream.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    match run() {
        Ok(emitted) => debug!(emitted, "merge complete"),
        Err(err) => {
            eprintln!("linemerge: {err}");
            process::exit(1);
        }
    }
}
