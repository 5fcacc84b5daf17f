//! ucdb Tools
//!
//! CLI tools for inspecting recorded uC++ runtime images offline.

use std::io::{self, BufRead, Write};
use std::path::Path;

use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt};
use ucdb_commands::Console;
use ucdb_core::DebuggerHost;
use ucdb_core::layout::{LayoutResult, RuntimeLayout};

/// Initialize logging with a default filter.
///
/// Use `RUST_LOG` environment variable to override the default filter.
/// Logs go to stderr so command output on stdout stays clean.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,ucdb_tools=info,ucdb_core=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

/// The profile at `path`, or the built-in default.
pub fn load_layout(path: Option<&Path>) -> LayoutResult<RuntimeLayout> {
    match path {
        Some(path) => RuntimeLayout::load(path),
        None => Ok(RuntimeLayout::default()),
    }
}

/// Run every non-blank, non-comment line of `input` through `console`,
/// echoing each command after a `(ucdb) ` prompt. Returns the number of
/// commands run.
pub fn replay<H, R, W>(console: &mut Console<H>, input: R, mut output: W) -> io::Result<usize>
where
    H: DebuggerHost,
    R: BufRead,
    W: Write,
{
    let mut count = 0;
    for line in input.lines() {
        let line = line?;
        let command = line.trim();
        if command.is_empty() || command.starts_with('#') {
            continue;
        }
        writeln!(output, "(ucdb) {command}")?;
        for printed in console.execute(command) {
            writeln!(output, "{printed}")?;
        }
        count += 1;
    }
    debug!(count, "replay finished");
    Ok(count)
}
