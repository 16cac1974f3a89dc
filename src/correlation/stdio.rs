//! Stdout writer for marker lines.
//!
//! - **stdout**: marker lines only (one per line, parsed by the collector)
//! - **stderr**: diagnostic logs
//! - **Never use `println!`**: It may add `\r\n` on Windows

use std::io::Write;

/// Write a line to stdout.
///
/// Writes the string followed by a single `\n` and flushes, holding the
/// stdout lock for the whole line so concurrent writers cannot interleave
/// within it.
///
/// # Errors
///
/// Returns IO error if write or flush fails.
pub fn write_stdout_line(line: &str) -> std::io::Result<()> {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    handle.write_all(line.as_bytes())?;
    handle.write_all(b"\n")?;
    handle.flush()?;
    Ok(())
}
