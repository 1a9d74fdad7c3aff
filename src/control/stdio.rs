//! JSON output on stdout.
//!
//! stdout carries exactly one JSON document per line (final status or a
//! validation report); logs go to stderr through `tracing`.

use std::io::Write;

use serde::Serialize;

use crate::error::Result;

/// Serialize `value` and write it to `out` followed by a single `\n`.
pub fn write_json_line<W: Write, T: Serialize>(out: &mut W, value: &T) -> Result<()> {
    serde_json::to_writer(&mut *out, value)?;
    out.write_all(b"\n")?;
    out.flush()?;
    Ok(())
}

/// Write a JSON value to stdout as a single line.
pub fn write_stdout_json<T: Serialize>(value: &T) -> Result<()> {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    write_json_line(&mut handle, value)
}
