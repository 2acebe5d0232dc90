//! Production implementations of the ports: /proc, /sys, and the usual
//! Linux filesystem tools.

pub mod blockdev;
pub mod filesystem;
pub mod fstools;
pub mod hdparm;
pub mod mounts;

use crate::error::{TrimError, TrimResult};
use std::ffi::OsStr;
use std::io;
use std::process::{Command, Output};

/// Run `bin` to completion, capturing its output. A missing executable is
/// an environment problem rather than an I/O failure.
pub(crate) fn run_tool<I, S>(bin: &str, args: I) -> TrimResult<Output>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut cmd = Command::new(bin);
    cmd.args(args);
    log::trace!("running {:?}", cmd);
    cmd.output().map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => TrimError::Environment(format!("{} not found", bin)),
        _ => TrimError::Io(e),
    })
}

/// First line of stderr, for diagnostics.
pub(crate) fn stderr_line(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr)
        .lines()
        .next()
        .unwrap_or("")
        .trim()
        .to_string()
}
