//! Interrupt handling and the temporary-file guard.

use crate::error::{TrimError, TrimResult};
use crate::ports::SpaceAllocator;
use nix::sys::signal::{signal, SigHandler, Signal};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_signal(_: libc::c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

/// Route SIGINT, SIGTERM and SIGHUP to a flag the pipeline polls between
/// extents and batches. Returns that flag.
pub fn install_signal_handlers() -> TrimResult<&'static AtomicBool> {
    for sig in [Signal::SIGINT, Signal::SIGTERM, Signal::SIGHUP] {
        // SAFETY: the handler only stores to an atomic, which is async-signal-safe.
        unsafe { signal(sig, SigHandler::Handler(on_signal)) }
            .map_err(|e| TrimError::Environment(format!("cannot install {} handler: {}", sig, e)))?;
    }
    Ok(&INTERRUPTED)
}

/// Owns the online temporary file: removes it and syncs when dropped,
/// whether the run succeeded, failed or was interrupted.
pub struct TempFileGuard<'a> {
    path:  PathBuf,
    space: &'a dyn SpaceAllocator,
}

impl<'a> TempFileGuard<'a> {
    pub fn new(path: PathBuf, space: &'a dyn SpaceAllocator) -> Self {
        Self { path, space }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempFileGuard<'_> {
    fn drop(&mut self) {
        match self.space.remove(&self.path) {
            Ok(()) => log::debug!("removed {}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("could not remove {}: {}", self.path.display(), e),
        }
        self.space.sync();
    }
}
