use super::hdparm::Hdparm;
use crate::error::{TrimError, TrimResult};
use crate::models::extent::FreeExtent;
use crate::ports::SpaceAllocator;
use nix::errno::Errno;
use std::fs::OpenOptions;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::Path;

/// Space management on a mounted filesystem.
pub struct LocalSpace {
    pub hdparm: Hdparm,
}

impl LocalSpace {
    pub fn new(hdparm: Hdparm) -> Self {
        Self { hdparm }
    }
}

impl SpaceAllocator for LocalSpace {
    fn free_kb(&self, dir: &Path) -> TrimResult<u64> {
        use nix::sys::statvfs::statvfs;
        let stat = statvfs(dir).map_err(|e| TrimError::Io(e.into()))?;

        let frsize = stat.fragment_size() as u64;
        let avail_bytes  = stat.blocks_available() * frsize;
        Ok(avail_bytes / 1024)
    }

    fn allocate(&self, file: &Path, bytes: u64) -> TrimResult<()> {
        let failed = |reason: String| TrimError::AllocationFailed { path: file.to_path_buf(), bytes, reason };
        let f = OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(0o600)
            .open(file)
            .map_err(|e| failed(e.to_string()))?;
        let len = libc::off_t::try_from(bytes).map_err(|_| failed("size out of range".into()))?;
        // SAFETY: plain syscall on a descriptor we own for the duration of the call.
        Errno::result(unsafe { libc::fallocate(f.as_raw_fd(), 0, 0, len) })
            .map_err(|e| failed(e.desc().to_string()))?;
        f.sync_all().map_err(|e| failed(e.to_string()))?;
        log::debug!("allocated {} bytes to {}", bytes, file.display());
        Ok(())
    }

    fn extent_map(&self, file: &Path) -> TrimResult<Vec<FreeExtent>> {
        // the block map is only stable once allocation metadata is on disk
        self.sync();
        self.hdparm.fibmap(file)
    }

    fn remove(&self, file: &Path) -> std::io::Result<()> {
        std::fs::remove_file(file)
    }

    fn sync(&self) {
        nix::unistd::sync();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_space_of_temp_dir() {
        let dir = tempfile::tempdir().unwrap();
        let space = LocalSpace::new(Hdparm::new("hdparm"));
        assert!(space.free_kb(dir.path()).is_ok());
    }

    #[test]
    fn allocation_refuses_existing_file() {
        let f = tempfile::NamedTempFile::new().unwrap();
        let space = LocalSpace::new(Hdparm::new("hdparm"));
        let err = space.allocate(f.path(), 4096).unwrap_err();
        assert!(matches!(err, TrimError::AllocationFailed { .. }));
    }
}
