use super::hdparm::Hdparm;
use crate::error::{TrimError, TrimResult};
use crate::ports::DeviceProbe;
use std::fs;
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};

/// Block device metadata from the device nodes, sysfs and `hdparm -I`.
pub struct SysBlock {
    pub hdparm:   Hdparm,
    pub sys_root: PathBuf,
}

impl SysBlock {
    pub fn new(hdparm: Hdparm) -> Self {
        Self { hdparm, sys_root: PathBuf::from("/sys/class/block") }
    }

    fn sys_attr(&self, dev: &Path, attr: &str) -> Option<String> {
        let name = dev.file_name()?;
        fs::read_to_string(self.sys_root.join(name).join(attr))
            .ok()
            .map(|s| s.trim().to_string())
    }
}

impl DeviceProbe for SysBlock {
    fn canonicalize(&self, dev: &Path) -> PathBuf {
        fs::canonicalize(dev).unwrap_or_else(|_| dev.to_path_buf())
    }

    fn is_block_device(&self, dev: &Path) -> bool {
        fs::metadata(dev).map(|m| m.file_type().is_block_device()).unwrap_or(false)
    }

    fn major(&self, dev: &Path) -> TrimResult<u64> {
        use nix::sys::stat::{major, stat, SFlag};
        let st = stat(dev).map_err(|e| {
            TrimError::DeviceResolutionFailed(format!("{}: {}", dev.display(), e))
        })?;
        if SFlag::from_bits_truncate(st.st_mode) & SFlag::S_IFMT != SFlag::S_IFBLK {
            return Err(TrimError::DeviceResolutionFailed(format!(
                "{} is not a block device",
                dev.display()
            )));
        }
        Ok(major(st.st_rdev))
    }

    fn trim_supported(&self, raw: &Path) -> TrimResult<bool> {
        if let Some(supported) = self.hdparm.identify_trim(raw)? {
            return Ok(supported);
        }
        // drives hdparm cannot identify still report discard limits in sysfs
        let max = self
            .sys_attr(raw, "queue/discard_max_bytes")
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(0);
        Ok(max > 0)
    }

    fn start_sector(&self, dev: &Path) -> TrimResult<u64> {
        match self.sys_attr(dev, "start") {
            None    => Ok(0),
            Some(s) => s.parse().map_err(|_| {
                TrimError::malformed("sysfs", format!("start sector '{}' for {}", s, dev.display()))
            }),
        }
    }
}
