use crate::error::{TrimError, TrimResult};
use crate::models::device::{strip_partition, Device};
use crate::ports::DeviceProbe;
use std::path::Path;

/// Derive the whole-disk device under `fs_device`, check it can take TRIM
/// and find where the filesystem starts on it.
///
/// Without `commit`, missing TRIM support only warns so a dry run can still
/// show what would be trimmed.
pub fn resolve(fs_device: &Path, probe: &dyn DeviceProbe, commit: bool) -> TrimResult<Device> {
    let fs_device = probe.canonicalize(fs_device);
    let name = fs_device
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| TrimError::DeviceResolutionFailed(format!("bad device path {}", fs_device.display())))?;

    let raw = fs_device.with_file_name(strip_partition(name));

    if !probe.is_block_device(&raw) {
        return Err(TrimError::DeviceResolutionFailed(format!(
            "{} is not a block device",
            raw.display()
        )));
    }
    let fs_major = probe.major(&fs_device)?;
    let raw_major = probe.major(&raw)?;
    if fs_major != raw_major {
        return Err(TrimError::DeviceResolutionFailed(format!(
            "{} (major {}) does not look like the disk holding {} (major {})",
            raw.display(), raw_major, fs_device.display(), fs_major
        )));
    }

    let trim_capable = probe.trim_supported(&raw)?;
    if !trim_capable {
        if commit {
            return Err(TrimError::CapabilityUnsupported(raw));
        }
        log::warn!("{} does not advertise TRIM support; continuing dry run", raw.display());
    }

    let offset = probe.start_sector(&fs_device)?;
    log::debug!("{} starts at sector {} of {}", fs_device.display(), offset, raw.display());

    Ok(Device { raw, offset, trim_capable })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::PathBuf;

    /// Block devices keyed by path: (major, start sector, trim support).
    pub struct FakeDisks {
        pub nodes: HashMap<PathBuf, (u64, u64, bool)>,
    }

    impl FakeDisks {
        pub fn new(nodes: &[(&str, u64, u64, bool)]) -> Self {
            Self {
                nodes: nodes.iter().map(|(p, maj, start, trim)| (PathBuf::from(p), (*maj, *start, *trim))).collect(),
            }
        }

        fn node(&self, dev: &Path) -> TrimResult<(u64, u64, bool)> {
            self.nodes
                .get(dev)
                .copied()
                .ok_or_else(|| TrimError::DeviceResolutionFailed(format!("no {}", dev.display())))
        }
    }

    impl DeviceProbe for FakeDisks {
        fn canonicalize(&self, dev: &Path) -> PathBuf {
            dev.to_path_buf()
        }
        fn is_block_device(&self, dev: &Path) -> bool {
            self.nodes.contains_key(dev)
        }
        fn major(&self, dev: &Path) -> TrimResult<u64> {
            Ok(self.node(dev)?.0)
        }
        fn trim_supported(&self, raw: &Path) -> TrimResult<bool> {
            Ok(self.node(raw)?.2)
        }
        fn start_sector(&self, dev: &Path) -> TrimResult<u64> {
            Ok(self.node(dev)?.1)
        }
    }

    #[test]
    fn resolves_partition_to_disk() {
        let disks = FakeDisks::new(&[("/dev/sda", 8, 0, true), ("/dev/sda2", 8, 2048, true)]);
        let dev = resolve(Path::new("/dev/sda2"), &disks, true).unwrap();
        assert_eq!(dev, Device { raw: "/dev/sda".into(), offset: 2048, trim_capable: true });
    }

    #[test]
    fn whole_disk_filesystem_has_zero_offset() {
        let disks = FakeDisks::new(&[("/dev/nvme0n1", 259, 0, true)]);
        let dev = resolve(Path::new("/dev/nvme0n1"), &disks, true).unwrap();
        assert_eq!(dev.raw, PathBuf::from("/dev/nvme0n1"));
        assert_eq!(dev.offset, 0);
    }

    #[test]
    fn major_mismatch_fails() {
        let disks = FakeDisks::new(&[("/dev/sdd", 65, 0, true), ("/dev/sdd1", 8, 0, true)]);
        let err = resolve(Path::new("/dev/sdd1"), &disks, false).unwrap_err();
        assert!(matches!(err, TrimError::DeviceResolutionFailed(_)));
    }

    #[test]
    fn missing_raw_device_fails() {
        let disks = FakeDisks::new(&[("/dev/sdb1", 8, 63, true)]);
        let err = resolve(Path::new("/dev/sdb1"), &disks, false).unwrap_err();
        assert!(matches!(err, TrimError::DeviceResolutionFailed(_)));
    }

    #[test]
    fn missing_trim_support_only_fatal_when_committing() {
        let disks = FakeDisks::new(&[("/dev/sdc", 8, 0, false), ("/dev/sdc1", 8, 2048, false)]);
        let dev = resolve(Path::new("/dev/sdc1"), &disks, false).unwrap();
        assert!(!dev.trim_capable);

        let err = resolve(Path::new("/dev/sdc1"), &disks, true).unwrap_err();
        assert!(matches!(err, TrimError::CapabilityUnsupported(_)));
    }
}
