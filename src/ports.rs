//! Narrow interfaces to everything outside the process: the mount table,
//! block device metadata, filesystem tools, space allocation and the TRIM
//! command itself. Production implementations live in `collectors`.

use crate::error::TrimResult;
use crate::models::extent::FreeExtent;
use crate::models::mount::MountInfo;
use std::path::{Path, PathBuf};

pub trait MountRegistry {
    /// Live mount table in listing order.
    fn entries(&self) -> TrimResult<Vec<MountInfo>>;

    /// Device backing `/` according to the free-space query, used to
    /// replace the `/dev/root` placeholder.
    fn root_device(&self) -> TrimResult<PathBuf>;
}

pub trait DeviceProbe {
    /// Resolve symlinks such as /dev/disk/by-uuid/… to the device node.
    fn canonicalize(&self, dev: &Path) -> PathBuf;

    fn is_block_device(&self, dev: &Path) -> bool;

    /// Major number of a block device node.
    fn major(&self, dev: &Path) -> TrimResult<u64>;

    /// Whether the device advertises TRIM/Discard.
    fn trim_supported(&self, raw: &Path) -> TrimResult<bool>;

    /// First sector of `dev` on its whole-disk device (0 for whole disks).
    fn start_sector(&self, dev: &Path) -> TrimResult<u64>;
}

pub trait FsProbe {
    /// Filesystem type by signature, `None` when unrecognised.
    fn fs_type(&self, dev: &Path) -> TrimResult<Option<String>>;

    /// ext family: the "Filesystem state" token.
    fn ext_state(&self, dev: &Path) -> TrimResult<String>;

    /// ext family: full listing with "Block size:" and "Free blocks:" fields.
    fn ext_listing(&self, dev: &Path) -> TrimResult<String>;

    /// xfs: non-destructive consistency check; `true` when no errors are found.
    fn xfs_check(&self, dev: &Path) -> TrimResult<bool>;

    fn xfs_ag_count(&self, dev: &Path) -> TrimResult<u64>;

    /// Start sector of allocation group `ag` relative to the filesystem start.
    fn xfs_ag_offset(&self, dev: &Path, ag: u64) -> TrimResult<u64>;

    fn xfs_block_size(&self, dev: &Path) -> TrimResult<u64>;

    /// Per-AG free extent rows: `ag_index block_offset block_count`.
    fn xfs_listing(&self, dev: &Path) -> TrimResult<String>;
}

pub trait SpaceAllocator {
    /// Space available to unprivileged writers on the filesystem holding `dir`, in KB.
    fn free_kb(&self, dir: &Path) -> TrimResult<u64>;

    /// Create `file` and claim `bytes` of space for it without writing data.
    fn allocate(&self, file: &Path, bytes: u64) -> TrimResult<()>;

    /// Physical layout of `file` as absolute raw-device sector runs.
    fn extent_map(&self, file: &Path) -> TrimResult<Vec<FreeExtent>>;

    fn remove(&self, file: &Path) -> std::io::Result<()>;

    /// Flush filesystem buffers.
    fn sync(&self);
}

pub trait TrimExecutor {
    /// Discard the encoded `lba:count` ranges on `raw`.
    fn trim(&mut self, raw: &Path, ranges: &str) -> TrimResult<()>;
}
