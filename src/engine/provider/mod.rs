//! Free-extent discovery, one strategy per filesystem family and mode.

pub mod ext;
pub mod online;
pub mod xfs;

use crate::config::OnlineConfig;
use crate::engine::mode::{OperatingMode, Selection};
use crate::error::{TrimError, TrimResult};
use crate::models::device::{Device, FsType};
use crate::models::extent::FreeExtent;
use crate::ports::{FsProbe, SpaceAllocator};

pub use ext::ExtFreeSpace;
pub use online::OnlineFreeSpace;
pub use xfs::XfsFreeSpace;

/// Free extents in absolute raw-device sectors, in discovery order.
pub type ExtentStream<'a> = Box<dyn Iterator<Item = TrimResult<FreeExtent>> + 'a>;

pub enum FreeSpaceProvider<'a> {
    Ext(ExtFreeSpace),
    Xfs(XfsFreeSpace),
    Online(OnlineFreeSpace<'a>),
}

impl<'a> FreeSpaceProvider<'a> {
    /// Pick the strategy for this mode and filesystem and run its checks.
    pub fn prepare(
        sel: &Selection,
        fs_type: &FsType,
        device: &Device,
        fs: &dyn FsProbe,
        space: &'a dyn SpaceAllocator,
        online: &OnlineConfig,
    ) -> TrimResult<Self> {
        match (sel.mode, fs_type) {
            (OperatingMode::Offline, t) if t.is_ext() => {
                Ok(FreeSpaceProvider::Ext(ExtFreeSpace::prepare(&sel.fs_device, fs, device.offset)?))
            }
            (OperatingMode::Offline, FsType::Xfs) => {
                Ok(FreeSpaceProvider::Xfs(XfsFreeSpace::prepare(&sel.fs_device, fs, device.offset)?))
            }
            (OperatingMode::Online, t) if t.supports_fallocate() => {
                let dir = sel.workdir.as_deref().ok_or_else(|| {
                    TrimError::ModeResolutionFailed("online mode without a working directory".into())
                })?;
                Ok(FreeSpaceProvider::Online(OnlineFreeSpace::prepare(dir, space, online)?))
            }
            (mode, t) => Err(TrimError::UnsupportedFilesystem {
                mode:    mode.to_string(),
                fs_type: t.to_string(),
            }),
        }
    }

    pub fn extents(&self) -> ExtentStream<'_> {
        match self {
            FreeSpaceProvider::Ext(p)    => p.extents(),
            FreeSpaceProvider::Xfs(p)    => p.extents(),
            FreeSpaceProvider::Online(p) => p.extents(),
        }
    }
}

pub(crate) fn sectors_per_block(block_size: u64) -> TrimResult<u64> {
    if block_size < 512 || block_size % 512 != 0 {
        return Err(TrimError::MetadataUnavailable(format!(
            "block size {} is not a multiple of 512",
            block_size
        )));
    }
    Ok(block_size / 512)
}
