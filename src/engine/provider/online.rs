use super::ExtentStream;
use crate::config::OnlineConfig;
use crate::engine::cleanup::TempFileGuard;
use crate::error::{TrimError, TrimResult};
use crate::models::extent::FreeExtent;
use crate::ports::SpaceAllocator;
use std::path::Path;

/// How much of the free space the temporary file will claim, in KB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationPlan {
    pub free_kb:    u64,
    pub reserve_kb: u64,
    pub alloc_kb:   u64,
}

impl AllocationPlan {
    pub fn compute(free_kb: u64, cfg: &OnlineConfig) -> TrimResult<Self> {
        if free_kb < cfg.min_free_kb {
            return Err(TrimError::InsufficientSpace { free_kb, required_kb: cfg.min_free_kb });
        }
        let reserve_kb = (free_kb * cfg.reserve_pct / 100).max(cfg.reserve_min_kb);
        let alloc_kb = free_kb.saturating_sub(reserve_kb);
        if alloc_kb == 0 {
            return Err(TrimError::InsufficientSpace { free_kb, required_kb: reserve_kb + 1 });
        }
        Ok(Self { free_kb, reserve_kb, alloc_kb })
    }
}

/// Free space of a mounted filesystem, found by claiming it with a
/// temporary file and reading back where the filesystem put it.
pub struct OnlineFreeSpace<'a> {
    extents: Vec<FreeExtent>,
    guard:   TempFileGuard<'a>,
}

impl<'a> OnlineFreeSpace<'a> {
    pub fn prepare(workdir: &Path, space: &'a dyn SpaceAllocator, cfg: &OnlineConfig) -> TrimResult<Self> {
        let plan = AllocationPlan::compute(space.free_kb(workdir)?, cfg)?;
        log::info!(
            "{} KB free, reserving {} KB, allocating {} KB",
            plan.free_kb, plan.reserve_kb, plan.alloc_kb
        );

        let name = format!("{}{}", cfg.temp_file_prefix, std::process::id());
        let guard = TempFileGuard::new(workdir.join(name), space);
        space.allocate(guard.path(), plan.alloc_kb * 1024)?;

        let extents = space.extent_map(guard.path())?;
        log::debug!("{} has {} extents", guard.path().display(), extents.len());
        Ok(Self { extents, guard })
    }

    pub fn temp_file(&self) -> &Path {
        self.guard.path()
    }

    pub fn extents(&self) -> ExtentStream<'_> {
        Box::new(self.extents.iter().copied().map(Ok))
    }
}
