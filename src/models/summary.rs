use crate::engine::mode::OperatingMode;
use crate::models::device::{Device, FsType};
use crate::models::target::Target;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::path::PathBuf;

/// Running totals of what was (or would have been) trimmed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TrimStats {
    pub batches: u64,
    pub ranges:  u64,
    pub sectors: u64,
}

/// Outcome of one complete run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Local>,
    pub target:     Target,
    pub mode:       OperatingMode,
    pub fs_device:  PathBuf,
    pub fs_type:    FsType,
    pub device:     Device,
    pub committed:  bool,
    pub stats:      TrimStats,
}
