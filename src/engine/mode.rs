//! Online/offline mode selection.
//!
//! The mode is decided by a small state machine: the target kind picks a
//! candidate, then the mount state of the backing filesystem settles it.
//! A directory can only be trimmed through its mounted filesystem, so a
//! read-only mount falls back to offline; a block device is trimmed offline
//! unless something has it mounted read-write.

use crate::error::{TrimError, TrimResult};
use crate::models::mount::{MountInfo, MountTable};
use crate::models::target::{Target, TargetKind};
use crate::ports::MountRegistry;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Placeholder some mount tables use for the root filesystem's device.
pub const ROOT_PLACEHOLDER: &str = "/dev/root";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperatingMode {
    Online,
    Offline,
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OperatingMode::Online  => "online",
            OperatingMode::Offline => "offline",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeState {
    Unclassified,
    OnlineCandidate,
    OfflineCandidate,
    Online,
    Offline,
}

impl ModeState {
    pub fn classify(self, kind: TargetKind) -> ModeState {
        match (self, kind) {
            (ModeState::Unclassified, TargetKind::Directory)   => ModeState::OnlineCandidate,
            (ModeState::Unclassified, TargetKind::BlockDevice) => ModeState::OfflineCandidate,
            (other, _) => other,
        }
    }

    /// Settle a candidate against the mount state of the target's filesystem.
    pub fn resolve(self, mount: Option<&MountInfo>) -> TrimResult<ModeState> {
        match (self, mount) {
            (ModeState::OnlineCandidate, None) => Err(TrimError::ModeResolutionFailed(
                "directory is not on any mounted filesystem".into(),
            )),
            (ModeState::OnlineCandidate, Some(m)) | (ModeState::OfflineCandidate, Some(m)) => {
                Ok(if m.rw { ModeState::Online } else { ModeState::Offline })
            }
            (ModeState::OfflineCandidate, None) => Ok(ModeState::Offline),
            (ModeState::Unclassified, _) => Err(TrimError::ModeResolutionFailed(
                "target was never classified".into(),
            )),
            (terminal, _) => Ok(terminal),
        }
    }

    pub fn mode(self) -> Option<OperatingMode> {
        match self {
            ModeState::Online  => Some(OperatingMode::Online),
            ModeState::Offline => Some(OperatingMode::Offline),
            _ => None,
        }
    }
}

/// Frozen result of mode selection.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub mode:      OperatingMode,
    /// Device node holding the filesystem
    pub fs_device: PathBuf,
    /// Mount entry in effect, if the filesystem is mounted
    pub mount:     Option<MountInfo>,
    /// Where the online temporary file goes
    pub workdir:   Option<PathBuf>,
}

/// Read the mount table, replacing the root placeholder with the real device.
pub fn load_mount_table(registry: &dyn MountRegistry) -> TrimResult<MountTable> {
    let mut entries = registry.entries()?;
    if entries.iter().any(|e| e.device == Path::new(ROOT_PLACEHOLDER)) {
        let root = registry.root_device()?;
        log::debug!("substituting {} for {}", root.display(), ROOT_PLACEHOLDER);
        for e in entries.iter_mut().filter(|e| e.device == Path::new(ROOT_PLACEHOLDER)) {
            e.device = root.clone();
        }
    }
    Ok(MountTable::new(entries))
}

pub fn select(target: &Target, table: &MountTable) -> TrimResult<Selection> {
    let candidate = ModeState::Unclassified.classify(target.kind);

    let (fs_device, mount) = match target.kind {
        TargetKind::Directory => {
            let containing = table.containing(&target.path).ok_or_else(|| {
                TrimError::ModeResolutionFailed(format!(
                    "{} is not on any mounted filesystem",
                    target.path.display()
                ))
            })?;
            // the same device may be mounted again later in the table
            let latest = table.by_device(&containing.device).unwrap_or(containing);
            (containing.device.clone(), Some(latest.clone()))
        }
        TargetKind::BlockDevice => (target.path.clone(), table.by_device(&target.path).cloned()),
    };

    let state = candidate.resolve(mount.as_ref())?;
    let mode = state.mode().ok_or_else(|| {
        TrimError::ModeResolutionFailed(format!("selection stopped in state {:?}", state))
    })?;

    let workdir = match (mode, target.kind) {
        (OperatingMode::Online, TargetKind::Directory) => Some(target.path.clone()),
        (OperatingMode::Online, TargetKind::BlockDevice) => mount.as_ref().map(|m| m.mount.clone()),
        (OperatingMode::Offline, _) => None,
    };

    log::info!(
        "{} target {} → {} mode on {}",
        match target.kind { TargetKind::Directory => "directory", TargetKind::BlockDevice => "device" },
        target.path.display(),
        mode,
        fs_device.display()
    );
    Ok(Selection { mode, fs_device, mount, workdir })
}
