use std::path::{Path, PathBuf};

/// One line of the live mount table.
#[derive(Debug, Clone, PartialEq)]
pub struct MountInfo {
    pub device:  PathBuf,
    pub mount:   PathBuf,
    pub fs_type: String,
    pub rw:      bool,
}

/// Snapshot of the mount table, in listing order.
#[derive(Debug, Clone, Default)]
pub struct MountTable {
    pub entries: Vec<MountInfo>,
}

impl MountTable {
    pub fn new(entries: Vec<MountInfo>) -> Self {
        Self { entries }
    }

    /// Most recent entry backed by `device`.
    pub fn by_device(&self, device: &Path) -> Option<&MountInfo> {
        self.entries.iter().rev().find(|e| e.device == device)
    }

    /// Entry whose mount point most closely contains `path`.
    /// Among entries for the same mount point the most recent one wins.
    pub fn containing(&self, path: &Path) -> Option<&MountInfo> {
        let mut best: Option<&MountInfo> = None;
        for e in &self.entries {
            if !path.starts_with(&e.mount) { continue; }
            let deeper = best.map_or(true, |b| e.mount.components().count() >= b.mount.components().count());
            if deeper { best = Some(e); }
        }
        best
    }
}
