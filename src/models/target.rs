use crate::error::{TrimError, TrimResult};
use serde::Serialize;
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetKind {
    Directory,
    BlockDevice,
}

/// What the user asked us to trim.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Target {
    pub path: PathBuf,
    pub kind: TargetKind,
}

impl Target {
    pub fn new(path: impl Into<PathBuf>, kind: TargetKind) -> Self {
        Self { path: path.into(), kind }
    }

    /// Canonicalize `path` and classify it as a directory or block device.
    pub fn classify(path: &Path) -> TrimResult<Self> {
        let invalid = |reason: String| TrimError::TargetInvalid { path: path.to_path_buf(), reason };

        let canonical = std::fs::canonicalize(path).map_err(|e| invalid(e.to_string()))?;
        let meta = std::fs::metadata(&canonical).map_err(|e| invalid(e.to_string()))?;
        let ft = meta.file_type();
        let kind = if ft.is_dir() {
            TargetKind::Directory
        } else if ft.is_block_device() {
            TargetKind::BlockDevice
        } else {
            return Err(invalid("not a directory or block device".into()));
        };
        Ok(Self::new(canonical, kind))
    }
}
