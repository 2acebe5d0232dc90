use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Filesystem family as far as free-space discovery is concerned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "String")]
pub enum FsType {
    Ext2,
    Ext3,
    Ext4,
    Xfs,
    Other(String),
}

impl FsType {
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "ext2" => FsType::Ext2,
            "ext3" => FsType::Ext3,
            "ext4" => FsType::Ext4,
            "xfs"  => FsType::Xfs,
            other  => FsType::Other(other.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            FsType::Ext2     => "ext2",
            FsType::Ext3     => "ext3",
            FsType::Ext4     => "ext4",
            FsType::Xfs      => "xfs",
            FsType::Other(s) => s,
        }
    }

    pub fn is_ext(&self) -> bool {
        matches!(self, FsType::Ext2 | FsType::Ext3 | FsType::Ext4)
    }

    /// ext2/ext3 have no fallocate support, so they cannot be trimmed online.
    pub fn supports_fallocate(&self) -> bool {
        !matches!(self, FsType::Ext2 | FsType::Ext3)
    }
}

impl fmt::Display for FsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<FsType> for String {
    fn from(t: FsType) -> String {
        t.label().to_string()
    }
}

/// The whole-disk device a filesystem lives on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Device {
    pub raw:          PathBuf,
    /// First sector of the filesystem on `raw`
    pub offset:       u64,
    pub trim_capable: bool,
}

/// Strip a trailing partition number: sda3 → sda, nvme0n1p2 → nvme0n1,
/// mmcblk0p1 → mmcblk0. Names without a partition suffix come back unchanged.
pub fn strip_partition(name: &str) -> &str {
    let digits = name.len() - name.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 || digits == name.len() {
        return name;
    }
    let stem = &name[..name.len() - digits];

    // nvme0n1p2, mmcblk0p1, loop0p1: the suffix is introduced by 'p' after a digit
    let p_style = ["nvme", "mmcblk", "loop", "nbd", "md"].iter().any(|p| name.starts_with(p));
    if p_style {
        return match stem.strip_suffix('p') {
            Some(base) if base.ends_with(|c: char| c.is_ascii_digit()) => base,
            _ => name,
        };
    }
    if name.starts_with("dm-") {
        return name;
    }
    stem
}
