//! Error kinds for a TRIM run. Every variant is fatal; none are retried.

use std::path::PathBuf;
use thiserror::Error;

pub type TrimResult<T> = Result<T, TrimError>;

#[derive(Error, Debug)]
pub enum TrimError {
    /// Missing tooling or insufficient privilege
    #[error("environment: {0}")]
    Environment(String),

    /// Target path does not exist or is neither a directory nor a block device
    #[error("invalid target {}: {reason}", path.display())]
    TargetInvalid { path: PathBuf, reason: String },

    #[error("cannot determine operating mode: {0}")]
    ModeResolutionFailed(String),

    #[error("cannot resolve raw device: {0}")]
    DeviceResolutionFailed(String),

    #[error("{} does not advertise TRIM/Discard support", .0.display())]
    CapabilityUnsupported(PathBuf),

    #[error("cannot determine filesystem type of {}", .0.display())]
    FilesystemTypeUnknown(PathBuf),

    #[error("{} is not clean; run '{remedy}' first", device.display())]
    NotClean { device: PathBuf, remedy: String },

    #[error("no {mode} free-space strategy for filesystem type '{fs_type}'")]
    UnsupportedFilesystem { mode: String, fs_type: String },

    #[error("only {free_kb} KB free, at least {required_kb} KB required")]
    InsufficientSpace { free_kb: u64, required_kb: u64 },

    #[error("filesystem metadata unavailable: {0}")]
    MetadataUnavailable(String),

    #[error("inconsistent filesystem metadata: {0}")]
    InconsistentMetadata(String),

    #[error("could not allocate {bytes} bytes for {}: {reason}", path.display())]
    AllocationFailed { path: PathBuf, bytes: u64, reason: String },

    #[error("TRIM command failed on {} (exit status {})", device.display(), code.map_or("unknown".to_string(), |c| c.to_string()))]
    TrimCommandFailed { device: PathBuf, code: Option<i32> },

    /// Unexpected text from an external tool
    #[error("unexpected output from {tool}: {detail}")]
    MalformedOutput { tool: String, detail: String },

    #[error("interrupted")]
    Interrupted,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TrimError {
    /// Process exit status for this error. A failed TRIM passes the
    /// command's own status through; everything else has a fixed code.
    pub fn exit_code(&self) -> i32 {
        match self {
            TrimError::TrimCommandFailed { code, .. } => match code {
                Some(c) if (1..=255).contains(c) => *c,
                _ => 1,
            },
            TrimError::Environment(_)                 => 2,
            TrimError::TargetInvalid { .. }           => 3,
            TrimError::ModeResolutionFailed(_)        => 4,
            TrimError::DeviceResolutionFailed(_)      => 5,
            TrimError::CapabilityUnsupported(_)       => 6,
            TrimError::FilesystemTypeUnknown(_)       => 7,
            TrimError::NotClean { .. }                => 8,
            TrimError::UnsupportedFilesystem { .. }   => 9,
            TrimError::InsufficientSpace { .. }       => 10,
            TrimError::MetadataUnavailable(_)         => 11,
            TrimError::InconsistentMetadata(_)        => 12,
            TrimError::AllocationFailed { .. }        => 13,
            TrimError::MalformedOutput { .. }         => 14,
            TrimError::Io(_)                          => 15,
            TrimError::Interrupted                    => 130,
        }
    }

    pub fn malformed(tool: &str, detail: impl Into<String>) -> Self {
        TrimError::MalformedOutput { tool: tool.to_string(), detail: detail.into() }
    }
}
