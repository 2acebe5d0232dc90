use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub limits: Limits,

    #[serde(default)]
    pub online: OnlineConfig,

    #[serde(default)]
    pub tools: ToolsConfig,
}

/// Hard per-command limits of a single TRIM invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Largest sector count one range can carry (16-bit field)
    pub max_range_sectors: u64,
    /// Ranges per command: 255 blocks of 512 bytes, 8 bytes per range
    pub max_ranges: usize,
    /// Upper bound on the encoded "lba:count" text handed to one command
    pub max_encoded_len: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OnlineConfig {
    /// Refuse to run online with less free space than this (KB)
    pub min_free_kb: u64,
    /// Space always left unallocated for concurrent activity (KB)
    pub reserve_min_kb: u64,
    /// Percentage of free space reserved when larger than `reserve_min_kb`
    pub reserve_pct: u64,
    /// Temporary file name prefix; the process id is appended
    pub temp_file_prefix: String,
}

/// Executable names for the external tools, looked up on PATH.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub hdparm:     String,
    pub dumpe2fs:   String,
    pub xfs_db:     String,
    pub xfs_repair: String,
    pub blkid:      String,
    pub df:         String,
}

// ── Defaults ─────────────────────────────────────────────────────────

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_range_sectors: 65535,
            max_ranges:        255 * 512 / 8,
            max_encoded_len:   64000,
        }
    }
}

impl Default for OnlineConfig {
    fn default() -> Self {
        Self {
            min_free_kb:      15000,
            reserve_min_kb:   7500,
            reserve_pct:      1,
            temp_file_prefix: "WIPER_TMPFILE.".into(),
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            hdparm:     "hdparm".into(),
            dumpe2fs:   "dumpe2fs".into(),
            xfs_db:     "xfs_db".into(),
            xfs_repair: "xfs_repair".into(),
            blkid:      "blkid".into(),
            df:         "df".into(),
        }
    }
}

impl ToolsConfig {
    pub fn all(&self) -> [&str; 6] {
        [&self.hdparm, &self.dumpe2fs, &self.xfs_db, &self.xfs_repair, &self.blkid, &self.df]
    }
}

// ── Load ──────────────────────────────────────────────────────────────

impl Config {
    /// Load the user config, falling back to defaults when absent or unreadable.
    pub fn load() -> Self {
        let path = match Config::config_path() {
            Some(p) => p,
            None    => return Config::default(),
        };
        match Config::from_path(&path) {
            Ok(c)  => c,
            Err(e) => {
                log::debug!("using default config ({}: {:#})", path.display(), e);
                Config::default()
            }
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let cfg: Config = toml::from_str(&text)?;
        Ok(cfg)
    }

    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("trimsweep").join("trimsweep.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_command_limits() {
        let l = Limits::default();
        assert_eq!(l.max_ranges, 16320);
        assert_eq!(l.max_range_sectors, 65535);
        assert_eq!(l.max_encoded_len, 64000);
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "[online]\nmin_free_kb = 30000\n\n[tools]\nhdparm = \"/sbin/hdparm\"").unwrap();

        let cfg = Config::from_path(f.path()).unwrap();
        assert_eq!(cfg.online.min_free_kb, 30000);
        assert_eq!(cfg.online.reserve_min_kb, 7500);
        assert_eq!(cfg.tools.hdparm, "/sbin/hdparm");
        assert_eq!(cfg.tools.blkid, "blkid");
        assert_eq!(cfg.limits.max_ranges, 16320);
    }

    #[test]
    fn unreadable_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::from_path(&dir.path().join("missing.toml")).is_err());
    }
}
