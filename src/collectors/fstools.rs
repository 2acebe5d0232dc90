use super::{run_tool, stderr_line};
use crate::config::ToolsConfig;
use crate::error::{TrimError, TrimResult};
use crate::ports::FsProbe;
use std::ffi::OsStr;
use std::path::Path;
use std::process::Output;

/// Filesystem inspection through blkid, e2fsprogs and xfsprogs.
pub struct FsTools {
    pub tools: ToolsConfig,
}

impl FsTools {
    pub fn new(tools: ToolsConfig) -> Self {
        Self { tools }
    }

    fn dumpe2fs(&self, dev: &Path, header_only: bool) -> TrimResult<String> {
        let out = if header_only {
            run_tool(&self.tools.dumpe2fs, [Path::new("-h"), dev])?
        } else {
            run_tool(&self.tools.dumpe2fs, [dev])?
        };
        stdout_or_unavailable(&self.tools.dumpe2fs, dev, out)
    }

    fn xfs_db(&self, dev: &Path, commands: &[&str]) -> TrimResult<String> {
        let mut args: Vec<&OsStr> = vec![OsStr::new("-r")];
        for c in commands {
            args.push(OsStr::new("-c"));
            args.push(OsStr::new(c));
        }
        args.push(dev.as_os_str());
        let out = run_tool(&self.tools.xfs_db, args)?;
        stdout_or_unavailable(&self.tools.xfs_db, dev, out)
    }

    fn xfs_sb_field(&self, dev: &Path, field: &str) -> TrimResult<u64> {
        let text = self.xfs_db(dev, &["sb 0", &format!("p {}", field)])?;
        parse_assignment(&text, field)
            .ok_or_else(|| TrimError::MetadataUnavailable(format!("no {} in superblock of {}", field, dev.display())))
    }
}

impl FsProbe for FsTools {
    fn fs_type(&self, dev: &Path) -> TrimResult<Option<String>> {
        let out = run_tool(&self.tools.blkid, [Path::new("-o"), Path::new("value"), Path::new("-s"), Path::new("TYPE"), dev])?;
        // blkid exits 2 when no signature is found
        if !out.status.success() {
            return Ok(None);
        }
        let t = String::from_utf8_lossy(&out.stdout).trim().to_string();
        Ok(if t.is_empty() { None } else { Some(t) })
    }

    fn ext_state(&self, dev: &Path) -> TrimResult<String> {
        let text = self.dumpe2fs(dev, true)?;
        text.lines()
            .find_map(|l| l.strip_prefix("Filesystem state:"))
            .map(|s| s.trim().to_string())
            .ok_or_else(|| TrimError::MetadataUnavailable(format!("no filesystem state for {}", dev.display())))
    }

    fn ext_listing(&self, dev: &Path) -> TrimResult<String> {
        Ok(group_listing(&self.dumpe2fs(dev, false)?))
    }

    fn xfs_check(&self, dev: &Path) -> TrimResult<bool> {
        let out = run_tool(&self.tools.xfs_repair, [Path::new("-n"), dev])?;
        if !out.status.success() {
            log::error!("{} -n {}: {}", self.tools.xfs_repair, dev.display(), stderr_line(&out));
        }
        Ok(out.status.success())
    }

    fn xfs_ag_count(&self, dev: &Path) -> TrimResult<u64> {
        self.xfs_sb_field(dev, "agcount")
    }

    fn xfs_ag_offset(&self, dev: &Path, ag: u64) -> TrimResult<u64> {
        let text = self.xfs_db(dev, &[&format!("convert agno {} daddr", ag)])?;
        parse_convert(&text).ok_or_else(|| {
            TrimError::MetadataUnavailable(format!("no start sector for AG {} of {}", ag, dev.display()))
        })
    }

    fn xfs_block_size(&self, dev: &Path) -> TrimResult<u64> {
        self.xfs_sb_field(dev, "blocksize")
    }

    fn xfs_listing(&self, dev: &Path) -> TrimResult<String> {
        self.xfs_db(dev, &["freesp -d"])
    }
}

fn stdout_or_unavailable(tool: &str, dev: &Path, out: Output) -> TrimResult<String> {
    if !out.status.success() {
        return Err(TrimError::MetadataUnavailable(format!(
            "{} {}: {}",
            tool, dev.display(), stderr_line(&out)
        )));
    }
    Ok(String::from_utf8_lossy(&out.stdout).into_owned())
}

/// dumpe2fs prints a superblock summary "Free blocks: <total>" before the
/// per-group lists; only the indented group lines describe actual ranges.
fn group_listing(text: &str) -> String {
    text.lines()
        .filter(|l| !l.starts_with("Free blocks:"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// "agcount = 4" → 4
fn parse_assignment(text: &str, field: &str) -> Option<u64> {
    text.lines().find_map(|l| {
        let (k, v) = l.split_once('=')?;
        if k.trim() != field { return None; }
        v.trim().parse().ok()
    })
}

/// "0x1f400 (128000)" → 128000; a bare decimal or hex number is accepted too.
fn parse_convert(text: &str) -> Option<u64> {
    let line = text.lines().map(str::trim).find(|l| !l.is_empty())?;
    if let Some((_, rest)) = line.split_once('(') {
        return rest.trim_end_matches(')').trim().parse().ok();
    }
    match line.strip_prefix("0x") {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None      => line.parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn superblock_summary_is_dropped() {
        let text = "\
Block count:              262144
Free blocks:              250000
Block size:               4096

Group 0: (Blocks 0-32767)
  Free blocks: 1000-32767
";
        let listing = group_listing(text);
        assert!(listing.contains("  Free blocks: 1000-32767"));
        assert!(!listing.contains("250000"));
        assert!(listing.contains("Block size:               4096"));
    }

    #[test]
    fn xfs_db_values() {
        assert_eq!(parse_assignment("agcount = 4\n", "agcount"), Some(4));
        assert_eq!(parse_assignment("blocksize = 4096\n", "agcount"), None);
        assert_eq!(parse_convert("0x1f400 (128000)\n"), Some(128000));
        assert_eq!(parse_convert("\n512\n"), Some(512));
        assert_eq!(parse_convert("0x200\n"), Some(512));
        assert_eq!(parse_convert(""), None);
    }
}
