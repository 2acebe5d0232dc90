use super::{run_tool, stderr_line};
use crate::error::{TrimError, TrimResult};
use crate::models::extent::FreeExtent;
use crate::ports::TrimExecutor;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

/// `hdparm`: drive identification, file block maps and the TRIM command.
#[derive(Debug, Clone)]
pub struct Hdparm {
    pub bin: String,
}

impl Hdparm {
    pub fn new(bin: &str) -> Self {
        Self { bin: bin.to_string() }
    }

    /// TRIM support from the drive's identify data. `None` when the drive
    /// cannot be identified this way (NVMe, virtual disks).
    pub fn identify_trim(&self, raw: &Path) -> TrimResult<Option<bool>> {
        let out = run_tool(&self.bin, [Path::new("-I"), raw])?;
        if !out.status.success() {
            log::debug!("{} -I {}: {}", self.bin, raw.display(), stderr_line(&out));
            return Ok(None);
        }
        Ok(Some(identify_has_trim(&String::from_utf8_lossy(&out.stdout))))
    }

    /// Absolute sector runs backing `file`.
    pub fn fibmap(&self, file: &Path) -> TrimResult<Vec<FreeExtent>> {
        let out = run_tool(&self.bin, [Path::new("--fibmap"), file])?;
        if !out.status.success() {
            return Err(TrimError::MetadataUnavailable(format!(
                "{} --fibmap {}: {}",
                self.bin, file.display(), stderr_line(&out)
            )));
        }
        let extents = parse_fibmap(&String::from_utf8_lossy(&out.stdout));
        if extents.is_empty() {
            return Err(TrimError::malformed(&self.bin, format!("no extents listed for {}", file.display())));
        }
        Ok(extents)
    }
}

impl TrimExecutor for Hdparm {
    fn trim(&mut self, raw: &Path, ranges: &str) -> TrimResult<()> {
        let mut child = Command::new(&self.bin)
            .args(["--please-destroy-my-drive", "--trim-sector-ranges-stdin"])
            .arg(raw)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .spawn()
            .map_err(|e| TrimError::Environment(format!("cannot run {}: {}", self.bin, e)))?;

        // stdin is closed at the end of the closure so hdparm sees EOF
        let written = child
            .stdin
            .take()
            .map_or(Ok(()), |mut stdin| stdin.write_all(ranges.as_bytes()));
        let status = child.wait()?;
        if !status.success() {
            return Err(TrimError::TrimCommandFailed { device: raw.to_path_buf(), code: status.code() });
        }
        written?;
        Ok(())
    }
}

fn identify_has_trim(text: &str) -> bool {
    text.lines().any(|l| l.contains("TRIM supported"))
}

/// Rows of `byte_offset begin_LBA end_LBA sectors`; anything else is skipped.
pub fn parse_fibmap(text: &str) -> Vec<FreeExtent> {
    text.lines()
        .filter_map(|line| {
            let f: Vec<u64> = line
                .split_whitespace()
                .map(|t| t.parse().ok())
                .collect::<Option<Vec<u64>>>()?;
            if f.len() != 4 { return None; }
            FreeExtent::new(f[1], f[3])
        })
        .collect()
}
