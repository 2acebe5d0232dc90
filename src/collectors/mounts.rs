use super::{run_tool, stderr_line};
use crate::error::{TrimError, TrimResult};
use crate::models::mount::MountInfo;
use crate::ports::MountRegistry;
use std::path::PathBuf;

/// The kernel's live mount table.
pub struct ProcMounts {
    pub table: PathBuf,
    pub df:    String,
}

impl ProcMounts {
    pub fn new(df: &str) -> Self {
        Self { table: PathBuf::from("/proc/mounts"), df: df.to_string() }
    }
}

impl MountRegistry for ProcMounts {
    fn entries(&self) -> TrimResult<Vec<MountInfo>> {
        let content = std::fs::read_to_string(&self.table)?;
        Ok(parse_mounts(&content)
            .into_iter()
            .map(|mut m| {
                // mapper names and by-uuid links resolve to the node we stat later
                if m.device.starts_with("/dev/") {
                    if let Ok(p) = std::fs::canonicalize(&m.device) {
                        m.device = p;
                    }
                }
                m
            })
            .collect())
    }

    fn root_device(&self) -> TrimResult<PathBuf> {
        let out = run_tool(&self.df, ["-P", "/"])?;
        if !out.status.success() {
            return Err(TrimError::ModeResolutionFailed(format!("{} -P /: {}", self.df, stderr_line(&out))));
        }
        let dev = parse_df_device(&String::from_utf8_lossy(&out.stdout))
            .ok_or_else(|| TrimError::malformed(&self.df, "no device for /"))?;
        Ok(std::fs::canonicalize(&dev).unwrap_or(dev))
    }
}

pub fn parse_mounts(content: &str) -> Vec<MountInfo> {
    let mut v = Vec::new();
    for line in content.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 4 { continue; }
        v.push(MountInfo {
            device:  PathBuf::from(unescape(fields[0])),
            mount:   PathBuf::from(unescape(fields[1])),
            fs_type: fields[2].to_string(),
            rw:      fields[3].split(',').any(|o| o == "rw"),
        });
    }
    v
}

/// Device column of the last data row of `df -P` output.
fn parse_df_device(text: &str) -> Option<PathBuf> {
    text.lines()
        .skip(1)
        .filter_map(|l| l.split_whitespace().next())
        .last()
        .map(PathBuf::from)
}

/// Undo the octal escapes /proc/mounts uses for spaces, tabs and backslashes.
fn unescape(field: &str) -> String {
    if !field.contains('\\') {
        return field.to_string();
    }
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let octal = i + 3 < bytes.len() && bytes[i + 1..i + 4].iter().all(|b| (b'0'..=b'7').contains(b));
        if bytes[i] == b'\\' && octal {
            let code = bytes[i + 1..i + 4].iter().fold(0u32, |acc, b| acc * 8 + u32::from(b - b'0'));
            out.push(code as u8);
            i += 4;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MOUNTS: &str = "\
/dev/root / ext4 rw,relatime 0 0
proc /proc proc rw,nosuid,nodev,noexec,relatime 0 0
/dev/sdb1 /mnt/my\\040disk xfs ro,noatime 0 0
/dev/sdc1 /srv ext4 rw,errors=remount-ro 0 0
";

    #[test]
    fn parses_rw_flag_and_escapes() {
        let m = parse_mounts(MOUNTS);
        assert_eq!(m.len(), 4);
        assert_eq!(m[0].device, PathBuf::from("/dev/root"));
        assert!(m[0].rw);
        assert_eq!(m[2].mount, PathBuf::from("/mnt/my disk"));
        assert_eq!(m[2].fs_type, "xfs");
        assert!(!m[2].rw);
        // "errors=remount-ro" is not the ro flag
        assert!(m[3].rw);
    }

    #[test]
    fn df_device_column() {
        let out = "Filesystem     1024-blocks    Used Available Capacity Mounted on\n/dev/sda2         30830588 9912340  19329000      34% /\n";
        assert_eq!(parse_df_device(out), Some(PathBuf::from("/dev/sda2")));
        assert_eq!(parse_df_device("Filesystem\n"), None);
    }

    #[test]
    fn reads_table_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let table = dir.path().join("mounts");
        std::fs::write(&table, MOUNTS).unwrap();
        let reg = ProcMounts { table, df: "df".into() };
        let entries = reg.entries().unwrap();
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[1].fs_type, "proc");
    }
}
