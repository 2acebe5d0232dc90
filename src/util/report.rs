use crate::models::summary::RunSummary;
use crate::util::human::fmt_sectors;

/// Human-readable account of a finished run.
pub fn generate(s: &RunSummary) -> String {
    let mut out = String::new();

    out.push_str(&format!("  Target:      {}\n", s.target.path.display()));
    out.push_str(&format!("  Mode:        {}\n", s.mode));
    out.push_str(&format!("  Filesystem:  {} on {}\n", s.fs_type, s.fs_device.display()));
    out.push_str(&format!(
        "  Raw device:  {} (fs starts at sector {}{})\n",
        s.device.raw.display(),
        s.device.offset,
        if s.device.trim_capable { "" } else { ", TRIM not advertised" }
    ));
    out.push_str(&format!(
        "  Free space:  {} in {} ranges, {} command{}\n",
        fmt_sectors(s.stats.sectors),
        s.stats.ranges,
        s.stats.batches,
        if s.stats.batches == 1 { "" } else { "s" }
    ));
    out.push('\n');

    if s.committed {
        out.push_str(&format!("Done: trimmed {} on {}.\n", fmt_sectors(s.stats.sectors), s.device.raw.display()));
    } else {
        out.push_str("Dry run complete: nothing was committed. Re-run with --commit to trim.\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::mode::OperatingMode;
    use crate::models::device::{Device, FsType};
    use crate::models::summary::TrimStats;
    use crate::models::target::{Target, TargetKind};

    fn summary(committed: bool) -> RunSummary {
        RunSummary {
            started_at: chrono::Local::now(),
            target:     Target::new("/dev/sdb1", TargetKind::BlockDevice),
            mode:       OperatingMode::Offline,
            fs_device:  "/dev/sdb1".into(),
            fs_type:    FsType::Ext4,
            device:     Device { raw: "/dev/sdb".into(), offset: 2048, trim_capable: true },
            committed,
            stats:      TrimStats { batches: 1, ranges: 2, sectors: 48 },
        }
    }

    #[test]
    fn dry_run_says_nothing_committed() {
        let text = generate(&summary(false));
        assert!(text.contains("nothing was committed"));
        assert!(text.contains("24.0 KB in 2 ranges, 1 command\n"));
    }

    #[test]
    fn committed_run_reports_completion() {
        let text = generate(&summary(true));
        assert!(text.contains("Done: trimmed 24.0 KB on /dev/sdb."));
        assert!(!text.contains("nothing was committed"));
    }

    #[test]
    fn summary_serializes() {
        let v = serde_json::to_value(summary(true)).unwrap();
        assert_eq!(v["mode"], "offline");
        assert_eq!(v["fs_type"], "ext4");
        assert_eq!(v["target"]["kind"], "block-device");
        assert_eq!(v["stats"]["sectors"], 48);
    }
}
