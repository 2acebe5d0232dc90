use super::{sectors_per_block, ExtentStream};
use crate::error::{TrimError, TrimResult};
use crate::models::extent::FreeExtent;
use crate::ports::FsProbe;
use std::path::Path;

const TOOL: &str = "xfs_db";

/// Free space of an unmounted xfs filesystem, reported per allocation group.
#[derive(Debug)]
pub struct XfsFreeSpace {
    listing:           String,
    ag_offsets:        Vec<u64>,
    sectors_per_block: u64,
    offset:            u64,
}

impl XfsFreeSpace {
    pub fn prepare(dev: &Path, fs: &dyn FsProbe, offset: u64) -> TrimResult<Self> {
        if !fs.xfs_check(dev)? {
            return Err(TrimError::NotClean {
                device: dev.to_path_buf(),
                remedy: format!("xfs_repair {}", dev.display()),
            });
        }

        let ag_count = fs.xfs_ag_count(dev)?;
        if ag_count == 0 {
            return Err(TrimError::MetadataUnavailable(format!(
                "{} reports no allocation groups",
                dev.display()
            )));
        }
        let ag_offsets = (0..ag_count)
            .map(|ag| fs.xfs_ag_offset(dev, ag))
            .collect::<TrimResult<Vec<u64>>>()?;
        check_ag_offsets(&ag_offsets)?;

        let block_size = fs.xfs_block_size(dev)?;
        let listing = fs.xfs_listing(dev)?;
        Self::from_parts(listing, ag_offsets, block_size, offset)
    }

    pub fn from_parts(listing: String, ag_offsets: Vec<u64>, block_size: u64, offset: u64) -> TrimResult<Self> {
        if ag_offsets.is_empty() {
            return Err(TrimError::MetadataUnavailable("no allocation groups".into()));
        }
        check_ag_offsets(&ag_offsets)?;
        let sectors_per_block = sectors_per_block(block_size)?;
        log::debug!(
            "xfs: {} AGs, block size {} ({} sectors), fs offset {}",
            ag_offsets.len(), block_size, sectors_per_block, offset
        );
        Ok(Self { listing, ag_offsets, sectors_per_block, offset })
    }

    pub fn extents(&self) -> ExtentStream<'_> {
        Box::new(self.listing.lines().filter_map(move |line| {
            let (ag, block, len) = parse_record(line)?;
            let Some(&ag_start) = self.ag_offsets.get(ag as usize) else {
                return Some(Err(TrimError::InconsistentMetadata(format!(
                    "free extent in AG {} but only {} AGs",
                    ag, self.ag_offsets.len()
                ))));
            };
            self.to_sectors(ag, ag_start, block, len).transpose()
        }))
    }

    fn to_sectors(&self, ag: u64, ag_start: u64, block: u64, len: u64) -> TrimResult<Option<FreeExtent>> {
        let spb = self.sectors_per_block;
        let lba = block
            .checked_mul(spb)
            .and_then(|s| s.checked_add(ag_start))
            .and_then(|s| s.checked_add(self.offset));
        let count = len.checked_mul(spb);
        match (lba, count) {
            (Some(lba), Some(count)) if lba.checked_add(count).is_some() => Ok(FreeExtent::new(lba, count)),
            _ => Err(TrimError::InconsistentMetadata(format!(
                "free extent AG {} block {} length {} is beyond any sector address",
                ag, block, len
            ))),
        }
    }
}

/// AG start sectors must strictly increase with the AG index; anything else
/// means the offsets were misread or the layout is not one we understand.
fn check_ag_offsets(offsets: &[u64]) -> TrimResult<()> {
    for (i, pair) in offsets.windows(2).enumerate() {
        if pair[1] <= pair[0] {
            return Err(TrimError::InconsistentMetadata(format!(
                "AG {} starts at sector {}, not after AG {} at {}",
                i + 1, pair[1], i, pair[0]
            )));
        }
    }
    Ok(())
}

/// A row of exactly three integers, `ag block_offset block_count`, with
/// optional parentheses and commas. Headers and histogram rows yield `None`.
fn parse_record(line: &str) -> Option<(u64, u64, u64)> {
    let cleaned: String = line
        .chars()
        .map(|c| if matches!(c, '(' | ')' | ',') { ' ' } else { c })
        .collect();
    let nums: Vec<u64> = cleaned
        .split_whitespace()
        .map(|t| t.parse().ok())
        .collect::<Option<Vec<u64>>>()?;
    match nums[..] {
        [ag, block, len] => Some((ag, block, len)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::provider::tests::FakeFs;

    fn collect(p: &XfsFreeSpace) -> TrimResult<Vec<(u64, u64)>> {
        p.extents().map(|r| r.map(|e| (e.lba, e.count))).collect()
    }

    #[test]
    fn converts_ag_relative_records() {
        let listing = "\
   agno     agbno       len
      0        10         2
      1         0         1
(1, 5, 3)
   from      to extents  blocks    pct
      1       1       5       5   0.00
"
        .to_string();
        let p = XfsFreeSpace::from_parts(listing, vec![0, 1000], 4096, 2048).unwrap();
        assert_eq!(
            collect(&p).unwrap(),
            vec![(2048 + 80, 16), (2048 + 1000, 8), (2048 + 1000 + 40, 24)]
        );
    }

    #[test]
    fn non_increasing_ag_offsets_fail() {
        let err = XfsFreeSpace::from_parts(String::new(), vec![0, 1000, 500], 4096, 0).unwrap_err();
        assert!(matches!(err, TrimError::InconsistentMetadata(_)));
    }

    #[test]
    fn prepare_checks_offsets_before_listing() {
        let fs = FakeFs { xfs_ag_offsets: vec![0, 1000, 500], ..FakeFs::default() };
        let err = XfsFreeSpace::prepare(Path::new("/dev/sdc1"), &fs, 0).unwrap_err();
        assert!(matches!(err, TrimError::InconsistentMetadata(_)));
        assert_eq!(fs.xfs_listed.get(), 0);
    }

    #[test]
    fn zero_ags_is_metadata_unavailable() {
        let fs = FakeFs { xfs_ag_offsets: vec![], ..FakeFs::default() };
        let err = XfsFreeSpace::prepare(Path::new("/dev/sdc1"), &fs, 0).unwrap_err();
        assert!(matches!(err, TrimError::MetadataUnavailable(_)));
    }

    #[test]
    fn failed_repair_dry_run_is_not_clean() {
        let fs = FakeFs { xfs_clean: false, ..FakeFs::default() };
        let err = XfsFreeSpace::prepare(Path::new("/dev/sdc1"), &fs, 0).unwrap_err();
        match err {
            TrimError::NotClean { remedy, .. } => assert_eq!(remedy, "xfs_repair /dev/sdc1"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn record_outside_ag_table_fails() {
        let p = XfsFreeSpace::from_parts("3 0 1\n".into(), vec![0, 1000], 512, 0).unwrap();
        let err = collect(&p).unwrap_err();
        assert!(matches!(err, TrimError::InconsistentMetadata(_)));
    }

    #[test]
    fn overflowing_record_fails() {
        let listing = format!("0 {} 1\n", 1u64 << 62);
        let p = XfsFreeSpace::from_parts(listing, vec![0, 1000], 4096, 2048).unwrap();
        assert!(matches!(collect(&p).unwrap_err(), TrimError::InconsistentMetadata(_)));

        let p = XfsFreeSpace::from_parts(format!("1 0 {}\n", u64::MAX / 2), vec![0, 1000], 1024, 0).unwrap();
        assert!(matches!(collect(&p).unwrap_err(), TrimError::InconsistentMetadata(_)));
    }

    #[test]
    fn prepare_reads_everything() {
        let fs = FakeFs {
            xfs_ag_offsets: vec![0, 8000],
            xfs_block_size: 4096,
            xfs_listing: "0 1 1\n1 2 2\n".into(),
            ..FakeFs::default()
        };
        let p = XfsFreeSpace::prepare(Path::new("/dev/sdc1"), &fs, 100).unwrap();
        assert_eq!(collect(&p).unwrap(), vec![(108, 8), (8116, 16)]);
    }
}
