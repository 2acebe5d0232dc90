use super::{sectors_per_block, ExtentStream};
use crate::error::{TrimError, TrimResult};
use crate::models::extent::FreeExtent;
use crate::ports::FsProbe;
use std::path::Path;

const TOOL: &str = "dumpe2fs";

/// Free space of an unmounted ext2/ext3/ext4 filesystem, from its block listing.
#[derive(Debug)]
pub struct ExtFreeSpace {
    listing:           String,
    sectors_per_block: u64,
    offset:            u64,
}

impl ExtFreeSpace {
    pub fn prepare(dev: &Path, fs: &dyn FsProbe, offset: u64) -> TrimResult<Self> {
        let state = fs.ext_state(dev)?;
        if state.trim() != "clean" {
            log::error!("{} state is '{}'", dev.display(), state.trim());
            return Err(TrimError::NotClean {
                device: dev.to_path_buf(),
                remedy: format!("e2fsck -f {}", dev.display()),
            });
        }
        Self::from_listing(fs.ext_listing(dev)?, offset)
    }

    pub fn from_listing(listing: String, offset: u64) -> TrimResult<Self> {
        let block_size = listing
            .lines()
            .find_map(|l| l.trim_start().strip_prefix("Block size:"))
            .ok_or_else(|| TrimError::MetadataUnavailable("no 'Block size' in listing".into()))?
            .trim()
            .parse::<u64>()
            .map_err(|e| TrimError::malformed(TOOL, format!("block size: {}", e)))?;
        let sectors_per_block = sectors_per_block(block_size)?;
        log::debug!("ext block size {} ({} sectors), fs offset {}", block_size, sectors_per_block, offset);
        Ok(Self { listing, sectors_per_block, offset })
    }

    pub fn extents(&self) -> ExtentStream<'_> {
        let spb = self.sectors_per_block;
        let offset = self.offset;
        Box::new(
            self.listing
                .lines()
                .filter_map(|l| l.trim_start().strip_prefix("Free blocks:"))
                .flat_map(|list| list.split(','))
                .map(str::trim)
                .filter(|tok| !tok.is_empty())
                .filter_map(move |tok| match parse_block_range(tok) {
                    Ok((first, last)) => block_range_to_sectors(first, last, spb, offset).transpose(),
                    Err(e) => Some(Err(e)),
                }),
        )
    }
}

/// Inclusive block range to absolute sectors. The whole run must fit in u64.
fn block_range_to_sectors(first: u64, last: u64, spb: u64, offset: u64) -> TrimResult<Option<FreeExtent>> {
    let lba = first.checked_mul(spb).and_then(|s| s.checked_add(offset));
    let count = (last - first).checked_add(1).and_then(|n| n.checked_mul(spb));
    match (lba, count) {
        (Some(lba), Some(count)) if lba.checked_add(count).is_some() => Ok(FreeExtent::new(lba, count)),
        _ => Err(TrimError::malformed(TOOL, format!("free blocks {}-{} out of sector range", first, last))),
    }
}

/// "a-b" (inclusive) or a single block "a".
fn parse_block_range(tok: &str) -> TrimResult<(u64, u64)> {
    let num = |s: &str| {
        s.trim()
            .parse::<u64>()
            .map_err(|_| TrimError::malformed(TOOL, format!("bad free block range '{}'", tok)))
    };
    let (first, last) = match tok.split_once('-') {
        Some((a, b)) => (num(a)?, num(b)?),
        None => {
            let b = num(tok)?;
            (b, b)
        }
    };
    if last < first {
        return Err(TrimError::malformed(TOOL, format!("descending range '{}'", tok)));
    }
    Ok((first, last))
}
