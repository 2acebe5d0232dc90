/// A run of free sectors, absolute on the raw device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeExtent {
    pub lba:   u64,
    pub count: u64,
}

impl FreeExtent {
    /// `None` for empty extents.
    pub fn new(lba: u64, count: u64) -> Option<Self> {
        if count == 0 { None } else { Some(Self { lba, count }) }
    }

    /// Split into ranges of at most `max` sectors, covering the same sectors in order.
    pub fn split(self, max: u64) -> SplitRanges {
        SplitRanges { next: self.lba, left: self.count, max: max.max(1) }
    }
}

/// One range of a TRIM command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectorRange {
    pub lba:   u64,
    pub count: u64,
}

impl SectorRange {
    /// Length of this range in the "lba:count " command encoding.
    pub fn encoded_len(&self) -> usize {
        digits(self.lba) + 1 + digits(self.count) + 1
    }
}

pub struct SplitRanges {
    next: u64,
    left: u64,
    max:  u64,
}

impl Iterator for SplitRanges {
    type Item = SectorRange;

    fn next(&mut self) -> Option<SectorRange> {
        if self.left == 0 { return None; }
        let count = self.left.min(self.max);
        let range = SectorRange { lba: self.next, count };
        self.next += count;
        self.left -= count;
        Some(range)
    }
}

fn digits(mut v: u64) -> usize {
    let mut n = 1;
    while v >= 10 {
        v /= 10;
        n += 1;
    }
    n
}
