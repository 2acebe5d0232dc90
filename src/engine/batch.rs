//! Packing of free extents into TRIM commands.

use crate::config::Limits;
use crate::error::{TrimError, TrimResult};
use crate::models::extent::{FreeExtent, SectorRange};
use crate::models::summary::TrimStats;
use crate::ports::TrimExecutor;
use std::fmt::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

/// Ranges pending a single TRIM command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    ranges:      Vec<SectorRange>,
    sectors:     u64,
    encoded_len: usize,
}

impl Batch {
    pub fn len(&self) -> usize { self.ranges.len() }
    pub fn is_empty(&self) -> bool { self.ranges.is_empty() }
    pub fn sectors(&self) -> u64 { self.sectors }
    pub fn encoded_len(&self) -> usize { self.encoded_len }
    pub fn ranges(&self) -> &[SectorRange] { &self.ranges }

    fn append(&mut self, r: SectorRange) {
        self.sectors += r.count;
        self.encoded_len += r.encoded_len();
        self.ranges.push(r);
    }

    /// Whitespace separated "lba:count" pairs.
    pub fn encode(&self) -> String {
        let mut out = String::with_capacity(self.encoded_len);
        for r in self.ranges() {
            let _ = write!(out, "{}:{} ", r.lba, r.count);
        }
        out
    }
}

/// What happened to a range handed to [`Batcher::push`].
#[derive(Debug, PartialEq)]
pub enum Append {
    Accumulated,
    /// A batch is ready to be issued; the batcher has started a new one.
    Flushed(Batch),
}

/// Accumulates ranges and hands back full batches.
///
/// A batch never exceeds `max_encoded_len` or `max_ranges`: a range that
/// would overflow the encoding goes into the next batch, and a batch is
/// released as soon as it holds `max_ranges` ranges.
pub struct Batcher {
    limits:  Limits,
    current: Batch,
}

impl Batcher {
    pub fn new(limits: Limits) -> Self {
        Self { limits, current: Batch::default() }
    }

    pub fn push(&mut self, r: SectorRange) -> Append {
        if !self.current.is_empty()
            && self.current.encoded_len + r.encoded_len() > self.limits.max_encoded_len
        {
            let full = std::mem::take(&mut self.current);
            self.current.append(r);
            return Append::Flushed(full);
        }
        self.current.append(r);
        if self.current.len() >= self.limits.max_ranges {
            return Append::Flushed(std::mem::take(&mut self.current));
        }
        Append::Accumulated
    }

    /// Remaining partial batch, if any.
    pub fn finish(self) -> Option<Batch> {
        if self.current.is_empty() { None } else { Some(self.current) }
    }
}

/// Issues batches against the raw device, or only reports them on a dry run.
pub struct TrimIssuer<'a> {
    raw:      PathBuf,
    commit:   bool,
    executor: &'a mut dyn TrimExecutor,
    stats:    TrimStats,
}

impl<'a> TrimIssuer<'a> {
    pub fn new(raw: PathBuf, commit: bool, executor: &'a mut dyn TrimExecutor) -> Self {
        Self { raw, commit, executor, stats: TrimStats::default() }
    }

    pub fn issue(&mut self, batch: Batch) -> TrimResult<()> {
        let n = self.stats.batches + 1;
        if self.commit {
            log::debug!("batch {}: trimming {} ranges, {} sectors", n, batch.len(), batch.sectors());
            self.executor.trim(&self.raw, &batch.encode())?;
        } else {
            log::info!(
                "dry run, batch {}: would trim {} ranges, {} sectors on {}",
                n, batch.len(), batch.sectors(), self.raw.display()
            );
        }
        self.stats.batches += 1;
        self.stats.ranges += batch.len() as u64;
        self.stats.sectors += batch.sectors();
        Ok(())
    }

    pub fn stats(&self) -> TrimStats {
        self.stats
    }
}

/// Consume `extents` in order, splitting, batching and issuing as it goes.
/// The first failure stops everything; later extents are never read.
pub fn drain<I>(
    extents: I,
    limits: &Limits,
    issuer: &mut TrimIssuer<'_>,
    cancel: &AtomicBool,
) -> TrimResult<TrimStats>
where
    I: IntoIterator<Item = TrimResult<FreeExtent>>,
{
    let mut batcher = Batcher::new(limits.clone());
    for extent in extents {
        if cancel.load(Ordering::SeqCst) {
            return Err(TrimError::Interrupted);
        }
        for range in extent?.split(limits.max_range_sectors) {
            if let Append::Flushed(batch) = batcher.push(range) {
                issuer.issue(batch)?;
            }
        }
    }
    if let Some(batch) = batcher.finish() {
        if cancel.load(Ordering::SeqCst) {
            return Err(TrimError::Interrupted);
        }
        issuer.issue(batch)?;
    }
    Ok(issuer.stats())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::path::Path;

    /// Records every command; fails the `fail_at`-th one (1-based) with `code`.
    #[derive(Default)]
    pub struct RecordingTrim {
        pub calls:   Vec<(PathBuf, String)>,
        pub fail_at: Option<(usize, i32)>,
    }

    impl TrimExecutor for RecordingTrim {
        fn trim(&mut self, raw: &Path, ranges: &str) -> TrimResult<()> {
            self.calls.push((raw.to_path_buf(), ranges.to_string()));
            match self.fail_at {
                Some((n, code)) if n == self.calls.len() => {
                    Err(TrimError::TrimCommandFailed { device: raw.to_path_buf(), code: Some(code) })
                }
                _ => Ok(()),
            }
        }
    }

    fn ok(lba: u64, count: u64) -> TrimResult<FreeExtent> {
        Ok(FreeExtent { lba, count })
    }

    fn sum_sectors(calls: &[(PathBuf, String)]) -> u64 {
        calls.iter()
            .flat_map(|(_, s)| s.split_whitespace())
            .map(|r| r.split(':').nth(1).unwrap().parse::<u64>().unwrap())
            .sum()
    }

    #[test]
    fn coverage_is_conserved() {
        let extents = vec![ok(0, 150000), ok(200000, 8), ok(300000, 65536), ok(500000, 1)];
        let total: u64 = 150000 + 8 + 65536 + 1;
        let mut exec = RecordingTrim::default();
        let cancel = AtomicBool::new(false);
        let stats = {
            let mut issuer = TrimIssuer::new("/dev/sda".into(), true, &mut exec);
            drain(extents, &Limits::default(), &mut issuer, &cancel).unwrap()
        };
        assert_eq!(stats.sectors, total);
        assert_eq!(sum_sectors(&exec.calls), total);
        assert_eq!(exec.calls.len(), 1);
        assert_eq!(stats.ranges, 3 + 1 + 2 + 1);
    }

    #[test]
    fn batches_respect_range_limit() {
        let limits = Limits { max_ranges: 4, ..Limits::default() };
        let extents: Vec<_> = (0..10).map(|i| ok(i * 100, 10)).collect();
        let mut exec = RecordingTrim::default();
        let cancel = AtomicBool::new(false);
        {
            let mut issuer = TrimIssuer::new("/dev/sda".into(), true, &mut exec);
            drain(extents, &limits, &mut issuer, &cancel).unwrap();
        }
        let sizes: Vec<usize> = exec.calls.iter().map(|(_, s)| s.split_whitespace().count()).collect();
        assert_eq!(sizes, vec![4, 4, 2]);
    }

    #[test]
    fn full_range_count_flushes_at_default_limit() {
        let mut b = Batcher::new(Limits::default());
        for i in 0..16319u64 {
            assert_eq!(b.push(SectorRange { lba: i, count: 1 }), Append::Accumulated);
        }
        match b.push(SectorRange { lba: 16319, count: 1 }) {
            Append::Flushed(batch) => assert_eq!(batch.len(), 16320),
            Append::Accumulated => panic!("batch should be full"),
        }
        assert!(b.finish().is_none());
    }

    #[test]
    fn encoded_length_never_exceeds_limit() {
        let limits = Limits { max_encoded_len: 40, ..Limits::default() };
        let mut b = Batcher::new(limits);
        // "1000000:65535 " is 14 characters: two fit in 40, a third does not
        let r = |lba| SectorRange { lba, count: 65535 };
        assert_eq!(b.push(r(1_000_000)), Append::Accumulated);
        assert_eq!(b.push(r(2_000_000)), Append::Accumulated);
        match b.push(r(3_000_000)) {
            Append::Flushed(batch) => {
                assert_eq!(batch.len(), 2);
                assert!(batch.encoded_len() <= 40);
                assert_eq!(batch.encode().len(), batch.encoded_len());
            }
            Append::Accumulated => panic!("expected flush"),
        }
        let rest = b.finish().unwrap();
        assert_eq!(rest.ranges(), &[r(3_000_000)]);
    }

    #[test]
    fn failing_trim_stops_the_stream() {
        let limits = Limits { max_ranges: 1, ..Limits::default() };
        let mut pulled = 0;
        let extents = (0..10u64).map(|i| {
            pulled += 1;
            ok(i * 100, 8)
        });
        let mut exec = RecordingTrim { fail_at: Some((2, 5)), ..Default::default() };
        let cancel = AtomicBool::new(false);
        let err = {
            let mut issuer = TrimIssuer::new("/dev/sdb".into(), true, &mut exec);
            drain(extents, &limits, &mut issuer, &cancel).unwrap_err()
        };
        assert_eq!(err.exit_code(), 5);
        assert_eq!(exec.calls.len(), 2);
        assert_eq!(pulled, 2);
    }

    #[test]
    fn dry_run_never_calls_executor() {
        let extents = vec![ok(0, 150000), ok(1 << 30, 64)];
        let mut exec = RecordingTrim::default();
        let cancel = AtomicBool::new(false);
        let stats = {
            let mut issuer = TrimIssuer::new("/dev/sda".into(), false, &mut exec);
            drain(extents, &Limits::default(), &mut issuer, &cancel).unwrap()
        };
        assert!(exec.calls.is_empty());
        assert_eq!(stats.sectors, 150064);
        assert_eq!(stats.batches, 1);
    }

    #[test]
    fn provider_error_aborts_before_trim() {
        let extents = vec![ok(0, 8), Err(TrimError::malformed("dumpe2fs", "bad range"))];
        let mut exec = RecordingTrim::default();
        let cancel = AtomicBool::new(false);
        let err = {
            let mut issuer = TrimIssuer::new("/dev/sda".into(), true, &mut exec);
            drain(extents, &Limits::default(), &mut issuer, &cancel).unwrap_err()
        };
        assert!(matches!(err, TrimError::MalformedOutput { .. }));
        assert!(exec.calls.is_empty());
    }

    #[test]
    fn cancellation_stops_before_next_extent() {
        let mut exec = RecordingTrim::default();
        let cancel = AtomicBool::new(true);
        let err = {
            let mut issuer = TrimIssuer::new("/dev/sda".into(), true, &mut exec);
            drain(vec![ok(0, 8)], &Limits::default(), &mut issuer, &cancel).unwrap_err()
        };
        assert!(matches!(err, TrimError::Interrupted));
        assert!(exec.calls.is_empty());
    }
}
