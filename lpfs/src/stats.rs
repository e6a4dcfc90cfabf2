use core::sync::atomic::{AtomicU64, Ordering};

/// Diagnostic counters of one mount.
#[derive(Debug, Default)]
pub struct FsStats {
    pub(crate) decodes: AtomicU64,
    pub(crate) sibling_fills: AtomicU64,
    pub(crate) inconsistent_records: AtomicU64,
    pub(crate) orphan_records: AtomicU64,
    pub(crate) corrupt_dirents: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FsStatsSnapshot {
    /// inode objects filled from disk, targets and siblings alike
    pub decodes: u64,
    pub sibling_fills: u64,
    /// records found away from their inode map address
    pub inconsistent_records: u64,
    /// records whose ino has no inode map entry
    pub orphan_records: u64,
    pub corrupt_dirents: u64,
}

impl FsStats {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> FsStatsSnapshot {
        FsStatsSnapshot {
            decodes: self.decodes.load(Ordering::Relaxed),
            sibling_fills: self.sibling_fills.load(Ordering::Relaxed),
            inconsistent_records: self.inconsistent_records.load(Ordering::Relaxed),
            orphan_records: self.orphan_records.load(Ordering::Relaxed),
            corrupt_dirents: self.corrupt_dirents.load(Ordering::Relaxed),
        }
    }
}
