//! Inode record decoder and sibling inode collector.
//!
//! Several inode records share one block. Looking one of them up scans the
//! whole block and opportunistically fills any sibling whose object is already
//! resident and still `New`; siblings that are absent or already `Ready` are
//! left alone.

use alloc::sync::Arc;
use log::{trace, warn};

use crate::{
    constant::{Block, Ino, BLOCK_SIZE},
    error::{FsError, FsResult},
    fs::Lpfs,
    inode::{Inode, InodeAttr, InodeState},
    layout::{DiskInode, INODE_RECORD_SIZE},
    stats::FsStats,
};

/// Records packed from the start of an inode block. Stops at the first
/// record with ino 0 or at the first record that would cross the block end.
pub(crate) struct RecordScan<'a> {
    block: &'a Block,
    offset: usize,
}

impl<'a> RecordScan<'a> {
    pub(crate) fn new(block: &'a Block) -> Self {
        Self { block, offset: 0 }
    }
}

impl Iterator for RecordScan<'_> {
    type Item = (u32, DiskInode);

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset + INODE_RECORD_SIZE > BLOCK_SIZE {
            return None;
        }
        let raw = &self.block[self.offset..];
        if DiskInode::peek_ino(raw) == 0 {
            self.offset = BLOCK_SIZE;
            return None;
        }
        let at = self.offset as u32;
        self.offset += INODE_RECORD_SIZE;
        Some((at, DiskInode::decode(raw)))
    }
}

impl Lpfs {
    /// Returns the object for `ino`, decoding it from disk if it is not
    /// resident yet. Never returns a partially filled object.
    pub fn iget(&self, ino: Ino) -> FsResult<Arc<Inode>> {
        let (inode, is_new) = self.icache.acquire_or_create(ino);
        match inode.state() {
            InodeState::Ready => return Ok(inode),
            InodeState::Publishing => {
                inode.wait_ready();
                return Ok(inode);
            }
            InodeState::New => {}
        }
        trace!("iget {}: resolving (created: {})", ino, is_new);
        match self.resolve(ino, &inode) {
            Ok(()) => Ok(inode),
            Err(err) => {
                self.icache.discard(&inode);
                Err(err)
            }
        }
    }

    /// Attributes of `ino`, decoded if needed.
    pub fn stat(&self, ino: Ino) -> FsResult<InodeAttr> {
        Ok(self.iget(ino)?.wait_ready().clone())
    }

    /// Scans the block holding `ino`'s record and fills `target` from it.
    ///
    /// Returns once `target` is Ready, either filled here or by a concurrent
    /// caller. `Inconsistent` when the record is not at its mapped address.
    pub fn resolve(&self, ino: Ino, target: &Arc<Inode>) -> FsResult<()> {
        let mapped = self.imap.lookup(ino).ok_or(FsError::NotFound)?;
        let (block_addr, _) = mapped.location();
        let block = self.cache.get(block_addr)?;
        let data = block.lock().read(|data| *data);

        let mut found = false;
        for (offset, record) in RecordScan::new(&data) {
            let entry = if record.ino == ino {
                mapped
            } else {
                match self.imap.lookup(record.ino) {
                    Some(entry) => entry,
                    None => {
                        FsStats::bump(&self.stats.orphan_records);
                        trace!(
                            "block {} offset {}: ino {} not in inode map",
                            block_addr,
                            offset,
                            record.ino
                        );
                        continue;
                    }
                }
            };
            if entry.location() != (block_addr, offset) {
                FsStats::bump(&self.stats.inconsistent_records);
                warn!(
                    "ino {}: record at block {} offset {}, inode map says {:?}",
                    record.ino,
                    block_addr,
                    offset,
                    entry.location()
                );
                continue;
            }

            if record.ino == ino {
                found = true;
                self.fill(target, &record);
            } else if let Some(sibling) = self.icache.lookup(record.ino) {
                if sibling.try_claim() {
                    sibling.publish(InodeAttr::from(&record));
                    FsStats::bump(&self.stats.decodes);
                    FsStats::bump(&self.stats.sibling_fills);
                    trace!("ino {}: filled as sibling of {}", record.ino, ino);
                }
            }
        }

        if found {
            Ok(())
        } else {
            Err(FsError::Inconsistent)
        }
    }

    fn fill(&self, target: &Inode, record: &DiskInode) {
        if target.try_claim() {
            target.publish(InodeAttr::from(record));
            FsStats::bump(&self.stats.decodes);
        } else {
            target.wait_ready();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::FileMode;

    fn block_with(inos: &[Ino]) -> Block {
        let mut block = [0u8; BLOCK_SIZE];
        for (i, &ino) in inos.iter().enumerate() {
            DiskInode::new(ino, FileMode::file(0o644))
                .encode(&mut block[i * INODE_RECORD_SIZE..]);
        }
        block
    }

    #[test]
    fn scan_stops_at_zero_ino() {
        let block = block_with(&[5, 7, 0, 9]);
        let found: alloc::vec::Vec<_> = RecordScan::new(&block).map(|(o, r)| (o, r.ino)).collect();
        assert_eq!(found, [(0, 5), (256, 7)]);
    }

    #[test]
    fn scan_covers_full_block() {
        let inos: alloc::vec::Vec<Ino> = (1..=16).collect();
        let block = block_with(&inos);
        assert_eq!(RecordScan::new(&block).count(), 16);
    }
}
