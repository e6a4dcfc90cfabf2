//! Inode map: ino -> byte address of the inode record.
//!
//! The map is built once at mount and never changes afterwards.

use alloc::collections::BTreeMap;
use log::{debug, warn};

use crate::block_cache::BlockCache;
use crate::constant::{split_byte_addr, BlockAddr, Ino, InodeAddr};
use crate::error::FsResult;
use crate::layout::{IMAP_ENTRIES_PER_BLOCK, IMAP_ENTRY_SIZE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InodeMapEntry {
    pub ino: Ino,
    pub byte_addr: u64,
}

impl InodeMapEntry {
    pub fn new(ino: Ino, byte_addr: u64) -> Self {
        Self { ino, byte_addr }
    }

    /// (block, in-block offset) the record must be found at
    pub fn location(&self) -> InodeAddr {
        split_byte_addr(self.byte_addr)
    }

    pub fn decode(buf: &[u8]) -> Self {
        let mut ino = [0u8; 8];
        let mut addr = [0u8; 8];
        ino.copy_from_slice(&buf[..8]);
        addr.copy_from_slice(&buf[8..IMAP_ENTRY_SIZE]);
        Self {
            ino: u64::from_le_bytes(ino),
            byte_addr: u64::from_le_bytes(addr),
        }
    }

    pub fn encode(&self, buf: &mut [u8]) {
        buf[..8].copy_from_slice(&self.ino.to_le_bytes());
        buf[8..IMAP_ENTRY_SIZE].copy_from_slice(&self.byte_addr.to_le_bytes());
    }
}

pub trait InodeMap: Send + Sync {
    fn lookup(&self, ino: Ino) -> Option<InodeMapEntry>;
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Default)]
pub struct BTreeInodeMap(BTreeMap<Ino, u64>);

impl BTreeInodeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entry: InodeMapEntry) {
        if let Some(old) = self.0.insert(entry.ino, entry.byte_addr) {
            warn!(
                "inode map: duplicate entry for ino {}, {:#x} replaced by {:#x}",
                entry.ino, old, entry.byte_addr
            );
        }
    }

    /// 从磁盘上的inode map区域读取 `len` 项
    pub fn load(cache: &BlockCache, start: BlockAddr, len: u64) -> FsResult<Self> {
        let mut map = Self::new();
        let mut remaining = len as usize;
        let mut block = start;
        while remaining > 0 {
            let take = remaining.min(IMAP_ENTRIES_PER_BLOCK);
            cache.get(block)?.lock().read(|data| {
                data.chunks_exact(IMAP_ENTRY_SIZE)
                    .take(take)
                    .map(InodeMapEntry::decode)
                    .filter(|entry| entry.ino != 0)
                    .for_each(|entry| map.insert(entry));
            });
            remaining -= take;
            block += 1;
        }
        debug!("inode map: loaded {} entries from block {}", map.len(), start);
        Ok(map)
    }

    pub fn entries(&self) -> impl Iterator<Item = InodeMapEntry> + '_ {
        self.0
            .iter()
            .map(|(&ino, &byte_addr)| InodeMapEntry::new(ino, byte_addr))
    }
}

impl FromIterator<InodeMapEntry> for BTreeInodeMap {
    fn from_iter<T: IntoIterator<Item = InodeMapEntry>>(iter: T) -> Self {
        let mut map = Self::new();
        iter.into_iter().for_each(|entry| map.insert(entry));
        map
    }
}

impl InodeMap for BTreeInodeMap {
    fn lookup(&self, ino: Ino) -> Option<InodeMapEntry> {
        self.0
            .get(&ino)
            .map(|&byte_addr| InodeMapEntry::new(ino, byte_addr))
    }

    fn len(&self) -> usize {
        self.0.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block_dev::{BlockDevice, MemBlockDevice};
    use crate::constant::BLOCK_SIZE;
    use alloc::sync::Arc;

    #[test]
    fn lookup_is_total_over_entries() {
        let map: BTreeInodeMap = [InodeMapEntry::new(5, 4096), InodeMapEntry::new(7, 4096 + 256)]
            .into_iter()
            .collect();
        assert_eq!(map.lookup(7).unwrap().location(), (1, 256));
        assert_eq!(map.lookup(6), None);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn load_spans_blocks() {
        let dev = Arc::new(MemBlockDevice::new(4));
        let total = IMAP_ENTRIES_PER_BLOCK + 3;
        let mut raw = alloc::vec![0u8; 2 * BLOCK_SIZE];
        for i in 0..total {
            InodeMapEntry::new(i as u64 + 1, (i as u64 + 1) * 256)
                .encode(&mut raw[i * IMAP_ENTRY_SIZE..]);
        }
        dev.write_block(1, &raw[..BLOCK_SIZE]).unwrap();
        dev.write_block(2, &raw[BLOCK_SIZE..]).unwrap();
        let cache = BlockCache::new(dev, 4);
        let map = BTreeInodeMap::load(&cache, 1, total as u64).unwrap();
        assert_eq!(map.len(), total);
        assert_eq!(map.lookup(total as u64).unwrap().byte_addr, total as u64 * 256);
    }
}
