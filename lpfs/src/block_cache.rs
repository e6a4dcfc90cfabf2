use crate::block_dev::BlockDevice;
use crate::constant::*;
use crate::error::FsResult;
use alloc::{sync::Arc, vec::Vec};
use log::{debug, warn};
use spin::Mutex;

pub struct CacheEntry {
    device: Arc<dyn BlockDevice>,
    addr: BlockAddr,
    data: Block,
    dirty: bool,
}

/// 缓存项的引用, drop即释放
pub type BlockRef = Arc<Mutex<CacheEntry>>;

/// read只借出不可变引用; modify会把缓存项标记成脏项, 回收时需要落盘
impl CacheEntry {
    fn load(device: Arc<dyn BlockDevice>, addr: BlockAddr) -> FsResult<Self> {
        let mut data = [0u8; BLOCK_SIZE];
        device.read_block(addr, &mut data)?;
        Ok(Self {
            device,
            addr,
            data,
            dirty: false,
        })
    }

    pub fn read<V>(&self, f: impl FnOnce(&Block) -> V) -> V {
        f(&self.data)
    }

    pub fn modify<V>(&mut self, f: impl FnOnce(&mut Block) -> V) -> V {
        self.dirty = true;
        f(&mut self.data)
    }

    pub fn sync(&mut self) -> FsResult<()> {
        if self.dirty {
            self.device.write_block(self.addr, &self.data)?;
            self.dirty = false;
        }
        Ok(())
    }
}

impl Drop for CacheEntry {
    fn drop(&mut self) {
        if let Err(err) = self.sync() {
            warn!("block {}: write-back on eviction failed: {}", self.addr, err);
        }
    }
}

pub struct BlockCache {
    device: Arc<dyn BlockDevice>,
    capacity: usize,
    entries: Mutex<Vec<(BlockAddr, BlockRef)>>,
}

impl BlockCache {
    pub const DEFAULT_CAPACITY: usize = 16;

    pub fn new(device: Arc<dyn BlockDevice>, capacity: usize) -> Self {
        Self {
            device,
            capacity: capacity.max(1),
            entries: Mutex::new(Vec::new()),
        }
    }

    /// 取得块的引用, 读盘失败时不会留下缓存项
    pub fn get(&self, addr: BlockAddr) -> FsResult<BlockRef> {
        let mut entries = self.entries.lock();
        if let Some((_, entry)) = entries.iter().find(|item| item.0 == addr) {
            return Ok(Arc::clone(entry));
        }
        let entry = Arc::new(Mutex::new(CacheEntry::load(
            Arc::clone(&self.device),
            addr,
        )?));
        entries.push((addr, Arc::clone(&entry)));
        self.shrink(&mut entries);
        Ok(entry)
    }

    // 缓存替换策略: 淘汰最早加入且没有被持有的缓存项
    // 所有缓存项都被持有时暂时超出容量
    fn shrink(&self, entries: &mut Vec<(BlockAddr, BlockRef)>) {
        while entries.len() > self.capacity {
            match entries
                .iter()
                .position(|entry| Arc::strong_count(&entry.1) == 1)
            {
                Some(idx) => {
                    entries.remove(idx);
                }
                None => {
                    debug!(
                        "block cache overcommitted: {} held entries, capacity {}",
                        entries.len(),
                        self.capacity
                    );
                    break;
                }
            }
        }
    }

    pub fn flush(&self) -> FsResult<()> {
        self.entries
            .lock()
            .iter()
            .try_for_each(|(_, entry)| entry.lock().sync())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
