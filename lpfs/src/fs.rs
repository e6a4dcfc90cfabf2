use alloc::sync::Arc;
use core::sync::atomic::{AtomicU32, Ordering};
use log::debug;

use crate::{
    block_cache::BlockCache,
    block_dev::BlockDevice,
    constant::{Ino, SUPER},
    error::{FsError, FsResult},
    icache::InodeCache,
    imap::{BTreeInodeMap, InodeMap},
    inode::{FsId, Inode},
    layout::SuperBlock,
    stats::{FsStats, FsStatsSnapshot},
};

static NEXT_FS_ID: AtomicU32 = AtomicU32::new(1);

#[derive(Debug, Clone, Copy)]
pub struct MountOptions {
    pub cache_capacity: usize,
}

impl Default for MountOptions {
    fn default() -> Self {
        Self {
            cache_capacity: BlockCache::DEFAULT_CAPACITY,
        }
    }
}

/// Mount context: owns the block cache, the inode map and the active inodes.
pub struct Lpfs {
    id: FsId,
    pub(crate) cache: BlockCache,
    pub(crate) imap: Arc<dyn InodeMap>,
    pub(crate) icache: InodeCache,
    pub(crate) stats: FsStats,
    root_ino: Ino,
}

impl Lpfs {
    pub fn mount(device: Arc<dyn BlockDevice>) -> FsResult<Arc<Self>> {
        Self::mount_with(device, MountOptions::default())
    }

    pub fn mount_with(device: Arc<dyn BlockDevice>, opts: MountOptions) -> FsResult<Arc<Self>> {
        let cache = BlockCache::new(device, opts.cache_capacity);
        let sb = cache
            .get(SUPER)?
            .lock()
            .read(|block| SuperBlock::decode(block));
        if !sb.valid() {
            return Err(FsError::BadMagic);
        }
        let imap = BTreeInodeMap::load(&cache, sb.imap_start, sb.imap_len)?;
        if imap.lookup(sb.root_ino).is_none() {
            return Err(FsError::Inconsistent);
        }
        debug!(
            "mounted lpfs: {} blocks, {} inodes, root ino {}",
            sb.total_blocks,
            imap.len(),
            sb.root_ino
        );
        Ok(Self::assemble(cache, Arc::new(imap), sb.root_ino))
    }

    /// mount with an inode map built elsewhere
    pub fn with_map(
        device: Arc<dyn BlockDevice>,
        imap: Arc<dyn InodeMap>,
        root_ino: Ino,
        opts: MountOptions,
    ) -> Arc<Self> {
        Self::assemble(BlockCache::new(device, opts.cache_capacity), imap, root_ino)
    }

    fn assemble(cache: BlockCache, imap: Arc<dyn InodeMap>, root_ino: Ino) -> Arc<Self> {
        let id = NEXT_FS_ID.fetch_add(1, Ordering::Relaxed);
        Arc::new(Self {
            id,
            cache,
            imap,
            icache: InodeCache::new(id),
            stats: FsStats::default(),
            root_ino,
        })
    }

    pub fn id(&self) -> FsId {
        self.id
    }

    pub fn root_ino(&self) -> Ino {
        self.root_ino
    }

    pub fn root(&self) -> FsResult<Arc<Inode>> {
        self.iget(self.root_ino)
    }

    pub fn imap(&self) -> &dyn InodeMap {
        self.imap.as_ref()
    }

    pub fn icache(&self) -> &InodeCache {
        &self.icache
    }

    pub fn stats(&self) -> FsStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn flush(&self) -> FsResult<()> {
        self.cache.flush()
    }
}
