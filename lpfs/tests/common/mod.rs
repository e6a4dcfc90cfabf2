#![allow(dead_code)]

use std::sync::Arc;

use lpfs::{
    block_dev::{BlockDevice, MemBlockDevice},
    constant::{join_byte_addr, BlockAddr, Ino, BLOCK_SIZE},
    imap::{BTreeInodeMap, InodeMapEntry},
    layout::{DirEntry, DiskInode, FileMode, DIRENT_SIZE, INODE_RECORD_SIZE},
    Lpfs, MountOptions,
};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Hand-packed image: records and map entries are placed explicitly so that
/// tests can describe exact block contents.
pub struct Fixture {
    pub dev: Arc<MemBlockDevice>,
    pub map: BTreeInodeMap,
}

impl Fixture {
    pub fn new(blocks: usize) -> Self {
        init_logger();
        Self {
            dev: Arc::new(MemBlockDevice::new(blocks)),
            map: BTreeInodeMap::new(),
        }
    }

    fn patch(&self, block: BlockAddr, offset: usize, bytes: &[u8]) {
        let mut raw = [0u8; BLOCK_SIZE];
        self.dev.read_block(block, &mut raw).unwrap();
        raw[offset..offset + bytes.len()].copy_from_slice(bytes);
        self.dev.write_block(block, &raw).unwrap();
    }

    /// writes `record` into `slot` of `block` without touching the map
    pub fn put_record(&self, block: BlockAddr, slot: usize, record: &DiskInode) {
        let mut raw = [0u8; INODE_RECORD_SIZE];
        record.encode(&mut raw);
        self.patch(block, slot * INODE_RECORD_SIZE, &raw);
    }

    pub fn map_at(&mut self, ino: Ino, block: BlockAddr, slot: usize) {
        let addr = join_byte_addr((block, (slot * INODE_RECORD_SIZE) as u32));
        self.map.insert(InodeMapEntry::new(ino, addr));
    }

    /// packs `records` from the start of `block` and maps each where it lies
    pub fn put_records(&mut self, block: BlockAddr, records: &[DiskInode]) {
        for (slot, record) in records.iter().enumerate() {
            self.put_record(block, slot, record);
            self.map_at(record.ino, block, slot);
        }
    }

    pub fn put_dirents(&self, block: BlockAddr, first_slot: usize, entries: &[DirEntry]) {
        for (i, entry) in entries.iter().enumerate() {
            let mut raw = [0u8; DIRENT_SIZE];
            entry.encode(&mut raw);
            self.patch(block, (first_slot + i) * DIRENT_SIZE, &raw);
        }
    }

    pub fn put_data(&self, block: BlockAddr, bytes: &[u8]) {
        self.patch(block, 0, bytes);
    }

    pub fn mount(self) -> Arc<Lpfs> {
        Lpfs::with_map(self.dev, Arc::new(self.map), 1, MountOptions::default())
    }
}

pub fn file(ino: Ino, size: u64, bmap: &[BlockAddr]) -> DiskInode {
    let mut record = DiskInode::new(ino, FileMode::file(0o644));
    record.size = size;
    record.bmap[..bmap.len()].copy_from_slice(bmap);
    record
}

pub fn dir(ino: Ino, size: u64, bmap: &[BlockAddr]) -> DiskInode {
    let mut record = DiskInode::new(ino, FileMode::dir(0o755));
    record.size = size;
    record.bmap[..bmap.len()].copy_from_slice(bmap);
    record
}

pub fn dirent(name: &str, ino: Ino) -> DirEntry {
    DirEntry::new(name, ino).unwrap()
}
