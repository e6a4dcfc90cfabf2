//! Builds a complete lpfs image: superblock, inode map, packed inode records
//! and data blocks, in that order.

use alloc::{vec, vec::Vec};
use log::debug;

use crate::{
    block_dev::BlockDevice,
    constant::{blocks_for, join_byte_addr, BlockAddr, Ino, BLOCK_SIZE, ROOT_INO, SUPER},
    error::{FsError, FsResult},
    imap::InodeMapEntry,
    layout::{
        DirEntry, DiskInode, FileMode, InodeKind, SuperBlock, BMAP_CAPACITY, DIRENT_SIZE,
        IMAP_ENTRIES_PER_BLOCK, IMAP_ENTRY_SIZE, INODES_PER_BLOCK, INODE_RECORD_SIZE,
        MAX_FILE_SIZE,
    },
};

struct Node {
    inode: DiskInode,
    /// file contents; directories encode `entries` instead
    data: Vec<u8>,
    entries: Vec<DirEntry>,
}

impl Node {
    fn is_dir(&self) -> bool {
        self.inode.file_mode().kind() == InodeKind::Directory
    }

    fn payload(&self) -> Vec<u8> {
        if self.is_dir() {
            let mut raw = vec![0u8; self.entries.len() * DIRENT_SIZE];
            for (slot, entry) in raw.chunks_exact_mut(DIRENT_SIZE).zip(&self.entries) {
                entry.encode(slot);
            }
            raw
        } else {
            self.data.clone()
        }
    }
}

pub struct ImageBuilder {
    nodes: Vec<Node>,
}

impl Default for ImageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageBuilder {
    /// an image with an empty root directory
    pub fn new() -> Self {
        let mut builder = Self { nodes: Vec::new() };
        let root = builder.push(FileMode::dir(0o755), Vec::new());
        debug_assert_eq!(root, ROOT_INO);
        builder.nodes[0].inode.link_count = 2;
        builder.nodes[0].entries = vec![dot(".", ROOT_INO), dot("..", ROOT_INO)];
        builder
    }

    fn push(&mut self, mode: FileMode, data: Vec<u8>) -> Ino {
        let ino = self.nodes.len() as Ino + 1;
        self.nodes.push(Node {
            inode: DiskInode::new(ino, mode),
            data,
            entries: Vec::new(),
        });
        ino
    }

    fn node_mut(&mut self, ino: Ino) -> FsResult<&mut Node> {
        ino.checked_sub(1)
            .and_then(|idx| self.nodes.get_mut(idx as usize))
            .ok_or(FsError::NotFound)
    }

    fn link(&mut self, parent: Ino, name: &str, ino: Ino) -> FsResult<()> {
        let entry = DirEntry::new(name, ino)?;
        let dir = self.node_mut(parent)?;
        if !dir.is_dir() {
            return Err(FsError::NotADirectory);
        }
        if dir.entries.iter().any(|e| !e.is_free() && e.name() == name.as_bytes()) {
            return Err(FsError::AlreadyExists);
        }
        dir.entries.push(entry);
        Ok(())
    }

    pub fn add_dir(&mut self, parent: Ino, name: &str, perm: u32) -> FsResult<Ino> {
        self.node_mut(parent)?;
        let ino = self.push(FileMode::dir(perm), Vec::new());
        if let Err(err) = self.link(parent, name, ino) {
            self.nodes.pop();
            return Err(err);
        }
        let node = self.node_mut(ino)?;
        node.inode.link_count = 2;
        node.entries = vec![dot(".", ino), dot("..", parent)];
        self.node_mut(parent)?.inode.link_count += 1;
        Ok(ino)
    }

    pub fn add_file(&mut self, parent: Ino, name: &str, data: &[u8], perm: u32) -> FsResult<Ino> {
        if data.len() as u64 > MAX_FILE_SIZE {
            return Err(FsError::OutOfRange);
        }
        self.node_mut(parent)?;
        let ino = self.push(FileMode::file(perm), data.to_vec());
        if let Err(err) = self.link(parent, name, ino) {
            self.nodes.pop();
            return Err(err);
        }
        Ok(ino)
    }

    /// frees the slot named `name`; the slot keeps its position
    pub fn remove_entry(&mut self, parent: Ino, name: &str) -> FsResult<Ino> {
        let dir = self.node_mut(parent)?;
        let slot = dir
            .entries
            .iter_mut()
            .find(|e| !e.is_free() && e.name() == name.as_bytes())
            .ok_or(FsError::NotFound)?;
        let ino = slot.inode_number;
        *slot = DirEntry::empty();
        Ok(ino)
    }

    pub fn set_owner(&mut self, ino: Ino, uid: u32, gid: u32) -> FsResult<()> {
        let node = self.node_mut(ino)?;
        node.inode.uid = uid;
        node.inode.gid = gid;
        Ok(())
    }

    pub fn set_times(&mut self, ino: Ino, mtime_usec: u64, ctime_usec: u64) -> FsResult<()> {
        let node = self.node_mut(ino)?;
        node.inode.mtime_usec = mtime_usec;
        node.inode.ctime_usec = ctime_usec;
        Ok(())
    }

    pub fn inode_count(&self) -> usize {
        self.nodes.len()
    }

    fn imap_blocks(&self) -> u64 {
        blocks_for((self.nodes.len() * IMAP_ENTRY_SIZE) as u64)
    }

    fn inode_blocks(&self) -> u64 {
        ((self.nodes.len() + INODES_PER_BLOCK - 1) / INODES_PER_BLOCK) as u64
    }

    /// blocks the built image occupies
    pub fn required_blocks(&self) -> u64 {
        let data: u64 = self
            .nodes
            .iter()
            .map(|node| blocks_for(node.payload().len() as u64))
            .sum();
        1 + self.imap_blocks() + self.inode_blocks() + data
    }

    /// Writes the image to `device` and returns the number of blocks used.
    pub fn build(&self, device: &dyn BlockDevice) -> FsResult<u64> {
        let imap_start: BlockAddr = 1;
        let inode_start = imap_start + self.imap_blocks();
        let mut next_data = inode_start + self.inode_blocks();

        let mut records = Vec::with_capacity(self.nodes.len());
        for node in self.nodes.iter() {
            let payload = node.payload();
            let blocks = blocks_for(payload.len() as u64);
            if blocks > BMAP_CAPACITY as u64 {
                return Err(FsError::OutOfRange);
            }
            let mut inode = node.inode.clone();
            inode.size = payload.len() as u64;
            for (i, chunk) in payload.chunks(BLOCK_SIZE).enumerate() {
                let mut block = [0u8; BLOCK_SIZE];
                block[..chunk.len()].copy_from_slice(chunk);
                device.write_block(next_data, &block)?;
                inode.bmap[i] = next_data;
                next_data += 1;
            }
            records.push(inode);
        }

        let mut imap = Vec::with_capacity(records.len());
        for (block_idx, chunk) in records.chunks(INODES_PER_BLOCK).enumerate() {
            let addr = inode_start + block_idx as u64;
            let mut block = [0u8; BLOCK_SIZE];
            for (slot, record) in chunk.iter().enumerate() {
                let offset = slot * INODE_RECORD_SIZE;
                record.encode(&mut block[offset..]);
                imap.push(InodeMapEntry::new(
                    record.ino,
                    join_byte_addr((addr, offset as u32)),
                ));
            }
            device.write_block(addr, &block)?;
        }

        for (block_idx, chunk) in imap.chunks(IMAP_ENTRIES_PER_BLOCK).enumerate() {
            let mut block = [0u8; BLOCK_SIZE];
            for (slot, entry) in chunk.iter().enumerate() {
                entry.encode(&mut block[slot * IMAP_ENTRY_SIZE..]);
            }
            device.write_block(imap_start + block_idx as u64, &block)?;
        }

        let sb = SuperBlock::new(next_data, imap_start, imap.len() as u64, ROOT_INO);
        let mut block = [0u8; BLOCK_SIZE];
        sb.encode(&mut block);
        device.write_block(SUPER, &block)?;

        debug!(
            "built lpfs image: {} inodes, {} blocks",
            records.len(),
            next_data
        );
        Ok(next_data)
    }
}

fn dot(name: &str, ino: Ino) -> DirEntry {
    // "." and ".." always fit
    DirEntry::new(name, ino).unwrap_or_else(|_| DirEntry::empty())
}
