use alloc::vec::Vec;
use log::warn;

use crate::{
    collect::RecordScan,
    constant::{blocks_for, BlockAddr, Ino, BLOCK_SIZE, NULL},
    error::{FsError, FsResult},
    fs::Lpfs,
    inode::InodeAttr,
    layout::{DiskInode, BMAP_CAPACITY, MAX_FILE_SIZE},
};

impl Lpfs {
    /// 重新定位磁盘上的inode记录, 数据块映射只存在磁盘上
    fn locate(&self, ino: Ino) -> FsResult<DiskInode> {
        let mapped = self.imap.lookup(ino).ok_or(FsError::NotFound)?;
        let (block_addr, offset) = mapped.location();
        let block = self.cache.get(block_addr)?;
        let data = block.lock().read(|data| *data);
        RecordScan::new(&data)
            .find(|(at, record)| record.ino == ino && *at == offset)
            .map(|(_, record)| record)
            .ok_or_else(|| {
                warn!(
                    "ino {}: no record at block {} offset {}",
                    ino, block_addr, offset
                );
                FsError::Inconsistent
            })
    }

    /// Logical block of a file -> physical block, through the direct map.
    ///
    /// Only slots below both the map capacity and the file's block count are
    /// addressable; `NULL` inside that range is a hole.
    pub fn bmap(&self, ino: Ino, logical_block: u64) -> FsResult<BlockAddr> {
        let record = self.locate(ino)?;
        let extent = blocks_for(record.size).min(BMAP_CAPACITY as u64);
        if logical_block >= extent {
            return Err(FsError::OutOfRange);
        }
        Ok(record.bmap[logical_block as usize])
    }

    pub fn max_file_size() -> u64 {
        MAX_FILE_SIZE
    }

    /// Copies file bytes starting at `offset`; returns how many were read.
    /// Holes read as zeroes.
    pub fn read_at(&self, attr: &InodeAttr, offset: u64, buf: &mut [u8]) -> FsResult<usize> {
        if offset >= attr.size {
            return Ok(0);
        }
        let end = offset.saturating_add(buf.len() as u64).min(attr.size);
        let mut pos = offset;
        let mut done = 0usize;
        while pos < end {
            let in_block = (pos % BLOCK_SIZE as u64) as usize;
            let n = ((BLOCK_SIZE - in_block) as u64).min(end - pos) as usize;
            let dst = &mut buf[done..done + n];
            match self.bmap(attr.ino, pos / BLOCK_SIZE as u64)? {
                NULL => dst.fill(0),
                physical => self
                    .cache
                    .get(physical)?
                    .lock()
                    .read(|data| dst.copy_from_slice(&data[in_block..in_block + n])),
            }
            pos += n as u64;
            done += n;
        }
        Ok(done)
    }

    /// Whole file contents. A size beyond what the block map can address is
    /// `OutOfRange`.
    pub fn read_all(&self, attr: &InodeAttr) -> FsResult<Vec<u8>> {
        if attr.size > MAX_FILE_SIZE {
            return Err(FsError::OutOfRange);
        }
        let mut buf = alloc::vec![0u8; attr.size as usize];
        let n = self.read_at(attr, 0, &mut buf)?;
        buf.truncate(n);
        Ok(buf)
    }
}
