use crate::constant::{Block, BlockAddr, BLOCK_SIZE};
use crate::error::{FsError, FsResult};
use alloc::vec::Vec;
use core::any::Any;
use spin::Mutex;

pub trait BlockDevice: Send + Sync + Any {
    fn read_block(&self, block_addr: BlockAddr, buf: &mut [u8]) -> FsResult<()>;
    fn write_block(&self, block_addr: BlockAddr, buf: &[u8]) -> FsResult<()>;
}

/// 内存中的块设备, 用于测试和构建镜像
pub struct MemBlockDevice(Mutex<Vec<Block>>);

impl MemBlockDevice {
    pub fn new(total: usize) -> Self {
        Self(Mutex::new(alloc::vec![[0u8; BLOCK_SIZE]; total]))
    }

}

impl BlockDevice for MemBlockDevice {
    fn read_block(&self, block_addr: BlockAddr, buf: &mut [u8]) -> FsResult<()> {
        let blocks = self.0.lock();
        let block = blocks.get(block_addr as usize).ok_or(FsError::Io)?;
        let n = buf.len().min(BLOCK_SIZE);
        buf[..n].copy_from_slice(&block[..n]);
        Ok(())
    }

    fn write_block(&self, block_addr: BlockAddr, buf: &[u8]) -> FsResult<()> {
        let mut blocks = self.0.lock();
        let block = blocks.get_mut(block_addr as usize).ok_or(FsError::Io)?;
        let n = buf.len().min(BLOCK_SIZE);
        block[..n].copy_from_slice(&buf[..n]);
        Ok(())
    }
}
