use std::{
    fs::{File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    sync::Mutex,
};

use log::warn;
use lpfs::{
    block_dev::BlockDevice,
    constant::{BlockAddr, BLOCK_SIZE},
    FsError, FsResult,
};

use crate::error::Result;

#[derive(Debug)]
pub struct DiskFileImg(Mutex<File>);

impl DiskFileImg {
    pub fn open(path: &str) -> Result<DiskFileImg> {
        let f = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(DiskFileImg(Mutex::new(f)))
    }

    fn seek_to(file: &mut File, block_addr: BlockAddr) -> std::io::Result<()> {
        file.seek(SeekFrom::Start(block_addr * BLOCK_SIZE as u64))
            .map(|_| ())
    }
}

impl BlockDevice for DiskFileImg {
    fn read_block(&self, block_addr: BlockAddr, buf: &mut [u8]) -> FsResult<()> {
        let mut file = self.0.lock().map_err(|_| FsError::Io)?;
        Self::seek_to(&mut file, block_addr)
            .and_then(|_| file.read_exact(&mut buf[..BLOCK_SIZE]))
            .map_err(|err| {
                warn!("read block {block_addr}: {err}");
                FsError::Io
            })
    }

    fn write_block(&self, block_addr: BlockAddr, buf: &[u8]) -> FsResult<()> {
        let mut file = self.0.lock().map_err(|_| FsError::Io)?;
        Self::seek_to(&mut file, block_addr)
            .and_then(|_| file.write_all(&buf[..BLOCK_SIZE]))
            .map_err(|err| {
                warn!("write block {block_addr}: {err}");
                FsError::Io
            })
    }
}
