use anyhow::anyhow;
use lpfs::Vnode;

use crate::error::Result;

pub type Fd = usize;
pub const MAX_FDT_SIZE: usize = 8;

pub struct FdtEntryInner {
    pub vnode: Vnode,
    pub offset: u64,
}

pub struct FdtEntry(Option<FdtEntryInner>);

/// 只读文件描述符表
pub struct Table([FdtEntry; MAX_FDT_SIZE]);

impl Table {
    pub fn new() -> Self {
        Self(std::array::from_fn(|_| FdtEntry(None)))
    }

    pub fn open(&mut self, vnode: Vnode) -> Result<Fd> {
        vnode.as_file()?;
        let (fd, slot) = self
            .0
            .iter_mut()
            .enumerate()
            .find(|(_, entry)| entry.0.is_none())
            .ok_or_else(|| anyhow!("too many open files"))?;
        slot.0 = Some(FdtEntryInner { vnode, offset: 0 });
        Ok(fd)
    }

    fn get(&mut self, fd: Fd) -> Result<&mut FdtEntryInner> {
        self.0
            .get_mut(fd)
            .and_then(|entry| entry.0.as_mut())
            .ok_or_else(|| anyhow!("bad fd {fd}"))
    }

    pub fn close(&mut self, fd: Fd) -> Result<()> {
        self.get(fd)?;
        self.0[fd].0 = None;
        Ok(())
    }

    pub fn read(&mut self, fd: Fd, buf: &mut [u8]) -> Result<usize> {
        let entry = self.get(fd)?;
        let n = entry.vnode.as_file()?.read_at(entry.offset, buf)?;
        entry.offset += n as u64;
        Ok(n)
    }

    pub fn seek(&mut self, fd: Fd, step: i64) -> Result<u64> {
        let entry = self.get(fd)?;
        let size = entry.vnode.attr().size;
        let to = entry
            .offset
            .checked_add_signed(step)
            .filter(|&to| to <= size)
            .ok_or_else(|| anyhow!("seek out of range"))?;
        entry.offset = to;
        Ok(to)
    }
}
