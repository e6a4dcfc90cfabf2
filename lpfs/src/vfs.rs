use alloc::{sync::Arc, vec::Vec};

use crate::{
    constant::{BlockAddr, Ino},
    dir::{DirCursor, DirEntries},
    error::{FsError, FsResult},
    fs::Lpfs,
    inode::{Inode, InodeAttr},
    layout::{DirEntry, InodeKind},
};

/// 对已解析的inode对象的引用
#[derive(Clone)]
pub struct Vnode {
    fs: Arc<Lpfs>,
    inode: Arc<Inode>,
}

/// Operation set of a vnode, picked from the kind decoded off disk.
pub enum NodeOps<'a> {
    Dir(DirOps<'a>),
    File(FileOps<'a>),
}

impl Vnode {
    pub fn new(fs: Arc<Lpfs>, inode: Arc<Inode>) -> Self {
        Self { fs, inode }
    }

    pub fn root(fs: &Arc<Lpfs>) -> FsResult<Self> {
        Ok(Self::new(Arc::clone(fs), fs.root()?))
    }

    pub fn ino(&self) -> Ino {
        self.inode.ino()
    }

    pub fn attr(&self) -> &InodeAttr {
        self.inode.wait_ready()
    }

    pub fn ops(&self) -> NodeOps<'_> {
        match self.attr().kind {
            InodeKind::Directory => NodeOps::Dir(DirOps { node: self }),
            InodeKind::Regular | InodeKind::Other => NodeOps::File(FileOps { node: self }),
        }
    }

    pub fn as_dir(&self) -> FsResult<DirOps<'_>> {
        match self.ops() {
            NodeOps::Dir(ops) => Ok(ops),
            NodeOps::File(_) => Err(FsError::NotADirectory),
        }
    }

    pub fn as_file(&self) -> FsResult<FileOps<'_>> {
        match self.ops() {
            NodeOps::File(ops) => Ok(ops),
            NodeOps::Dir(_) => Err(FsError::IsADirectory),
        }
    }

    pub fn is_dir(&self) -> bool {
        self.attr().is_dir()
    }
}

pub struct DirOps<'a> {
    node: &'a Vnode,
}

impl<'a> DirOps<'a> {
    pub fn lookup(&self, name: &str) -> FsResult<Vnode> {
        let inode = self.node.fs.lookup(self.node.attr(), name.as_bytes())?;
        Ok(Vnode::new(Arc::clone(&self.node.fs), inode))
    }

    pub fn read_dir(
        &self,
        cursor: &mut DirCursor,
        emit: impl FnMut(&DirEntry) -> bool,
    ) -> FsResult<()> {
        self.node.fs.read_dir(self.node.attr(), cursor, emit)
    }

    pub fn entries(&self) -> DirEntries<'a> {
        self.node.fs.dir_entries(self.node.attr(), DirCursor::new())
    }

    pub fn ls(&self) -> FsResult<Vec<DirEntry>> {
        self.entries().collect()
    }
}

pub struct FileOps<'a> {
    node: &'a Vnode,
}

impl FileOps<'_> {
    pub fn bmap(&self, logical_block: u64) -> FsResult<BlockAddr> {
        self.node.fs.bmap(self.node.ino(), logical_block)
    }

    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> FsResult<usize> {
        self.node.fs.read_at(self.node.attr(), offset, buf)
    }

    pub fn read_all(&self) -> FsResult<Vec<u8>> {
        self.node.fs.read_all(self.node.attr())
    }

    pub fn size(&self) -> u64 {
        self.node.attr().size
    }
}
