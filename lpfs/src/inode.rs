//! In-memory inode objects.
//!
//! An [`Inode`] is created `New` by the inode cache on first reference.
//! Exactly one caller wins [`Inode::try_claim`], fills the attributes and
//! publishes them; everybody else either skips the object (sibling
//! collection) or waits for the publication (the target of a lookup).

use core::sync::atomic::{AtomicU8, Ordering};
use core::time::Duration;

use spin::Once;

use crate::constant::{blocks_for, Ino};
use crate::layout::{DiskInode, FileMode, InodeKind};

/// Identifies the mount an inode belongs to, without owning it.
pub type FsId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum InodeState {
    New = 0,
    Publishing = 1,
    Ready = 2,
}

impl From<u8> for InodeState {
    fn from(v: u8) -> Self {
        match v {
            0 => InodeState::New,
            1 => InodeState::Publishing,
            _ => InodeState::Ready,
        }
    }
}

/// Semantic view of a decoded inode record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InodeAttr {
    pub ino: Ino,
    pub nlink: u32,
    pub uid: u32,
    pub gid: u32,
    pub version: u64,
    pub size: u64,
    /// `ceil(size / BLOCK_SIZE)`
    pub blocks: u64,
    pub mtime: Duration,
    pub ctime: Duration,
    pub mode: FileMode,
    pub kind: InodeKind,
}

impl From<&DiskInode> for InodeAttr {
    fn from(d: &DiskInode) -> Self {
        let mode = d.file_mode();
        Self {
            ino: d.ino,
            nlink: d.link_count,
            uid: d.uid,
            gid: d.gid,
            version: d.version,
            size: d.size,
            blocks: blocks_for(d.size),
            mtime: d.mtime(),
            ctime: d.ctime(),
            mode,
            kind: mode.kind(),
        }
    }
}

impl InodeAttr {
    pub fn is_dir(&self) -> bool {
        self.kind == InodeKind::Directory
    }

    pub fn is_file(&self) -> bool {
        self.kind == InodeKind::Regular
    }
}

#[derive(Debug)]
pub struct Inode {
    ino: Ino,
    fs: FsId,
    state: AtomicU8,
    attr: Once<InodeAttr>,
}

impl Inode {
    pub fn new(ino: Ino, fs: FsId) -> Self {
        Self {
            ino,
            fs,
            state: AtomicU8::new(InodeState::New as u8),
            attr: Once::new(),
        }
    }

    pub fn ino(&self) -> Ino {
        self.ino
    }

    pub fn fs_id(&self) -> FsId {
        self.fs
    }

    pub fn state(&self) -> InodeState {
        self.state.load(Ordering::Acquire).into()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == InodeState::Ready
    }

    /// New -> Publishing. Only the caller that gets `true` may fill.
    pub(crate) fn try_claim(&self) -> bool {
        self.state
            .compare_exchange(
                InodeState::New as u8,
                InodeState::Publishing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Fills a claimed object and makes it visible as Ready.
    pub(crate) fn publish(&self, attr: InodeAttr) -> &InodeAttr {
        debug_assert_eq!(self.state(), InodeState::Publishing);
        let attr = self.attr.call_once(|| attr);
        self.state.store(InodeState::Ready as u8, Ordering::Release);
        attr
    }

    /// Blocks until the claiming caller has published. Never returns for an
    /// object nobody claims, so only the resolver calls it.
    pub(crate) fn wait_ready(&self) -> &InodeAttr {
        self.attr.wait()
    }

    /// Filled attributes; always `Some` for objects handed out by `iget`.
    pub fn attr(&self) -> Option<&InodeAttr> {
        self.attr.get()
    }
}
