//! Directory enumeration and name lookup.
//!
//! A directory's data is an array of fixed-width [`DirEntry`] slots. Free
//! slots (`inode_number == 0`) keep their position and are skipped. The
//! on-disk entry carries no file type; callers that need it resolve the
//! target inode with [`Lpfs::entry_kind`].

use alloc::sync::Arc;
use log::warn;

use crate::{
    constant::{Ino, BLOCK_SIZE, NULL},
    error::{FsError, FsResult},
    fs::Lpfs,
    inode::{Inode, InodeAttr},
    layout::{DirEntry, InodeKind, DIRENT_SIZE, NAME_LEN_LIMIT},
    stats::FsStats,
};

/// Restartable enumeration position: byte offset of the next unconsumed slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirCursor {
    pos: u64,
}

impl DirCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// rounds down to a slot boundary
    pub fn at(pos: u64) -> Self {
        Self {
            pos: pos - pos % DIRENT_SIZE as u64,
        }
    }

    pub fn pos(&self) -> u64 {
        self.pos
    }

    fn advance(&mut self) {
        self.pos += DIRENT_SIZE as u64;
    }
}

impl Lpfs {
    /// Emits live entries of `dir` starting at `cursor` until `emit` returns
    /// false or the directory ends. The entry `emit` refused stays unconsumed.
    pub fn read_dir(
        &self,
        dir: &InodeAttr,
        cursor: &mut DirCursor,
        mut emit: impl FnMut(&DirEntry) -> bool,
    ) -> FsResult<()> {
        if !dir.is_dir() {
            return Err(FsError::NotADirectory);
        }
        while cursor.pos < dir.size && dir.size - cursor.pos >= DIRENT_SIZE as u64 {
            let logical = cursor.pos / BLOCK_SIZE as u64;
            let block_start = logical * BLOCK_SIZE as u64;
            // 本块中最后一个完整槽位的结尾
            let limit = (dir.size - block_start).min(BLOCK_SIZE as u64) as usize;
            let limit = limit - limit % DIRENT_SIZE;

            let physical = self.bmap(dir.ino, logical)?;
            if physical == NULL {
                cursor.pos = block_start + limit as u64;
                continue;
            }
            let block = self.cache.get(physical)?;
            let data = block.lock().read(|data| *data);

            let mut offset = (cursor.pos - block_start) as usize;
            while offset + DIRENT_SIZE <= limit {
                let entry = DirEntry::decode(&data[offset..]);
                if !entry.is_free() {
                    if !entry.is_well_formed() {
                        FsStats::bump(&self.stats.corrupt_dirents);
                        warn!(
                            "dir {}: slot at {} has name length {}",
                            dir.ino,
                            cursor.pos,
                            entry.name_len()
                        );
                    } else if !emit(&entry) {
                        return Ok(());
                    }
                }
                offset += DIRENT_SIZE;
                cursor.advance();
            }
        }
        Ok(())
    }

    /// Lazy sequence of the live entries of `dir`, from `cursor` on.
    pub fn dir_entries(&self, dir: &InodeAttr, cursor: DirCursor) -> DirEntries<'_> {
        DirEntries {
            fs: self,
            dir: dir.clone(),
            cursor,
            done: false,
        }
    }

    /// Linear scan of `dir` for `name`, then resolves the matched ino.
    pub fn lookup(&self, dir: &InodeAttr, name: &[u8]) -> FsResult<Arc<Inode>> {
        if !dir.is_dir() {
            return Err(FsError::NotADirectory);
        }
        if name.len() > NAME_LEN_LIMIT {
            return Err(FsError::NotFound);
        }
        let mut hit = None;
        self.read_dir(dir, &mut DirCursor::new(), |entry| {
            if entry.name() == name {
                hit = Some(entry.inode_number);
                false
            } else {
                true
            }
        })?;
        self.iget(hit.ok_or(FsError::NotFound)?)
    }

    /// The type of a directory entry's target, read from its inode.
    pub fn entry_kind(&self, ino: Ino) -> FsResult<InodeKind> {
        Ok(self.iget(ino)?.wait_ready().kind)
    }

    /// Walks `path` from the root. `.` and `..` are ordinary entries.
    pub fn resolve_path(&self, path: &str) -> FsResult<Arc<Inode>> {
        let mut cur = self.root()?;
        for name in path.split('/').filter(|name| !name.is_empty()) {
            let next = self.lookup(cur.wait_ready(), name.as_bytes())?;
            cur = next;
        }
        Ok(cur)
    }
}

pub struct DirEntries<'a> {
    fs: &'a Lpfs,
    dir: InodeAttr,
    cursor: DirCursor,
    done: bool,
}

impl DirEntries<'_> {
    /// where a later enumeration should resume
    pub fn position(&self) -> DirCursor {
        self.cursor
    }
}

impl Iterator for DirEntries<'_> {
    type Item = FsResult<DirEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut found = None;
        let res = self.fs.read_dir(&self.dir, &mut self.cursor, |entry| {
            found = Some(entry.clone());
            false
        });
        match (res, found) {
            (Err(err), _) => {
                self.done = true;
                Some(Err(err))
            }
            (Ok(()), Some(entry)) => {
                self.cursor.advance();
                Some(Ok(entry))
            }
            (Ok(()), None) => {
                self.done = true;
                None
            }
        }
    }
}
