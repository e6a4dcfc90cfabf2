//! On-disk structures.
//!
//! Every integer is little-endian and every structure is packed with no
//! padding, fields in declaration order. Records are decoded by value; nothing
//! here borrows from a cached block past the decode call.

use core::fmt;
use core::time::Duration;

use bitflags::bitflags;

use crate::constant::{BlockAddr, Ino, BLOCK_SIZE};
use crate::error::{FsError, FsResult};

pub const BMAP_CAPACITY: usize = 25;
const INODE_HEADER_SIZE: usize = 8 + 4 + 4 + 4 + 8 + 8 + 8 + 8 + 4;
pub const INODE_RECORD_SIZE: usize = INODE_HEADER_SIZE + BMAP_CAPACITY * 8;
pub const INODES_PER_BLOCK: usize = BLOCK_SIZE / INODE_RECORD_SIZE;
// 最大支持的文件大小是 BMAP_CAPACITY * BLOCK_SIZE = 100KiB
pub const MAX_FILE_SIZE: u64 = (BMAP_CAPACITY * BLOCK_SIZE) as u64;

pub const NAME_LEN_LIMIT: usize = 54;
pub const DIRENT_SIZE: usize = 8 + 2 + NAME_LEN_LIMIT;
pub const DIRENTS_PER_BLOCK: usize = BLOCK_SIZE / DIRENT_SIZE;

pub const IMAP_ENTRY_SIZE: usize = 16;
pub const IMAP_ENTRIES_PER_BLOCK: usize = BLOCK_SIZE / IMAP_ENTRY_SIZE;

const _: () = assert!(INODE_RECORD_SIZE == 256);
const _: () = assert!(DIRENT_SIZE == 64);

struct Fields<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Fields<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buf[self.pos..self.pos + N]);
        self.pos += N;
        out
    }

    fn u16(&mut self) -> u16 {
        u16::from_le_bytes(self.take())
    }

    fn u32(&mut self) -> u32 {
        u32::from_le_bytes(self.take())
    }

    fn u64(&mut self) -> u64 {
        u64::from_le_bytes(self.take())
    }
}

struct FieldsMut<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> FieldsMut<'a> {
    fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn put(&mut self, bytes: &[u8]) {
        self.buf[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
    }

    fn u16(&mut self, v: u16) {
        self.put(&v.to_le_bytes())
    }

    fn u32(&mut self, v: u32) {
        self.put(&v.to_le_bytes())
    }

    fn u64(&mut self, v: u64) {
        self.put(&v.to_le_bytes())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuperBlock {
    pub magic: u32,
    pub block_size: u32,
    pub total_blocks: u64,
    pub imap_start: BlockAddr,
    pub imap_len: u64,
    pub root_ino: Ino,
}

impl SuperBlock {
    pub const MAGIC: u32 = 0x4c50_4653;
    pub const SIZE: usize = 4 + 4 + 8 + 8 + 8 + 8;

    pub fn new(total_blocks: u64, imap_start: BlockAddr, imap_len: u64, root_ino: Ino) -> Self {
        Self {
            magic: Self::MAGIC,
            block_size: BLOCK_SIZE as u32,
            total_blocks,
            imap_start,
            imap_len,
            root_ino,
        }
    }

    pub fn valid(&self) -> bool {
        self.magic == Self::MAGIC && self.block_size as usize == BLOCK_SIZE
    }

    pub fn decode(buf: &[u8]) -> Self {
        let mut f = Fields::new(buf);
        Self {
            magic: f.u32(),
            block_size: f.u32(),
            total_blocks: f.u64(),
            imap_start: f.u64(),
            imap_len: f.u64(),
            root_ino: f.u64(),
        }
    }

    pub fn encode(&self, buf: &mut [u8]) {
        let mut f = FieldsMut::new(buf);
        f.u32(self.magic);
        f.u32(self.block_size);
        f.u64(self.total_blocks);
        f.u64(self.imap_start);
        f.u64(self.imap_len);
        f.u64(self.root_ino);
    }
}

bitflags! {
    /// POSIX mode word as stored on disk
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FileMode: u32 {
        const S_IFMT = 0o170000;
        const S_IFSOCK = 0o140000;
        const S_IFLNK = 0o120000;
        const S_IFREG = 0o100000;
        const S_IFBLK = 0o060000;
        const S_IFDIR = 0o040000;
        const S_IFCHR = 0o020000;
        const S_IFIFO = 0o010000;
        const S_ISUID = 0o4000;
        const S_ISGID = 0o2000;
        const S_ISVTX = 0o1000;
        const PERM = 0o0777;
    }
}

impl FileMode {
    pub fn dir(perm: u32) -> Self {
        Self::S_IFDIR | Self::from_bits_retain(perm & 0o7777)
    }

    pub fn file(perm: u32) -> Self {
        Self::S_IFREG | Self::from_bits_retain(perm & 0o7777)
    }

    pub fn kind(self) -> InodeKind {
        let ty = self.bits() & Self::S_IFMT.bits();
        if ty == Self::S_IFDIR.bits() {
            InodeKind::Directory
        } else if ty == Self::S_IFREG.bits() {
            InodeKind::Regular
        } else {
            InodeKind::Other
        }
    }

    pub fn permissions(self) -> u32 {
        self.bits() & 0o7777
    }
}

/// 决定inode走目录操作集还是文件操作集
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InodeKind {
    Directory,
    Regular,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskInode {
    pub ino: Ino,
    pub link_count: u32,
    pub uid: u32,
    pub gid: u32,
    pub version: u64,
    pub size: u64,
    pub mtime_usec: u64,
    pub ctime_usec: u64,
    pub mode: u32,
    pub bmap: [BlockAddr; BMAP_CAPACITY],
}

impl DiskInode {
    pub fn new(ino: Ino, mode: FileMode) -> Self {
        Self {
            ino,
            link_count: 1,
            uid: 0,
            gid: 0,
            version: 1,
            size: 0,
            mtime_usec: 0,
            ctime_usec: 0,
            mode: mode.bits(),
            bmap: [0; BMAP_CAPACITY],
        }
    }

    /// `buf` must hold at least one full record
    pub fn decode(buf: &[u8]) -> Self {
        let mut f = Fields::new(&buf[..INODE_RECORD_SIZE]);
        let mut inode = Self {
            ino: f.u64(),
            link_count: f.u32(),
            uid: f.u32(),
            gid: f.u32(),
            version: f.u64(),
            size: f.u64(),
            mtime_usec: f.u64(),
            ctime_usec: f.u64(),
            mode: f.u32(),
            bmap: [0; BMAP_CAPACITY],
        };
        for slot in inode.bmap.iter_mut() {
            *slot = f.u64();
        }
        inode
    }

    pub fn encode(&self, buf: &mut [u8]) {
        let mut f = FieldsMut::new(&mut buf[..INODE_RECORD_SIZE]);
        f.u64(self.ino);
        f.u32(self.link_count);
        f.u32(self.uid);
        f.u32(self.gid);
        f.u64(self.version);
        f.u64(self.size);
        f.u64(self.mtime_usec);
        f.u64(self.ctime_usec);
        f.u32(self.mode);
        for &addr in self.bmap.iter() {
            f.u64(addr);
        }
    }

    /// peek at the leading ino without decoding the rest
    pub fn peek_ino(buf: &[u8]) -> Ino {
        Fields::new(buf).u64()
    }

    pub fn file_mode(&self) -> FileMode {
        FileMode::from_bits_retain(self.mode)
    }

    pub fn mtime(&self) -> Duration {
        Duration::from_micros(self.mtime_usec)
    }

    pub fn ctime(&self) -> Duration {
        Duration::from_micros(self.ctime_usec)
    }
}

/// Fixed-width directory slot. `inode_number == 0` marks a free slot.
#[derive(Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub inode_number: Ino,
    name_length: u16,
    name: [u8; NAME_LEN_LIMIT],
}

impl DirEntry {
    pub fn new(name: &str, inode_number: Ino) -> FsResult<Self> {
        Self::from_bytes(name.as_bytes(), inode_number)
    }

    pub fn from_bytes(name: &[u8], inode_number: Ino) -> FsResult<Self> {
        if name.len() > NAME_LEN_LIMIT {
            return Err(FsError::NameTooLong);
        }
        let mut buf = [0u8; NAME_LEN_LIMIT];
        buf[..name.len()].copy_from_slice(name);
        Ok(Self {
            inode_number,
            name_length: name.len() as u16,
            name: buf,
        })
    }

    pub fn empty() -> Self {
        Self {
            inode_number: 0,
            name_length: 0,
            name: [0u8; NAME_LEN_LIMIT],
        }
    }

    pub fn is_free(&self) -> bool {
        self.inode_number == 0
    }

    /// stored length fits the name buffer
    pub fn is_well_formed(&self) -> bool {
        self.name_length as usize <= NAME_LEN_LIMIT
    }

    pub fn name_len(&self) -> usize {
        self.name_length as usize
    }

    pub fn name(&self) -> &[u8] {
        &self.name[..(self.name_length as usize).min(NAME_LEN_LIMIT)]
    }

    pub fn name_lossy(&self) -> alloc::borrow::Cow<'_, str> {
        alloc::string::String::from_utf8_lossy(self.name())
    }

    pub fn decode(buf: &[u8]) -> Self {
        let mut f = Fields::new(&buf[..DIRENT_SIZE]);
        Self {
            inode_number: f.u64(),
            name_length: f.u16(),
            name: f.take(),
        }
    }

    pub fn encode(&self, buf: &mut [u8]) {
        let mut f = FieldsMut::new(&mut buf[..DIRENT_SIZE]);
        f.u64(self.inode_number);
        f.u16(self.name_length);
        f.put(&self.name);
    }
}

impl fmt::Debug for DirEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirEntry")
            .field("inode_number", &self.inode_number)
            .field("name", &self.name_lossy())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn geometry() {
        assert_eq!(INODES_PER_BLOCK, 16);
        assert_eq!(DIRENTS_PER_BLOCK, 64);
        assert_eq!(MAX_FILE_SIZE, 25 * 4096);
    }

    #[test]
    fn field_order_is_fixed() {
        let mut inode = DiskInode::new(0x0102, FileMode::file(0o644));
        inode.link_count = 3;
        inode.bmap[0] = 0xaa;
        let mut buf = [0u8; INODE_RECORD_SIZE];
        inode.encode(&mut buf);
        assert_eq!(&buf[..8], &0x0102u64.to_le_bytes());
        assert_eq!(&buf[8..12], &3u32.to_le_bytes());
        assert_eq!(&buf[52..56], &(0o100644u32).to_le_bytes());
        assert_eq!(&buf[56..64], &0xaau64.to_le_bytes());
        assert_eq!(DiskInode::peek_ino(&buf), 0x0102);
    }

    #[test]
    fn mode_kind() {
        assert_eq!(FileMode::dir(0o755).kind(), InodeKind::Directory);
        assert_eq!(FileMode::file(0o644).kind(), InodeKind::Regular);
        // socket shares the S_IFDIR bit but is not a directory
        assert_eq!(FileMode::S_IFSOCK.kind(), InodeKind::Other);
        assert_eq!(FileMode::dir(0o755).permissions(), 0o755);
    }

    #[test]
    fn dirent_name_limit() {
        let long = "x".repeat(NAME_LEN_LIMIT + 1);
        assert_eq!(DirEntry::new(&long, 3), Err(FsError::NameTooLong));
        let ok = DirEntry::new(&long[..NAME_LEN_LIMIT], 3).unwrap();
        assert_eq!(ok.name().len(), NAME_LEN_LIMIT);
    }

    #[test]
    fn malformed_dirent_is_detected() {
        let mut buf = [0u8; DIRENT_SIZE];
        DirEntry::new("abc", 9).unwrap().encode(&mut buf);
        buf[8..10].copy_from_slice(&200u16.to_le_bytes());
        let entry = DirEntry::decode(&buf);
        assert!(!entry.is_well_formed());
        assert_eq!(entry.name().len(), NAME_LEN_LIMIT);
    }

    proptest! {
        #[test]
        fn inode_record_roundtrip(
            ino in 1u64..,
            link_count: u32,
            uid: u32,
            gid: u32,
            version: u64,
            size: u64,
            mtime_usec: u64,
            ctime_usec: u64,
            mode: u32,
            bmap in proptest::array::uniform25(any::<u64>()),
        ) {
            let inode = DiskInode {
                ino, link_count, uid, gid, version, size, mtime_usec, ctime_usec, mode, bmap,
            };
            let mut buf = [0u8; INODE_RECORD_SIZE];
            inode.encode(&mut buf);
            let back = DiskInode::decode(&buf);
            prop_assert_eq!(&back, &inode);
            prop_assert_eq!(back.mtime().as_micros(), mtime_usec as u128);
            prop_assert_eq!(back.ctime().as_micros(), ctime_usec as u128);
        }
    }
}
