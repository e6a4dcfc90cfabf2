//! Error types shared by every lpfs operation.

use core::fmt;

pub type FsResult<T> = Result<T, FsError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    /// ino absent from the inode map, or name absent from a directory
    NotFound,
    /// underlying block read/write failed
    Io,
    /// a record's position disagrees with its inode map address
    Inconsistent,
    /// logical block index beyond the direct block map
    OutOfRange,
    NotADirectory,
    IsADirectory,
    NameTooLong,
    AlreadyExists,
    /// superblock magic or geometry does not match this build
    BadMagic,
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            FsError::NotFound => "no such file or directory",
            FsError::Io => "i/o error",
            FsError::Inconsistent => "inode record disagrees with inode map",
            FsError::OutOfRange => "logical block out of range",
            FsError::NotADirectory => "not a directory",
            FsError::IsADirectory => "is a directory",
            FsError::NameTooLong => "file name too long",
            FsError::AlreadyExists => "file exists",
            FsError::BadMagic => "not an lpfs image",
        };
        f.write_str(msg)
    }
}

impl core::error::Error for FsError {}
