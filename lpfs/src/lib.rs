//! lpfs: metadata resolution core of a simple block-based file system.
//!
//! Inode numbers resolve through an inode map to packed on-disk records;
//! files map logical blocks through a fixed direct block map; directories
//! are arrays of fixed-width entries.

#![cfg_attr(not(test), no_std)]
extern crate alloc;

pub mod block_cache;
pub mod block_dev;
mod bmap;
mod collect;
pub mod constant;
pub mod dir;
pub mod error;
pub mod fs;
pub mod icache;
pub mod imap;
pub mod inode;
pub mod layout;
pub mod mkfs;
pub mod stats;
pub mod vfs;

pub use dir::{DirCursor, DirEntries};
pub use error::{FsError, FsResult};
pub use fs::{Lpfs, MountOptions};
pub use inode::{Inode, InodeAttr, InodeState};
pub use layout::{DirEntry, FileMode, InodeKind};
pub use vfs::Vnode;
