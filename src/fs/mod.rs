//! our mini-ext2 filesystem
//!
//! On-disk layout, in 512-byte blocks:
//! - 0: boot block, unused
//! - 1: superblock
//! - 2: group descriptor
//! - 3: block bitmap
//! - 4: inode bitmap
//! - 5..69: inode table
//! - 69..: data blocks
pub mod block_device;
pub mod block_group;
pub mod error;
pub mod filekind;
pub mod fs_layout;
pub mod inode;
pub mod open_file;
pub mod permission;
pub mod superblock;
mod directory;
mod fs_api_impl;
pub use block_device::*;
pub use block_group::ConsistencyReport;
pub use directory::{DirEntry, DirListing};
pub use error::{FsError, Result};
pub use filekind::FileKind;
pub use fs_layout::MiniExt2;
pub use inode::Inode;
pub use open_file::{Fd, OpenMode};
pub use permission::{Access, Identity};
pub use superblock::{GroupDescriptor, SuperBlock};

pub const FS_MAGIC: u32 = 0xEF53;
pub const BLOCK_SIZE: usize = 512;
pub const TOTAL_BLOCKS: u32 = 4611;

pub const SUPERBLOCK_BLOCK: u32 = 1;
pub const GROUP_DESC_BLOCK: u32 = 2;
pub const BLOCK_BITMAP_BLOCK: u32 = 3;
pub const INODE_BITMAP_BLOCK: u32 = 4;
pub const INODE_TABLE_START: u32 = 5;
pub const INODE_TABLE_BLOCKS: u32 = 64;
pub const FIRST_DATA_BLOCK: u32 = INODE_TABLE_START + INODE_TABLE_BLOCKS;

/// one bitmap block only covers this many blocks
pub const BITMAP_REACH: u32 = (BLOCK_SIZE * 8) as u32;
/// last allocatable block index (exclusive)
pub const ALLOCATABLE_END: u32 = if TOTAL_BLOCKS < BITMAP_REACH {
    TOTAL_BLOCKS
} else {
    BITMAP_REACH
};

pub const MAX_INODES: u32 = 256;
pub const INODE_SIZE: usize = 128;
pub const ROOT_INODE: u32 = 1;
pub const DIRECT_POINTERS: usize = 10;
pub const POINTERS_PER_BLOCK: usize = BLOCK_SIZE / std::mem::size_of::<u32>();
/// logical blocks addressable through direct and single-indirect pointers
pub const MAX_FILE_BLOCKS: u32 = (DIRECT_POINTERS + POINTERS_PER_BLOCK) as u32;

pub const DIR_ENTRY_SIZE: usize = 64;
pub const NAME_BUF_LEN: usize = 56;
/// one byte of the name buffer stays NUL
pub const NAME_MAX_LEN: usize = NAME_BUF_LEN - 1;
pub const MAX_PATH_LEN: usize = 255;
pub const MAX_OPEN_FILES: usize = 64;

pub const MODE_TYPE_MASK: u16 = 0o170000;
pub const MODE_DIR: u16 = 0o040000;
pub const MODE_REG: u16 = 0o100000;
pub const MODE_PERM_MASK: u16 = 0o777;
pub const DEFAULT_FILE_PERM: u16 = 0o644;
pub const DEFAULT_DIR_PERM: u16 = 0o755;

pub type Block = [u8; BLOCK_SIZE];
