//! This module contains functions to locate the different fs components on disk

use crate::fs::{
    BLOCK_SIZE, DIR_ENTRY_SIZE, INODE_SIZE, INODE_TABLE_START, MAX_INODES, TOTAL_BLOCKS,
};

/// calculate the image file size
/// # Example
/// ```
/// use mini_ext2::utils::fs_size_calculator::image_size;
/// assert_eq!(image_size(), 4611 * 512);
/// ```
pub const fn image_size() -> u64 {
    TOTAL_BLOCKS as u64 * BLOCK_SIZE as u64
}

/// calculate how many blocks the inode table needs
/// # Example
/// ```
/// use mini_ext2::utils::fs_size_calculator::inode_table_blocks;
/// assert_eq!(inode_table_blocks(), 64);
/// ```
pub const fn inode_table_blocks() -> u32 {
    (MAX_INODES as usize * INODE_SIZE).div_ceil(BLOCK_SIZE) as u32
}

/// locate an inode record
/// # Arguments
/// - `ino`: inode number, start at 1
/// # Return
/// `(block index, byte offset inside the block)`
/// # Example
/// ```
/// use mini_ext2::utils::fs_size_calculator::inode_position;
/// assert_eq!(inode_position(1), (5, 0));
/// assert_eq!(inode_position(4), (5, 384));
/// assert_eq!(inode_position(5), (6, 0));
/// assert_eq!(inode_position(256), (68, 384));
/// ```
pub const fn inode_position(ino: u32) -> (u32, usize) {
    let byte = (ino as usize - 1) * INODE_SIZE;
    (
        INODE_TABLE_START + (byte / BLOCK_SIZE) as u32,
        byte % BLOCK_SIZE,
    )
}

/// locate a bit of a bitmap block
/// # Return
/// `(byte index, bit index)`, bits are counted from the least significant one
/// # Example
/// ```
/// use mini_ext2::utils::fs_size_calculator::bitmap_position;
/// assert_eq!(bitmap_position(0), (0, 0));
/// assert_eq!(bitmap_position(69), (8, 5));
/// ```
pub const fn bitmap_position(index: u32) -> (usize, u8) {
    ((index >> 3) as usize, (index & 7) as u8)
}

/// locate the n-th directory entry of a directory
/// # Return
/// `(logical block, byte offset inside the block)`
/// # Example
/// ```
/// use mini_ext2::utils::fs_size_calculator::dir_entry_position;
/// assert_eq!(dir_entry_position(0), (0, 0));
/// assert_eq!(dir_entry_position(7), (0, 448));
/// assert_eq!(dir_entry_position(8), (1, 0));
/// ```
pub const fn dir_entry_position(entry: u32) -> (u32, usize) {
    let byte = entry as usize * DIR_ENTRY_SIZE;
    ((byte / BLOCK_SIZE) as u32, byte % BLOCK_SIZE)
}
