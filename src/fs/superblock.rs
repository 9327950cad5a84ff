use serde::{Deserialize, Serialize};

use crate::utils::{time_util, traits::OnDiskRecord};

use super::{
    error::{FsError, Result},
    ALLOCATABLE_END, BLOCK_BITMAP_BLOCK, BLOCK_SIZE, FIRST_DATA_BLOCK, FS_MAGIC,
    INODE_BITMAP_BLOCK, INODE_TABLE_START, MAX_INODES, ROOT_INODE, TOTAL_BLOCKS,
};

/// The superblock of this filesystem
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct SuperBlock {
    /// magic number
    pub magic: u32,
    /// data block size
    pub block_size: u32,
    pub blocks_count: u32,
    pub inodes_count: u32,
    pub free_blocks: u32,
    pub free_inodes: u32,
    pub first_data_block: u32,
    pub inode_table_start: u32,
    pub block_bitmap_block: u32,
    pub inode_bitmap_block: u32,
    pub root_inode: u32,
    pub mount_time: u64,
    pub write_time: u64,
}

impl SuperBlock {
    /// a freshly formatted superblock: every allocatable block and every inode is free
    pub fn new() -> Self {
        let now = time_util::now_secs();
        Self {
            magic: FS_MAGIC,
            block_size: BLOCK_SIZE as u32,
            blocks_count: TOTAL_BLOCKS,
            inodes_count: MAX_INODES,
            free_blocks: ALLOCATABLE_END - FIRST_DATA_BLOCK,
            free_inodes: MAX_INODES,
            first_data_block: FIRST_DATA_BLOCK,
            inode_table_start: INODE_TABLE_START,
            block_bitmap_block: BLOCK_BITMAP_BLOCK,
            inode_bitmap_block: INODE_BITMAP_BLOCK,
            root_inode: ROOT_INODE,
            mount_time: now,
            write_time: now,
        }
    }

    /// refuse images that were not made by us
    pub fn validate(&self) -> Result<()> {
        if self.magic != FS_MAGIC {
            return Err(FsError::failed(format!(
                "bad magic {:#x}, expected {FS_MAGIC:#x}",
                self.magic
            )));
        }
        if self.block_size != BLOCK_SIZE as u32 {
            return Err(FsError::failed(format!(
                "bad block size {}, expected {BLOCK_SIZE}",
                self.block_size
            )));
        }
        Ok(())
    }

    pub fn update_mount_time(&mut self) {
        self.mount_time = time_util::now_secs();
    }

    pub fn update_write_time(&mut self) {
        self.write_time = time_util::now_secs();
    }
}

impl OnDiskRecord for SuperBlock {
    const RECORD_SIZE: usize = BLOCK_SIZE;
}

/// the single block group's descriptor, mirroring the superblock counters
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct GroupDescriptor {
    pub block_bitmap: u32,
    pub inode_bitmap: u32,
    pub inode_table: u32,
    pub free_blocks_count: u32,
    pub free_inodes_count: u32,
}

impl GroupDescriptor {
    pub fn new() -> Self {
        Self {
            block_bitmap: BLOCK_BITMAP_BLOCK,
            inode_bitmap: INODE_BITMAP_BLOCK,
            inode_table: INODE_TABLE_START,
            free_blocks_count: ALLOCATABLE_END - FIRST_DATA_BLOCK,
            free_inodes_count: MAX_INODES,
        }
    }
}

impl OnDiskRecord for GroupDescriptor {
    const RECORD_SIZE: usize = BLOCK_SIZE;
}
