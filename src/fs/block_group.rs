//! bitmap allocation of data blocks and inodes
//!
//! Every call re-reads the bitmap block, flips one bit, writes it back and
//! persists both free counters. Nothing is cached between calls.
use std::fmt;

use bitvec::prelude::*;
use log::{debug, warn};

use super::{
    block_device::BlockDevice,
    error::{FsError, Result},
    fs_layout::MiniExt2,
    ALLOCATABLE_END, BLOCK_BITMAP_BLOCK, FIRST_DATA_BLOCK, INODE_BITMAP_BLOCK, MAX_INODES,
};

/// free counts as seen by the bitmaps and by both counter copies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsistencyReport {
    pub bitmap_free_blocks: u32,
    pub superblock_free_blocks: u32,
    pub group_free_blocks: u32,
    pub bitmap_free_inodes: u32,
    pub superblock_free_inodes: u32,
    pub group_free_inodes: u32,
}

impl ConsistencyReport {
    pub fn is_consistent(&self) -> bool {
        self.bitmap_free_blocks == self.superblock_free_blocks
            && self.bitmap_free_blocks == self.group_free_blocks
            && self.bitmap_free_inodes == self.superblock_free_inodes
            && self.bitmap_free_inodes == self.group_free_inodes
    }
}

impl fmt::Display for ConsistencyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "free blocks: bitmap {} superblock {} group {}",
            self.bitmap_free_blocks, self.superblock_free_blocks, self.group_free_blocks
        )?;
        write!(
            f,
            "free inodes: bitmap {} superblock {} group {}",
            self.bitmap_free_inodes, self.superblock_free_inodes, self.group_free_inodes
        )
    }
}

/// for inode and data block allocation
impl<D: BlockDevice> MiniExt2<D> {
    /// first free data block, in bitmap order
    pub(crate) fn alloc_block(&mut self) -> Result<u32> {
        let mut bitmap = self.read_block(BLOCK_BITMAP_BLOCK)?;
        let bits = bitmap.view_bits_mut::<Lsb0>();
        let index = bits[FIRST_DATA_BLOCK as usize..ALLOCATABLE_END as usize]
            .first_zero()
            .map(|p| p as u32 + FIRST_DATA_BLOCK)
            .ok_or(FsError::NoSpace)?;
        bits.set(index as usize, true);
        self.write_block(BLOCK_BITMAP_BLOCK, &bitmap)?;

        let superblock = self.superblock_mut();
        superblock.free_blocks = superblock.free_blocks.saturating_sub(1);
        let group = self.group_descriptor_mut();
        group.free_blocks_count = group.free_blocks_count.saturating_sub(1);
        self.persist_counters()?;
        debug!("allocated block {index}");
        Ok(index)
    }

    /// freeing a block that is already free does nothing
    pub(crate) fn free_block(&mut self, index: u32) -> Result<()> {
        if !(FIRST_DATA_BLOCK..ALLOCATABLE_END).contains(&index) {
            return Err(FsError::failed(format!(
                "block {index} is outside the data region"
            )));
        }
        let mut bitmap = self.read_block(BLOCK_BITMAP_BLOCK)?;
        let bits = bitmap.view_bits_mut::<Lsb0>();
        if !bits[index as usize] {
            debug!("block {index} is already free");
            return Ok(());
        }
        bits.set(index as usize, false);
        self.write_block(BLOCK_BITMAP_BLOCK, &bitmap)?;

        self.superblock_mut().free_blocks += 1;
        self.group_descriptor_mut().free_blocks_count += 1;
        self.persist_counters()?;
        debug!("released block {index}");
        Ok(())
    }

    /// first free inode number, starting at 1
    pub(crate) fn alloc_inode(&mut self) -> Result<u32> {
        let mut bitmap = self.read_block(INODE_BITMAP_BLOCK)?;
        let bits = bitmap.view_bits_mut::<Lsb0>();
        let ino = bits[1..=MAX_INODES as usize]
            .first_zero()
            .map(|p| p as u32 + 1)
            .ok_or(FsError::NoSpace)?;
        bits.set(ino as usize, true);
        self.write_block(INODE_BITMAP_BLOCK, &bitmap)?;

        let superblock = self.superblock_mut();
        superblock.free_inodes = superblock.free_inodes.saturating_sub(1);
        let group = self.group_descriptor_mut();
        group.free_inodes_count = group.free_inodes_count.saturating_sub(1);
        self.persist_counters()?;
        debug!("allocated inode {ino}");
        Ok(ino)
    }

    pub(crate) fn free_inode(&mut self, ino: u32) -> Result<()> {
        if ino == 0 || ino > MAX_INODES {
            return Err(FsError::NotFound);
        }
        let mut bitmap = self.read_block(INODE_BITMAP_BLOCK)?;
        let bits = bitmap.view_bits_mut::<Lsb0>();
        if !bits[ino as usize] {
            debug!("inode {ino} is already free");
            return Ok(());
        }
        bits.set(ino as usize, false);
        self.write_block(INODE_BITMAP_BLOCK, &bitmap)?;

        self.superblock_mut().free_inodes += 1;
        self.group_descriptor_mut().free_inodes_count += 1;
        self.persist_counters()?;
        debug!("released inode {ino}");
        Ok(())
    }

    /// compare the free counts implied by the bitmaps with both counter copies
    ///
    /// Read-only, nothing is repaired.
    pub fn census(&mut self) -> Result<ConsistencyReport> {
        let block_bitmap = self.read_block(BLOCK_BITMAP_BLOCK)?;
        let inode_bitmap = self.read_block(INODE_BITMAP_BLOCK)?;
        let report = ConsistencyReport {
            bitmap_free_blocks: block_bitmap.view_bits::<Lsb0>()
                [FIRST_DATA_BLOCK as usize..ALLOCATABLE_END as usize]
                .count_zeros() as u32,
            superblock_free_blocks: self.superblock().free_blocks,
            group_free_blocks: self.group_descriptor().free_blocks_count,
            bitmap_free_inodes: inode_bitmap.view_bits::<Lsb0>()[1..=MAX_INODES as usize]
                .count_zeros() as u32,
            superblock_free_inodes: self.superblock().free_inodes,
            group_free_inodes: self.group_descriptor().free_inodes_count,
        };
        if !report.is_consistent() {
            warn!("free counters disagree with the bitmaps:\n{report}");
        }
        Ok(report)
    }
}
