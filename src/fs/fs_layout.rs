//! what does our filesystem look like in the memory

use log::{debug, info};

use crate::utils::{fs_size_calculator, traits::OnDiskRecord};

use super::{
    block_device::BlockDevice,
    error::{FsError, Result},
    filekind::FileKind,
    inode::{self, Inode},
    open_file::OpenFileTable,
    permission::Identity,
    superblock::{GroupDescriptor, SuperBlock},
    Block, BLOCK_BITMAP_BLOCK, BLOCK_SIZE, DEFAULT_DIR_PERM, DIRECT_POINTERS, FIRST_DATA_BLOCK,
    GROUP_DESC_BLOCK, INODE_SIZE, MAX_FILE_BLOCKS, MAX_INODES, ROOT_INODE, SUPERBLOCK_BLOCK,
    TOTAL_BLOCKS,
};

/// one mounted filesystem session
///
/// It owns the device and everything that lives for one mount:
/// - in-memory copies of the superblock and the group descriptor
/// - the open-file table
/// - the current directory
/// - the acting identity
#[derive(Debug)]
pub struct MiniExt2<D: BlockDevice> {
    device: D,
    superblock: SuperBlock,
    group: GroupDescriptor,
    pub(crate) open_files: OpenFileTable,
    pub(crate) cwd: u32,
    pub(crate) identity: Identity,
}

impl<D: BlockDevice> MiniExt2<D> {
    /// build a fresh filesystem on `device`, destroying whatever it held
    ///
    /// Every block is zeroed, the metadata blocks are marked in use,
    /// the root directory gets inode 1 with `.` and `..` pointing at itself
    /// and the account store is created.
    pub fn format(device: D) -> Result<Self> {
        info!("format() called");
        let mut fs = MiniExt2 {
            device,
            superblock: SuperBlock::new(),
            group: GroupDescriptor::new(),
            open_files: OpenFileTable::default(),
            cwd: ROOT_INODE,
            identity: Identity::root(),
        };
        let zero = [0u8; BLOCK_SIZE];
        for index in 0..TOTAL_BLOCKS {
            fs.device.write_block(index, &zero)?;
        }
        fs.persist_counters()?;

        // metadata blocks are never handed out
        fs.mark_reserved_blocks(FIRST_DATA_BLOCK)?;

        let root = fs.alloc_inode()?;
        if root != ROOT_INODE {
            return Err(FsError::failed(format!(
                "root inode index must be {ROOT_INODE}, not {root}"
            )));
        }
        fs.write_inode(root, &Inode::new(FileKind::Directory, DEFAULT_DIR_PERM, 0))?;
        fs.dir_add(root, ".", FileKind::Directory, root)?;
        fs.dir_add(root, "..", FileKind::Directory, root)?;

        fs.bootstrap_accounts()?;
        debug!(
            "formatted: {} free blocks, {} free inodes",
            fs.superblock.free_blocks, fs.superblock.free_inodes
        );
        Ok(fs)
    }

    /// attach to a formatted device
    ///
    /// Fails unless the magic number and the block size match.
    /// The previous session identity is restored from `/.session`,
    /// the superuser is used when there is none.
    pub fn mount(mut device: D) -> Result<Self> {
        info!("mount() called");
        let mut block = [0u8; BLOCK_SIZE];
        device.read_block(SUPERBLOCK_BLOCK, &mut block)?;
        let mut superblock = SuperBlock::decode_from(&block)?;
        superblock.validate()?;
        device.read_block(GROUP_DESC_BLOCK, &mut block)?;
        let group = GroupDescriptor::decode_from(&block)?;

        superblock.update_mount_time();
        let mut fs = MiniExt2 {
            device,
            superblock,
            group,
            open_files: OpenFileTable::default(),
            cwd: ROOT_INODE,
            identity: Identity::root(),
        };
        fs.persist_counters()?;
        fs.bootstrap_accounts()?;
        fs.load_session();
        info!("mounted as {}", fs.identity);
        Ok(fs)
    }

    /// detach and hand the device back; open descriptors are dropped
    pub fn unmount(mut self) -> Result<D> {
        info!("unmount() called");
        self.persist_counters()?;
        Ok(self.device)
    }
}

/// get the superblock, group descriptor and device of this filesystem
impl<D: BlockDevice> MiniExt2<D> {
    #[inline]
    pub fn superblock(&self) -> &SuperBlock {
        &self.superblock
    }

    #[inline]
    pub fn group_descriptor(&self) -> &GroupDescriptor {
        &self.group
    }

    #[inline]
    pub(crate) fn superblock_mut(&mut self) -> &mut SuperBlock {
        &mut self.superblock
    }

    #[inline]
    pub(crate) fn group_descriptor_mut(&mut self) -> &mut GroupDescriptor {
        &mut self.group
    }

    /// write both counter copies back
    pub(crate) fn persist_counters(&mut self) -> Result<()> {
        self.superblock.update_write_time();
        let mut block = [0u8; BLOCK_SIZE];
        self.superblock.encode_into(&mut block)?;
        self.device.write_block(SUPERBLOCK_BLOCK, &block)?;
        self.group.encode_into(&mut block)?;
        self.device.write_block(GROUP_DESC_BLOCK, &block)
    }

    pub(crate) fn read_block(&mut self, index: u32) -> Result<Block> {
        let mut block = [0u8; BLOCK_SIZE];
        self.device.read_block(index, &mut block)?;
        Ok(block)
    }

    pub(crate) fn write_block(&mut self, index: u32, block: &Block) -> Result<()> {
        self.device.write_block(index, block)
    }

    fn mark_reserved_blocks(&mut self, end: u32) -> Result<()> {
        let mut bitmap = self.read_block(BLOCK_BITMAP_BLOCK)?;
        for index in 0..end {
            let (byte, bit) = fs_size_calculator::bitmap_position(index);
            bitmap[byte] |= 1 << bit;
        }
        self.write_block(BLOCK_BITMAP_BLOCK, &bitmap)
    }
}

/// [Inode] operations
impl<D: BlockDevice> MiniExt2<D> {
    fn check_ino(ino: u32) -> Result<()> {
        if ino == 0 || ino > MAX_INODES {
            return Err(FsError::NotFound);
        }
        Ok(())
    }

    pub(crate) fn read_inode(&mut self, ino: u32) -> Result<Inode> {
        Self::check_ino(ino)?;
        let (index, offset) = fs_size_calculator::inode_position(ino);
        let block = self.read_block(index)?;
        Inode::decode_from(&block[offset..offset + INODE_SIZE])
    }

    pub(crate) fn write_inode(&mut self, ino: u32, inode: &Inode) -> Result<()> {
        Self::check_ino(ino)?;
        let (index, offset) = fs_size_calculator::inode_position(ino);
        let mut block = self.read_block(index)?;
        inode.encode_into(&mut block[offset..offset + INODE_SIZE])?;
        self.write_block(index, &block)
    }

    /// release every block the inode owns and reset it to an empty file
    pub(crate) fn truncate_inode(&mut self, ino: u32) -> Result<()> {
        let mut inode = self.read_inode(ino)?;
        for slot in 0..DIRECT_POINTERS {
            if inode.direct[slot] != 0 {
                self.free_block(inode.direct[slot])?;
                inode.direct[slot] = 0;
            }
        }
        if inode.indirect != 0 {
            let table = inode::pointer_table(&self.read_block(inode.indirect)?);
            for pointer in table.into_iter().filter(|p| *p != 0) {
                self.free_block(pointer)?;
            }
            self.free_block(inode.indirect)?;
            inode.indirect = 0;
        }
        inode.size = 0;
        inode.blocks = 0;
        inode.update_modified_at();
        inode.update_changed_at();
        debug!("truncated inode {ino}");
        self.write_inode(ino, &inode)
    }
}

/// data block operations
impl<D: BlockDevice> MiniExt2<D> {
    /// physical block behind logical block `logical`, 0 when unmapped
    pub(crate) fn lookup_block(&mut self, inode: &Inode, logical: u32) -> Result<u32> {
        let logical = logical as usize;
        if logical < DIRECT_POINTERS {
            return Ok(inode.direct[logical]);
        }
        if logical >= MAX_FILE_BLOCKS as usize || inode.indirect == 0 {
            return Ok(0);
        }
        let table = inode::pointer_table(&self.read_block(inode.indirect)?);
        Ok(table[logical - DIRECT_POINTERS])
    }

    /// like [lookup_block](MiniExt2::lookup_block) but fills holes with
    /// freshly allocated zeroed blocks
    ///
    /// The caller persists `inode`.
    pub(crate) fn map_block_for_write(&mut self, inode: &mut Inode, logical: u32) -> Result<u32> {
        if logical >= MAX_FILE_BLOCKS {
            return Err(FsError::NoSpace);
        }
        let logical = logical as usize;
        if logical < DIRECT_POINTERS {
            if inode.direct[logical] == 0 {
                inode.direct[logical] = self.alloc_zeroed_block()?;
                inode.blocks += 1;
                inode.update_changed_at();
                debug!(
                    "mapped logical block {logical} to {}",
                    inode.direct[logical]
                );
            }
            return Ok(inode.direct[logical]);
        }

        if inode.indirect == 0 {
            inode.indirect = self.alloc_zeroed_block()?;
            inode.update_changed_at();
            debug!("allocated indirect index block {}", inode.indirect);
        }
        let slot = logical - DIRECT_POINTERS;
        let mut table = self.read_block(inode.indirect)?;
        let pointer = inode::pointer_table(&table)[slot];
        if pointer != 0 {
            return Ok(pointer);
        }
        let block = self.alloc_zeroed_block()?;
        inode::set_pointer(&mut table, slot, block);
        self.write_block(inode.indirect, &table)?;
        inode.blocks += 1;
        debug!("mapped logical block {logical} to {block} through the indirect table");
        Ok(block)
    }

    fn alloc_zeroed_block(&mut self) -> Result<u32> {
        let block = self.alloc_block()?;
        self.write_block(block, &[0u8; BLOCK_SIZE])?;
        Ok(block)
    }
}
