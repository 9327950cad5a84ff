use serde::{Deserialize, Serialize};

use crate::utils::{time_util, traits::OnDiskRecord};

use super::{
    filekind::FileKind, Block, DIRECT_POINTERS, INODE_SIZE, MODE_PERM_MASK, POINTERS_PER_BLOCK,
};

/// one 128-byte slot of the inode table
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Inode {
    /// type bits and permission bits
    pub mode: u16,
    pub uid: u16,
    pub size: u32,
    pub atime: u32,
    pub mtime: u32,
    /// creation time, refreshed on metadata changes
    pub ctime: u32,
    /// stored, never checked
    pub gid: u16,
    pub links: u16,
    /// data blocks in use, the indirect index block is not counted
    pub blocks: u32,
    pub direct: [u32; DIRECT_POINTERS],
    pub indirect: u32,
}

impl OnDiskRecord for Inode {
    const RECORD_SIZE: usize = INODE_SIZE;
}

impl Inode {
    pub fn new(kind: FileKind, permissions: u16, uid: u16) -> Self {
        let now = time_util::now();
        Inode {
            mode: kind.mode_bits() | (permissions & MODE_PERM_MASK),
            uid,
            atime: now,
            mtime: now,
            ctime: now,
            links: match kind {
                FileKind::Directory => 2,
                _ => 1,
            },
            ..Inode::default()
        }
    }
}

/// This block is about file metadata operations
impl Inode {
    pub fn kind(&self) -> FileKind {
        FileKind::from(self.mode)
    }

    pub fn is_dir(&self) -> bool {
        self.kind() == FileKind::Directory
    }

    pub fn is_regular_file(&self) -> bool {
        self.kind() == FileKind::RegularFile
    }

    pub fn permissions(&self) -> u16 {
        self.mode & MODE_PERM_MASK
    }

    /// replace the permission bits, keeping the type bits
    pub fn set_permissions(&mut self, permissions: u16) {
        self.mode = (self.mode & !MODE_PERM_MASK) | (permissions & MODE_PERM_MASK);
        self.ctime = time_util::now();
    }

    pub fn update_accessed_at(&mut self) {
        self.atime = time_util::now();
    }

    pub fn update_modified_at(&mut self) {
        self.mtime = time_util::now();
    }

    pub fn update_changed_at(&mut self) {
        self.ctime = time_util::now();
    }
}

/// decode a block of little endian block pointers
pub fn pointer_table(block: &Block) -> [u32; POINTERS_PER_BLOCK] {
    let mut table = [0u32; POINTERS_PER_BLOCK];
    for (slot, bytes) in table.iter_mut().zip(block.chunks_exact(4)) {
        *slot = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    }
    table
}

/// store pointer `index` of a pointer block
pub fn set_pointer(block: &mut Block, index: usize, pointer: u32) {
    block[index * 4..index * 4 + 4].copy_from_slice(&pointer.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{BLOCK_SIZE, MODE_DIR, MODE_REG};

    #[test]
    fn test_new_inode() {
        let inode = Inode::new(FileKind::Directory, 0o755, 0);
        assert_eq!(inode.mode, MODE_DIR | 0o755);
        assert_eq!(inode.links, 2);
        assert!(inode.is_dir());
        assert_ne!(inode.mtime, 0);

        let inode = Inode::new(FileKind::RegularFile, 0o4644, 3);
        // only the 9 permission bits survive
        assert_eq!(inode.mode, MODE_REG | 0o644);
        assert_eq!(inode.links, 1);
        assert_eq!(inode.uid, 3);
        assert!(inode.is_regular_file());
    }

    #[test]
    fn test_set_permissions_keeps_type() {
        let mut inode = Inode::new(FileKind::RegularFile, 0o644, 0);
        inode.set_permissions(0o600);
        assert_eq!(inode.permissions(), 0o600);
        assert!(inode.is_regular_file());
    }

    #[test]
    fn test_inode_fits_its_slot() {
        let mut inode = Inode::new(FileKind::RegularFile, 0o644, 7);
        inode.size = 1234;
        inode.direct[9] = 4000;
        inode.indirect = 4095;
        let mut slot = [0xAAu8; INODE_SIZE];
        inode.encode_into(&mut slot).unwrap();
        assert_eq!(&slot[0..2], &inode.mode.to_le_bytes());
        assert_eq!(&slot[2..4], &7u16.to_le_bytes());
        assert_eq!(&slot[4..8], &1234u32.to_le_bytes());
        assert_eq!(Inode::decode_from(&slot).unwrap(), inode);
    }

    #[test]
    fn test_pointer_table() {
        let mut block = [0u8; BLOCK_SIZE];
        set_pointer(&mut block, 0, 69);
        set_pointer(&mut block, POINTERS_PER_BLOCK - 1, 4095);
        let table = pointer_table(&block);
        assert_eq!(table[0], 69);
        assert_eq!(table[1], 0);
        assert_eq!(table[POINTERS_PER_BLOCK - 1], 4095);
    }
}
