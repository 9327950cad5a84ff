use serde::{Deserialize, Serialize};

use super::{MODE_DIR, MODE_REG, MODE_TYPE_MASK};

/// an enum to describe the type of a file
#[derive(Serialize, Deserialize, Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum FileKind {
    /// an regular file
    RegularFile,
    /// a directory
    Directory,
    /// Unknown
    #[default]
    Unknown,
}

impl FileKind {
    /// type bits of an inode mode
    pub const fn mode_bits(self) -> u16 {
        match self {
            FileKind::RegularFile => MODE_REG,
            FileKind::Directory => MODE_DIR,
            FileKind::Unknown => 0,
        }
    }

    /// the `file_type` byte of a directory entry
    pub const fn dirent_type(self) -> u8 {
        match self {
            FileKind::RegularFile => 1,
            FileKind::Directory => 2,
            FileKind::Unknown => 0,
        }
    }

    pub const fn from_dirent_type(file_type: u8) -> Self {
        match file_type {
            1 => FileKind::RegularFile,
            2 => FileKind::Directory,
            _ => FileKind::Unknown,
        }
    }
}

/// decode the type bits of an inode mode
impl From<u16> for FileKind {
    fn from(mode: u16) -> Self {
        match mode & MODE_TYPE_MASK {
            MODE_DIR => FileKind::Directory,
            MODE_REG => FileKind::RegularFile,
            _ => FileKind::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_type_bits() {
        assert_eq!(FileKind::from(0o040755), FileKind::Directory);
        assert_eq!(FileKind::from(0o100644), FileKind::RegularFile);
        assert_eq!(FileKind::from(0o000644), FileKind::Unknown);
        assert_eq!(FileKind::Directory.mode_bits() | 0o755, 0o040755);
    }

    #[test]
    fn test_dirent_type_byte() {
        for kind in [FileKind::RegularFile, FileKind::Directory] {
            assert_eq!(FileKind::from_dirent_type(kind.dirent_type()), kind);
        }
        assert_eq!(FileKind::from_dirent_type(9), FileKind::Unknown);
    }
}
