//! the per-session open-file table
use std::fmt;

use super::{
    error::{FsError, Result},
    MAX_OPEN_FILES,
};

/// index into the open-file table
pub type Fd = usize;

/// how a descriptor was opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenMode {
    #[default]
    Read,
    /// read and write, created when missing, never truncated
    Write,
}

impl OpenMode {
    pub fn is_writable(self) -> bool {
        self == OpenMode::Write
    }
}

/// any mode string containing `w` is writable, everything else reads only
impl From<&str> for OpenMode {
    fn from(mode: &str) -> Self {
        if mode.contains('w') {
            OpenMode::Write
        } else {
            OpenMode::Read
        }
    }
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpenMode::Read => write!(f, "r"),
            OpenMode::Write => write!(f, "w"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenFile {
    pub ino: u32,
    /// byte offset of the cursor
    pub offset: u32,
    pub writable: bool,
}

#[derive(Debug)]
pub struct OpenFileTable {
    slots: [Option<OpenFile>; MAX_OPEN_FILES],
}

impl Default for OpenFileTable {
    fn default() -> Self {
        Self {
            slots: [None; MAX_OPEN_FILES],
        }
    }
}

impl OpenFileTable {
    /// take the first free slot
    pub fn insert(&mut self, ino: u32, mode: OpenMode) -> Result<Fd> {
        let fd = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or_else(|| FsError::failed("too many open files"))?;
        self.slots[fd] = Some(OpenFile {
            ino,
            offset: 0,
            writable: mode.is_writable(),
        });
        Ok(fd)
    }

    pub fn get(&self, fd: Fd) -> Result<&OpenFile> {
        self.slots
            .get(fd)
            .and_then(Option::as_ref)
            .ok_or(FsError::BadDescriptor)
    }

    pub fn get_mut(&mut self, fd: Fd) -> Result<&mut OpenFile> {
        self.slots
            .get_mut(fd)
            .and_then(Option::as_mut)
            .ok_or(FsError::BadDescriptor)
    }

    pub fn remove(&mut self, fd: Fd) -> Result<OpenFile> {
        self.slots
            .get_mut(fd)
            .and_then(Option::take)
            .ok_or(FsError::BadDescriptor)
    }

    /// drop every descriptor on `ino`, returns how many were dropped
    pub fn invalidate(&mut self, ino: u32) -> usize {
        let mut dropped = 0;
        for slot in self.slots.iter_mut() {
            if matches!(slot, Some(file) if file.ino == ino) {
                *slot = None;
                dropped += 1;
            }
        }
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_mode_from_str() {
        assert_eq!(OpenMode::from("r"), OpenMode::Read);
        assert_eq!(OpenMode::from("w"), OpenMode::Write);
        assert_eq!(OpenMode::from("rw"), OpenMode::Write);
        assert_eq!(OpenMode::from("w+"), OpenMode::Write);
        assert_eq!(OpenMode::from(""), OpenMode::Read);
    }

    #[test]
    fn test_first_free_slot_is_reused() {
        let mut table = OpenFileTable::default();
        assert_eq!(table.insert(3, OpenMode::Read).unwrap(), 0);
        assert_eq!(table.insert(4, OpenMode::Write).unwrap(), 1);
        assert_eq!(table.insert(5, OpenMode::Read).unwrap(), 2);
        table.remove(1).unwrap();
        assert_eq!(table.insert(6, OpenMode::Read).unwrap(), 1);
        assert_eq!(table.get(1).unwrap().ino, 6);
        assert!(!table.get(1).unwrap().writable);
    }

    #[test]
    fn test_table_capacity() {
        let mut table = OpenFileTable::default();
        for i in 0..MAX_OPEN_FILES {
            assert_eq!(table.insert(2, OpenMode::Read).unwrap(), i);
        }
        assert!(matches!(
            table.insert(2, OpenMode::Read),
            Err(FsError::Failed(_))
        ));
    }

    #[test]
    fn test_bad_descriptors() {
        let mut table = OpenFileTable::default();
        assert!(matches!(table.get(0), Err(FsError::BadDescriptor)));
        assert!(matches!(
            table.get(MAX_OPEN_FILES + 1),
            Err(FsError::BadDescriptor)
        ));
        let fd = table.insert(2, OpenMode::Read).unwrap();
        table.remove(fd).unwrap();
        assert!(matches!(table.remove(fd), Err(FsError::BadDescriptor)));
    }

    #[test]
    fn test_invalidate() {
        let mut table = OpenFileTable::default();
        table.insert(7, OpenMode::Read).unwrap();
        table.insert(8, OpenMode::Read).unwrap();
        table.insert(7, OpenMode::Write).unwrap();
        assert_eq!(table.invalidate(7), 2);
        assert!(matches!(table.get(0), Err(FsError::BadDescriptor)));
        assert_eq!(table.get(1).unwrap().ino, 8);
        assert!(matches!(table.get(2), Err(FsError::BadDescriptor)));
    }
}
