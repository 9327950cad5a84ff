//! linear directories: 64-byte entries packed into the direct blocks
//! of a directory inode, removed entries stay behind as holes
use log::debug;
use serde::{Deserialize, Serialize};
use serde_big_array::BigArray;
use smallvec::SmallVec;

use crate::utils::{fs_size_calculator, traits::OnDiskRecord};

use super::{
    block_device::BlockDevice,
    error::{FsError, Result},
    filekind::FileKind,
    fs_layout::MiniExt2,
    BLOCK_SIZE, DIRECT_POINTERS, DIR_ENTRY_SIZE, MAX_PATH_LEN, NAME_BUF_LEN, NAME_MAX_LEN,
    ROOT_INODE,
};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// 0 marks a removed entry
    pub ino: u32,
    pub rec_len: u16,
    pub file_type: u8,
    #[serde(with = "BigArray")]
    name: [u8; NAME_BUF_LEN],
}

impl OnDiskRecord for DirEntry {
    const RECORD_SIZE: usize = DIR_ENTRY_SIZE;
}

impl DirEntry {
    pub fn new(name: &str, kind: FileKind, ino: u32) -> Result<Self> {
        validate_name(name)?;
        let mut buf = [0u8; NAME_BUF_LEN];
        buf[..name.len()].copy_from_slice(name.as_bytes());
        Ok(Self {
            ino,
            rec_len: DIR_ENTRY_SIZE as u16,
            file_type: kind.dirent_type(),
            name: buf,
        })
    }

    /// name bytes up to the first NUL
    pub fn name_bytes(&self) -> &[u8] {
        let end = self
            .name
            .iter()
            .position(|b| *b == 0)
            .unwrap_or(NAME_BUF_LEN);
        &self.name[..end]
    }

    pub fn name(&self) -> String {
        String::from_utf8_lossy(self.name_bytes()).into_owned()
    }

    pub fn name_eq(&self, name: &str) -> bool {
        self.name_bytes() == name.as_bytes()
    }

    pub fn is_tombstone(&self) -> bool {
        self.ino == 0
    }

    pub fn kind(&self) -> FileKind {
        FileKind::from_dirent_type(self.file_type)
    }
}

/// one row of a directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirListing {
    pub name: String,
    pub ino: u32,
    pub kind: FileKind,
    pub mode: u16,
    pub uid: u16,
    pub size: u32,
    pub mtime: u32,
}

/// a storable name: non-empty, at most 55 bytes, no `/` and no NUL
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty()
        || name.len() > NAME_MAX_LEN
        || name.bytes().any(|b| b == b'/' || b == 0)
    {
        return Err(FsError::InvalidName(name.to_string()));
    }
    Ok(())
}

pub fn is_dot_entry(name: &str) -> bool {
    name == "." || name == ".."
}

fn check_path(path: &str) -> Result<()> {
    if path.is_empty() || path.len() > MAX_PATH_LEN {
        return Err(FsError::InvalidName(path.to_string()));
    }
    Ok(())
}

/// split at the last separator
///
/// `"/a/b"` -> `(Some("/a"), "b")`, `"/b"` -> `(Some("/"), "b")`,
/// `"b"` -> `(None, "b")`
pub fn split_parent(path: &str) -> (Option<&str>, &str) {
    match path.rfind('/') {
        Some(0) => (Some("/"), &path[1..]),
        Some(pos) => (Some(&path[..pos]), &path[pos + 1..]),
        None => (None, path),
    }
}

/// This block is about directory entries
impl<D: BlockDevice> MiniExt2<D> {
    /// live entries of directory `dir`, oldest first
    pub(crate) fn dir_entries(&mut self, dir: u32) -> Result<Vec<DirEntry>> {
        let inode = self.read_inode(dir)?;
        if !inode.is_dir() {
            return Err(FsError::NotADirectory);
        }
        let count = inode.size / DIR_ENTRY_SIZE as u32;
        let mut entries = Vec::with_capacity(count as usize);
        let mut cached: Option<(u32, [u8; BLOCK_SIZE])> = None;
        for i in 0..count {
            let (logical, offset) = fs_size_calculator::dir_entry_position(i);
            if logical as usize >= DIRECT_POINTERS || inode.direct[logical as usize] == 0 {
                continue;
            }
            let block = match cached {
                Some((cached_logical, block)) if cached_logical == logical => block,
                _ => {
                    let block = self.read_block(inode.direct[logical as usize])?;
                    cached = Some((logical, block));
                    block
                }
            };
            let entry = DirEntry::decode_from(&block[offset..offset + DIR_ENTRY_SIZE])?;
            if !entry.is_tombstone() {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    /// first live entry named `name`
    pub(crate) fn dir_lookup(&mut self, dir: u32, name: &str) -> Result<u32> {
        self.dir_entries(dir)?
            .into_iter()
            .find(|entry| entry.name_eq(name))
            .map(|entry| entry.ino)
            .ok_or(FsError::NotFound)
    }

    /// append an entry after the last one, duplicates are not checked
    pub(crate) fn dir_add(&mut self, dir: u32, name: &str, kind: FileKind, child: u32) -> Result<()> {
        let entry = DirEntry::new(name, kind, child)?;
        let mut inode = self.read_inode(dir)?;
        if !inode.is_dir() {
            return Err(FsError::NotADirectory);
        }
        let (logical, offset) =
            fs_size_calculator::dir_entry_position(inode.size / DIR_ENTRY_SIZE as u32);
        let logical = logical as usize;
        if logical >= DIRECT_POINTERS {
            return Err(FsError::NoSpace);
        }

        let mut block = if inode.direct[logical] == 0 {
            let index = self.alloc_block()?;
            inode.direct[logical] = index;
            inode.blocks += 1;
            inode.update_changed_at();
            [0u8; BLOCK_SIZE]
        } else {
            self.read_block(inode.direct[logical])?
        };
        entry.encode_into(&mut block[offset..offset + DIR_ENTRY_SIZE])?;
        self.write_block(inode.direct[logical], &block)?;

        inode.size += DIR_ENTRY_SIZE as u32;
        inode.update_modified_at();
        debug!("added entry {name:?} -> {child} to directory {dir}");
        self.write_inode(dir, &inode)
    }

    /// turn the first entry named `name` into a hole, returns its inode
    pub(crate) fn dir_remove(&mut self, dir: u32, name: &str) -> Result<u32> {
        let mut inode = self.read_inode(dir)?;
        if !inode.is_dir() {
            return Err(FsError::NotADirectory);
        }
        let count = inode.size / DIR_ENTRY_SIZE as u32;
        for i in 0..count {
            let (logical, offset) = fs_size_calculator::dir_entry_position(i);
            if logical as usize >= DIRECT_POINTERS || inode.direct[logical as usize] == 0 {
                continue;
            }
            let index = inode.direct[logical as usize];
            let mut block = self.read_block(index)?;
            let entry = DirEntry::decode_from(&block[offset..offset + DIR_ENTRY_SIZE])?;
            if entry.is_tombstone() || !entry.name_eq(name) {
                continue;
            }
            block[offset..offset + DIR_ENTRY_SIZE].fill(0);
            self.write_block(index, &block)?;
            inode.update_modified_at();
            self.write_inode(dir, &inode)?;
            debug!("removed entry {name:?} from directory {dir}");
            return Ok(entry.ino);
        }
        Err(FsError::NotFound)
    }

    /// does the directory hold anything besides `.` and `..`
    pub(crate) fn dir_is_empty(&mut self, dir: u32) -> Result<bool> {
        Ok(self
            .dir_entries(dir)?
            .iter()
            .all(|entry| is_dot_entry(&entry.name())))
    }

    /// resolve `path` to an inode number
    ///
    /// Absolute paths start at the root, everything else at the current
    /// directory. `.` and `..` are plain entries.
    pub(crate) fn namei(&mut self, path: &str) -> Result<u32> {
        check_path(path)?;
        let mut current = if path.starts_with('/') {
            ROOT_INODE
        } else {
            self.cwd
        };
        let components: SmallVec<[&str; 8]> =
            path.split('/').filter(|c| !c.is_empty()).collect();
        for component in components {
            current = self.dir_lookup(current, component)?;
        }
        Ok(current)
    }

    /// parent directory inode and final name of `path`
    pub(crate) fn resolve_parent<'p>(&mut self, path: &'p str) -> Result<(u32, &'p str)> {
        check_path(path)?;
        let (parent, name) = split_parent(path);
        let parent = match parent {
            Some(parent) => self.namei(parent)?,
            None => self.cwd,
        };
        Ok((parent, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        fs::{Inode, MemDisk, DEFAULT_DIR_PERM, NAME_MAX_LEN},
        utils::init_test_environment::init_logger,
    };

    fn fresh_fs() -> MiniExt2<MemDisk> {
        init_logger();
        MiniExt2::format(MemDisk::new()).expect("format failed")
    }

    /// an empty directory inode, not linked anywhere
    fn bare_dir(fs: &mut MiniExt2<MemDisk>) -> u32 {
        let ino = fs.alloc_inode().unwrap();
        fs.write_inode(ino, &Inode::new(FileKind::Directory, DEFAULT_DIR_PERM, 0))
            .unwrap();
        ino
    }

    #[test]
    fn test_dir_entry_record() {
        let entry = DirEntry::new("notes.txt", FileKind::RegularFile, 9).unwrap();
        let mut slot = [0xFFu8; DIR_ENTRY_SIZE];
        entry.encode_into(&mut slot).unwrap();
        assert_eq!(&slot[0..4], &9u32.to_le_bytes());
        assert_eq!(&slot[4..6], &64u16.to_le_bytes());
        assert_eq!(slot[6], 1);
        assert_eq!(&slot[7..16], b"notes.txt");
        assert!(slot[16..].iter().all(|b| *b == 0));
        let decoded = DirEntry::decode_from(&slot).unwrap();
        assert_eq!(decoded.name(), "notes.txt");
        assert_eq!(decoded.kind(), FileKind::RegularFile);
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("a").is_ok());
        assert!(validate_name(&"x".repeat(NAME_MAX_LEN)).is_ok());
        assert!(matches!(
            validate_name(&"x".repeat(NAME_MAX_LEN + 1)),
            Err(FsError::InvalidName(_))
        ));
        assert!(validate_name("").is_err());
        assert!(validate_name("a/b").is_err());
        assert!(validate_name("a\0b").is_err());
    }

    #[test]
    fn test_split_parent() {
        assert_eq!(split_parent("/a/b"), (Some("/a"), "b"));
        assert_eq!(split_parent("/b"), (Some("/"), "b"));
        assert_eq!(split_parent("a/b"), (Some("a"), "b"));
        assert_eq!(split_parent("b"), (None, "b"));
        assert_eq!(split_parent("/a/"), (Some("/a"), ""));
    }

    #[test]
    fn test_root_has_dot_entries() {
        let mut fs = fresh_fs();
        let names: Vec<String> = fs
            .dir_entries(ROOT_INODE)
            .unwrap()
            .iter()
            .map(DirEntry::name)
            .collect();
        assert_eq!(names, vec![".", "..", ".users"]);
        assert_eq!(fs.dir_lookup(ROOT_INODE, ".").unwrap(), ROOT_INODE);
        assert_eq!(fs.dir_lookup(ROOT_INODE, "..").unwrap(), ROOT_INODE);
    }

    #[test]
    fn test_add_remove_add_again() {
        let mut fs = fresh_fs();
        let dir = bare_dir(&mut fs);
        fs.dir_add(dir, "x", FileKind::RegularFile, 40).unwrap();
        fs.dir_add(dir, "y", FileKind::RegularFile, 41).unwrap();
        assert_eq!(fs.dir_remove(dir, "x").unwrap(), 40);
        assert!(matches!(fs.dir_lookup(dir, "x"), Err(FsError::NotFound)));
        assert!(matches!(fs.dir_remove(dir, "x"), Err(FsError::NotFound)));

        fs.dir_add(dir, "x", FileKind::RegularFile, 42).unwrap();
        assert_eq!(fs.dir_lookup(dir, "x").unwrap(), 42);
        // the hole is not reused, size only grows
        assert_eq!(fs.read_inode(dir).unwrap().size, 3 * DIR_ENTRY_SIZE as u32);
        assert_eq!(fs.dir_entries(dir).unwrap().len(), 2);
    }

    #[test]
    fn test_lookup_finds_oldest_duplicate() {
        let mut fs = fresh_fs();
        let dir = bare_dir(&mut fs);
        fs.dir_add(dir, "dup", FileKind::RegularFile, 50).unwrap();
        fs.dir_add(dir, "dup", FileKind::RegularFile, 51).unwrap();
        assert_eq!(fs.dir_lookup(dir, "dup").unwrap(), 50);
        fs.dir_remove(dir, "dup").unwrap();
        assert_eq!(fs.dir_lookup(dir, "dup").unwrap(), 51);
    }

    #[test]
    fn test_directory_capacity() {
        let mut fs = fresh_fs();
        let dir = bare_dir(&mut fs);
        let slots = DIRECT_POINTERS * BLOCK_SIZE / DIR_ENTRY_SIZE;
        for i in 0..slots {
            fs.dir_add(dir, &format!("f{i}"), FileKind::RegularFile, 100)
                .unwrap();
        }
        let inode = fs.read_inode(dir).unwrap();
        assert_eq!(inode.blocks, DIRECT_POINTERS as u32);
        assert!(matches!(
            fs.dir_add(dir, "overflow", FileKind::RegularFile, 100),
            Err(FsError::NoSpace)
        ));
        assert_eq!(fs.dir_lookup(dir, "f79").unwrap(), 100);
    }

    #[test]
    fn test_lookup_in_regular_file() {
        let mut fs = fresh_fs();
        let ino = fs.alloc_inode().unwrap();
        fs.write_inode(ino, &Inode::new(FileKind::RegularFile, 0o644, 0))
            .unwrap();
        assert!(matches!(
            fs.dir_lookup(ino, "x"),
            Err(FsError::NotADirectory)
        ));
        assert!(matches!(
            fs.dir_add(ino, "x", FileKind::RegularFile, 3),
            Err(FsError::NotADirectory)
        ));
    }

    #[test]
    fn test_namei() {
        let mut fs = fresh_fs();
        let a = bare_dir(&mut fs);
        fs.dir_add(ROOT_INODE, "a", FileKind::Directory, a).unwrap();
        let b = bare_dir(&mut fs);
        fs.dir_add(a, "b", FileKind::Directory, b).unwrap();

        assert_eq!(fs.namei("/").unwrap(), ROOT_INODE);
        assert_eq!(fs.namei("/a/b").unwrap(), b);
        assert_eq!(fs.namei("//a///b/").unwrap(), b);
        assert_eq!(fs.namei("a/b").unwrap(), b);
        assert!(matches!(fs.namei("/a/c/d"), Err(FsError::NotFound)));
        assert!(matches!(fs.namei(""), Err(FsError::InvalidName(_))));
        assert!(matches!(
            fs.namei(&"/a".repeat(200)),
            Err(FsError::InvalidName(_))
        ));

        // relative paths start at the current directory
        fs.cwd = a;
        assert_eq!(fs.namei("b").unwrap(), b);
        assert_eq!(fs.resolve_parent("b").unwrap(), (a, "b"));
        assert_eq!(fs.resolve_parent("/a/b").unwrap(), (a, "b"));
        assert_eq!(fs.resolve_parent("/x").unwrap(), (ROOT_INODE, "x"));
    }

    #[test]
    fn test_namei_through_regular_file() {
        let mut fs = fresh_fs();
        let file = fs.alloc_inode().unwrap();
        fs.write_inode(file, &Inode::new(FileKind::RegularFile, 0o644, 0))
            .unwrap();
        fs.dir_add(ROOT_INODE, "a", FileKind::RegularFile, file)
            .unwrap();
        assert!(matches!(
            fs.namei("/a/b/c"),
            Err(FsError::NotADirectory)
        ));
    }

    #[test]
    fn test_dir_is_empty() {
        let mut fs = fresh_fs();
        let dir = bare_dir(&mut fs);
        fs.dir_add(dir, ".", FileKind::Directory, dir).unwrap();
        fs.dir_add(dir, "..", FileKind::Directory, ROOT_INODE).unwrap();
        assert!(fs.dir_is_empty(dir).unwrap());
        fs.dir_add(dir, "f", FileKind::RegularFile, 77).unwrap();
        assert!(!fs.dir_is_empty(dir).unwrap());
        fs.dir_remove(dir, "f").unwrap();
        assert!(fs.dir_is_empty(dir).unwrap());
    }
}
