//! the operations a caller of a mounted filesystem sees
use log::{debug, info};

use super::{
    block_device::BlockDevice,
    directory::{is_dot_entry, validate_name, DirListing},
    error::{FsError, Result},
    filekind::FileKind,
    fs_layout::MiniExt2,
    inode::Inode,
    open_file::{Fd, OpenMode},
    permission::{check_access, Access, Identity},
    BLOCK_SIZE, DEFAULT_DIR_PERM, DEFAULT_FILE_PERM, MODE_PERM_MASK, ROOT_INODE,
};

/// names a caller may create or delete
fn check_user_name(name: &str) -> Result<()> {
    validate_name(name)?;
    if is_dot_entry(name) {
        return Err(FsError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// This block is about the directory tree
impl<D: BlockDevice> MiniExt2<D> {
    /// inode number of the current directory
    pub fn cwd(&self) -> u32 {
        self.cwd
    }

    pub fn cd(&mut self, path: &str) -> Result<()> {
        info!("cd() called with path: {path:?}");
        let ino = self.namei(path)?;
        if !self.read_inode(ino)?.is_dir() {
            return Err(FsError::NotADirectory);
        }
        self.cwd = ino;
        Ok(())
    }

    /// make an empty directory owned by the current identity
    pub fn mkdir(&mut self, path: &str) -> Result<u32> {
        info!("mkdir() called with path: {path:?}");
        let (parent, name) = self.resolve_parent(path)?;
        check_user_name(name)?;
        match self.dir_lookup(parent, name) {
            Ok(_) => return Err(FsError::AlreadyExists),
            Err(FsError::NotFound) => {}
            Err(e) => return Err(e),
        }

        let ino = self.alloc_inode()?;
        let inode = Inode::new(FileKind::Directory, DEFAULT_DIR_PERM, self.identity.uid);
        self.write_inode(ino, &inode)?;
        self.dir_add(ino, ".", FileKind::Directory, ino)?;
        self.dir_add(ino, "..", FileKind::Directory, parent)?;
        self.dir_add(parent, name, FileKind::Directory, ino)?;

        // the new `..` links back to the parent
        let mut parent_inode = self.read_inode(parent)?;
        parent_inode.links += 1;
        self.write_inode(parent, &parent_inode)?;
        Ok(ino)
    }

    /// open for writing and close again, creating the file when missing
    pub fn create(&mut self, path: &str) -> Result<()> {
        info!("create() called with path: {path:?}");
        let fd = self.open(path, OpenMode::Write)?;
        self.close(fd)
    }

    /// remove a regular file or an empty directory
    ///
    /// Only the owner or the superuser may delete. Descriptors still open
    /// on the removed inode become invalid.
    pub fn delete(&mut self, path: &str) -> Result<()> {
        info!("delete() called with path: {path:?}");
        let (parent, name) = self.resolve_parent(path)?;
        check_user_name(name)?;
        let ino = self.dir_lookup(parent, name)?;
        let inode = self.read_inode(ino)?;
        if !self.identity.owns(&inode) {
            return Err(FsError::PermissionDenied);
        }
        if inode.is_dir() {
            if ino == ROOT_INODE {
                return Err(FsError::failed("the root directory can't be removed"));
            }
            if !self.dir_is_empty(ino)? {
                return Err(FsError::NotEmpty);
            }
        }

        self.dir_remove(parent, name)?;
        if inode.is_dir() {
            let mut parent_inode = self.read_inode(parent)?;
            parent_inode.links = parent_inode.links.saturating_sub(1);
            self.write_inode(parent, &parent_inode)?;
            if self.cwd == ino {
                self.cwd = ROOT_INODE;
            }
        }
        self.truncate_inode(ino)?;
        self.free_inode(ino)?;
        let dropped = self.open_files.invalidate(ino);
        if dropped > 0 {
            debug!("{dropped} descriptors on inode {ino} dropped");
        }
        Ok(())
    }

    /// replace the permission bits, owner or superuser only
    pub fn chmod(&mut self, path: &str, permissions: u16) -> Result<()> {
        info!("chmod() called with path: {path:?}, mode: {permissions:o}");
        let ino = self.namei(path)?;
        let mut inode = self.read_inode(ino)?;
        if !self.identity.owns(&inode) {
            return Err(FsError::PermissionDenied);
        }
        inode.set_permissions(permissions & MODE_PERM_MASK);
        self.write_inode(ino, &inode)
    }

    /// live entries of a directory with the metadata of each child
    pub fn list_dir(&mut self, path: &str) -> Result<Vec<DirListing>> {
        info!("list_dir() called with path: {path:?}");
        let ino = self.namei(path)?;
        let entries = self.dir_entries(ino)?;
        let mut listing = Vec::with_capacity(entries.len());
        for entry in entries {
            let child = self.read_inode(entry.ino)?;
            listing.push(DirListing {
                name: entry.name(),
                ino: entry.ino,
                kind: entry.kind(),
                mode: child.mode,
                uid: child.uid,
                size: child.size,
                mtime: child.mtime,
            });
        }
        Ok(listing)
    }

    /// inode number and record behind `path`
    pub fn stat(&mut self, path: &str) -> Result<(u32, Inode)> {
        info!("stat() called with path: {path:?}");
        let ino = self.namei(path)?;
        Ok((ino, self.read_inode(ino)?))
    }

    /// drop the whole content of a regular file
    pub fn truncate(&mut self, path: &str) -> Result<()> {
        info!("truncate() called with path: {path:?}");
        let ino = self.namei(path)?;
        let inode = self.read_inode(ino)?;
        if inode.is_dir() {
            return Err(FsError::IsADirectory);
        }
        check_access(&self.identity, &inode, Access::Write)?;
        self.truncate_inode(ino)
    }
}

/// This block is about descriptors
impl<D: BlockDevice> MiniExt2<D> {
    /// open a regular file
    ///
    /// A writable open of a missing file creates it, owned by the current
    /// identity with `rw-r--r--`.
    pub fn open(&mut self, path: &str, mode: impl Into<OpenMode>) -> Result<Fd> {
        let mode = mode.into();
        info!("open() called with path: {path:?}, mode: {mode}");
        let ino = match self.namei(path) {
            Ok(ino) => {
                let inode = self.read_inode(ino)?;
                if inode.is_dir() {
                    return Err(FsError::IsADirectory);
                }
                let access = if mode.is_writable() {
                    Access::Write
                } else {
                    Access::Read
                };
                check_access(&self.identity, &inode, access)?;
                ino
            }
            Err(FsError::NotFound) if mode.is_writable() => self.create_file(path)?,
            Err(e) => return Err(e),
        };
        self.open_files.insert(ino, mode)
    }

    fn create_file(&mut self, path: &str) -> Result<u32> {
        let (parent, name) = self.resolve_parent(path)?;
        check_user_name(name)?;
        let ino = self.alloc_inode()?;
        let inode = Inode::new(FileKind::RegularFile, DEFAULT_FILE_PERM, self.identity.uid);
        self.write_inode(ino, &inode)?;
        self.dir_add(parent, name, FileKind::RegularFile, ino)?;
        debug!("created {path:?} as inode {ino}");
        Ok(ino)
    }

    /// read up to `len` bytes at the cursor
    pub fn read(&mut self, fd: Fd, len: usize) -> Result<Vec<u8>> {
        let offset = self.tell(fd)?;
        let remaining = self.fstat(fd)?.size.saturating_sub(offset) as usize;
        let mut buf = vec![0u8; len.min(remaining)];
        let read = self.read_into(fd, &mut buf)?;
        buf.truncate(read);
        Ok(buf)
    }

    /// fill `buf` from the cursor, returns 0 at or past the end of the file
    pub fn read_into(&mut self, fd: Fd, buf: &mut [u8]) -> Result<usize> {
        info!("read() called with fd: {fd}, size: {}", buf.len());
        let file = *self.open_files.get(fd)?;
        let mut inode = self.read_inode(file.ino)?;
        check_access(&self.identity, &inode, Access::Read)?;
        if file.offset >= inode.size {
            return Ok(0);
        }
        let len = buf.len().min((inode.size - file.offset) as usize);

        let mut pos = file.offset;
        let mut done = 0;
        while done < len {
            let logical = pos / BLOCK_SIZE as u32;
            let within = pos as usize % BLOCK_SIZE;
            let block = self.lookup_block(&inode, logical)?;
            if block == 0 {
                return Err(FsError::failed(format!(
                    "logical block {logical} of inode {} is not mapped",
                    file.ino
                )));
            }
            let data = self.read_block(block)?;
            let chunk = (BLOCK_SIZE - within).min(len - done);
            buf[done..done + chunk].copy_from_slice(&data[within..within + chunk]);
            done += chunk;
            pos += chunk as u32;
        }

        self.open_files.get_mut(fd)?.offset = pos;
        inode.update_accessed_at();
        self.write_inode(file.ino, &inode)?;
        Ok(done)
    }

    /// write `data` at the cursor, growing the file as needed
    ///
    /// Blocks are flushed one by one. When space runs out midway the bytes
    /// already written stay and the file size covers them.
    pub fn write(&mut self, fd: Fd, data: &[u8]) -> Result<usize> {
        info!("write() called with fd: {fd}, size: {}", data.len());
        let file = *self.open_files.get(fd)?;
        if !file.writable {
            return Err(FsError::PermissionDenied);
        }
        let mut inode = self.read_inode(file.ino)?;
        check_access(&self.identity, &inode, Access::Write)?;

        let mut pos = file.offset;
        let result = self.write_blocks(&mut inode, &mut pos, data);

        if pos > inode.size {
            inode.size = pos;
        }
        inode.update_modified_at();
        self.write_inode(file.ino, &inode)?;
        self.open_files.get_mut(fd)?.offset = pos;
        result?;
        Ok((pos - file.offset) as usize)
    }

    fn write_blocks(&mut self, inode: &mut Inode, pos: &mut u32, data: &[u8]) -> Result<()> {
        let mut done = 0;
        while done < data.len() {
            let logical = *pos / BLOCK_SIZE as u32;
            let within = *pos as usize % BLOCK_SIZE;
            let block = self.map_block_for_write(inode, logical)?;
            let mut content = self.read_block(block)?;
            let chunk = (BLOCK_SIZE - within).min(data.len() - done);
            content[within..within + chunk].copy_from_slice(&data[done..done + chunk]);
            self.write_block(block, &content)?;
            done += chunk;
            *pos += chunk as u32;
        }
        Ok(())
    }

    /// move the cursor; negative offsets land on 0, offsets past the end are kept
    pub fn seek(&mut self, fd: Fd, offset: i64) -> Result<u32> {
        info!("seek() called with fd: {fd}, offset: {offset}");
        let file = self.open_files.get_mut(fd)?;
        file.offset = offset.clamp(0, u32::MAX as i64) as u32;
        Ok(file.offset)
    }

    /// the cursor of `fd`
    pub fn tell(&self, fd: Fd) -> Result<u32> {
        Ok(self.open_files.get(fd)?.offset)
    }

    /// the inode behind `fd`
    pub fn fstat(&mut self, fd: Fd) -> Result<Inode> {
        let ino = self.open_files.get(fd)?.ino;
        self.read_inode(ino)
    }

    pub fn close(&mut self, fd: Fd) -> Result<()> {
        info!("close() called with fd: {fd}");
        self.open_files.remove(fd).map(|_| ())
    }
}

/// This block is about the acting identity
impl<D: BlockDevice> MiniExt2<D> {
    /// run `op` as `identity`, then switch back
    pub(crate) fn with_identity<T, F>(&mut self, identity: Identity, op: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        let saved = std::mem::replace(&mut self.identity, identity);
        let result = op(self);
        self.identity = saved;
        result
    }
}
