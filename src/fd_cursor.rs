//! a cursor over an open descriptor of a mounted filesystem, so host I/O
//! such as [std::io::copy] can stream into and out of it
use std::io::{self, ErrorKind, IoSlice, IoSliceMut, Read, Seek, SeekFrom, Write};

use crate::fs::{BlockDevice, Fd, MiniExt2};

/// cursor struct
#[derive(Debug)]
pub struct FdCursor<'a, D: BlockDevice> {
    fs: &'a mut MiniExt2<D>,
    fd: Fd,
}

impl<'a, D: BlockDevice> FdCursor<'a, D> {
    /// `fd` must already be open, it stays open when the cursor is dropped
    pub fn new(fs: &'a mut MiniExt2<D>, fd: Fd) -> Self {
        Self { fs, fd }
    }

    /// the current position of the cursor
    pub fn position(&self) -> io::Result<u64> {
        Ok(self.fs.tell(self.fd)? as u64)
    }
}

impl<D: BlockDevice> Seek for FdCursor<'_, D> {
    fn seek(&mut self, style: SeekFrom) -> io::Result<u64> {
        let (base_pos, offset) = match style {
            SeekFrom::Start(n) => (n, 0),
            SeekFrom::End(n) => (self.fs.fstat(self.fd)?.size as u64, n),
            SeekFrom::Current(n) => (self.fs.tell(self.fd)? as u64, n),
        };
        match base_pos.checked_add_signed(offset) {
            Some(n) if n <= u32::MAX as u64 => Ok(self.fs.seek(self.fd, n as i64)? as u64),
            _ => Err(ErrorKind::InvalidInput.into()),
        }
    }

    fn stream_position(&mut self) -> io::Result<u64> {
        self.position()
    }
}

impl<D: BlockDevice> Read for FdCursor<'_, D> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.fs.read_into(self.fd, buf)?)
    }

    fn read_vectored(&mut self, bufs: &mut [IoSliceMut<'_>]) -> io::Result<usize> {
        let mut nread = 0;
        for buf in bufs {
            let n = self.read(buf)?;
            nread += n;
            if n < buf.len() {
                break;
            }
        }
        Ok(nread)
    }
}

impl<D: BlockDevice> Write for FdCursor<'_, D> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.fs.write(self.fd, buf)?)
    }

    fn write_vectored(&mut self, bufs: &[IoSlice<'_>]) -> io::Result<usize> {
        let mut nwritten = 0;
        for buf in bufs {
            let n = self.write(buf)?;
            nwritten += n;
            if n < buf.len() {
                break;
            }
        }
        Ok(nwritten)
    }

    /// every write already reached the device
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
