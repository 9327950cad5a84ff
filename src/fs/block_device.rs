//! raw block access over the backing store
use std::{
    fs::{File, OpenOptions},
    io::{self, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use log::debug;

use super::{error::Result, Block, BLOCK_SIZE, TOTAL_BLOCKS};

/// something that stores `TOTAL_BLOCKS` blocks of `BLOCK_SIZE` bytes
///
/// Every call goes straight to the storage, nothing is cached.
pub trait BlockDevice {
    fn read_block(&mut self, index: u32, buf: &mut Block) -> Result<()>;
    fn write_block(&mut self, index: u32, buf: &Block) -> Result<()>;
}

fn check_index(index: u32) -> io::Result<u64> {
    if index >= TOTAL_BLOCKS {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("block {index} is out of range 0..{TOTAL_BLOCKS}"),
        ));
    }
    Ok(index as u64 * BLOCK_SIZE as u64)
}

/// the image file, something like `Block Device`
#[derive(Debug)]
pub struct ImageFile {
    file: File,
    path: PathBuf,
}

impl ImageFile {
    /// open an existing image for read and write
    pub fn open<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path.as_ref())?;
        Ok(Self {
            file,
            path: path.as_ref().to_path_buf(),
        })
    }

    /// create (or truncate) an image of exactly `TOTAL_BLOCKS` zeroed blocks
    pub fn create<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path.as_ref())?;
        file.set_len(TOTAL_BLOCKS as u64 * BLOCK_SIZE as u64)?;
        debug!("created image {:?}", path.as_ref());
        Ok(Self {
            file,
            path: path.as_ref().to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BlockDevice for ImageFile {
    fn read_block(&mut self, index: u32, buf: &mut Block) -> Result<()> {
        let offset = check_index(index)?;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(buf)?;
        Ok(())
    }

    fn write_block(&mut self, index: u32, buf: &Block) -> Result<()> {
        let offset = check_index(index)?;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(buf)?;
        Ok(())
    }
}

/// a RAM-backed device, handy for tests and throwaway filesystems
#[derive(Debug, Clone)]
pub struct MemDisk {
    data: Vec<u8>,
}

impl MemDisk {
    pub fn new() -> Self {
        Self {
            data: vec![0u8; TOTAL_BLOCKS as usize * BLOCK_SIZE],
        }
    }
}

impl Default for MemDisk {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockDevice for MemDisk {
    fn read_block(&mut self, index: u32, buf: &mut Block) -> Result<()> {
        let start = check_index(index)? as usize;
        buf.copy_from_slice(&self.data[start..start + BLOCK_SIZE]);
        Ok(())
    }

    fn write_block(&mut self, index: u32, buf: &Block) -> Result<()> {
        let start = check_index(index)? as usize;
        self.data[start..start + BLOCK_SIZE].copy_from_slice(buf);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{fs::FsError, utils::init_test_environment::temp_image_path};

    #[test]
    fn test_out_of_range_block_is_io_fault() {
        let mut disk = MemDisk::new();
        let mut buf = [0u8; BLOCK_SIZE];
        assert!(matches!(
            disk.read_block(TOTAL_BLOCKS, &mut buf),
            Err(FsError::Io(_))
        ));
        assert!(matches!(
            disk.write_block(TOTAL_BLOCKS + 7, &buf),
            Err(FsError::Io(_))
        ));
        assert!(disk.read_block(TOTAL_BLOCKS - 1, &mut buf).is_ok());
    }

    #[test]
    fn test_image_file_blocks_land_at_their_offsets() {
        let path = temp_image_path("block_device");
        {
            let mut image = ImageFile::create(&path).expect("create image failed");
            let mut block = [0u8; BLOCK_SIZE];
            block[0] = 0xAB;
            block[BLOCK_SIZE - 1] = 0xCD;
            image.write_block(3, &block).unwrap();
        }
        let raw = std::fs::read(&path).unwrap();
        assert_eq!(raw.len(), TOTAL_BLOCKS as usize * BLOCK_SIZE);
        assert_eq!(raw[3 * BLOCK_SIZE], 0xAB);
        assert_eq!(raw[4 * BLOCK_SIZE - 1], 0xCD);

        let mut image = ImageFile::open(&path).unwrap();
        let mut block = [0u8; BLOCK_SIZE];
        image.read_block(3, &mut block).unwrap();
        assert_eq!(block[0], 0xAB);
        std::fs::remove_file(&path).expect("test is passed,but remove temp file failed!")
    }
}
