//! attach to an existing image file
use std::path::Path;

use crate::fs::{ImageFile, MiniExt2, Result};

/// open the image at `image_path` and mount the filesystem inside it
///
/// The identity of the last login is restored.
pub fn mount<P>(image_path: P) -> Result<MiniExt2<ImageFile>>
where
    P: AsRef<Path>,
{
    let device = ImageFile::open(image_path)?;
    MiniExt2::mount(device)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        fs::FsError,
        mkfs::mkfs,
        utils::init_test_environment::{init_logger, temp_image_path},
    };

    #[test]
    fn test_data_survives_remount() {
        init_logger();
        let tmp_file = temp_image_path("mount");
        let mut fs = mkfs(&tmp_file).unwrap();
        fs.mkdir("/docs").unwrap();
        let fd = fs.open("/docs/readme", "w").unwrap();
        fs.write(fd, b"persisted").unwrap();
        fs.close(fd).unwrap();
        fs.add_account("bob", "pw").unwrap();
        fs.login("bob", "pw").unwrap();
        fs.unmount().unwrap();

        let mut fs = mount(&tmp_file).unwrap();
        assert_eq!(fs.whoami().name, "bob");
        let fd = fs.open("/docs/readme", "r").unwrap();
        assert_eq!(fs.read(fd, 100).unwrap(), b"persisted");
        assert!(fs.census().unwrap().is_consistent());

        drop(fs);
        std::fs::remove_file(&tmp_file).unwrap()
    }

    #[test]
    fn test_mount_missing_image() {
        init_logger();
        let tmp_file = temp_image_path("mount_missing");
        assert!(matches!(mount(&tmp_file), Err(FsError::Io(_))));
    }
}
