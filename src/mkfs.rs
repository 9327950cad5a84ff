//! create our filesystem
use std::path::Path;

use byte_unit::Byte;
use log::info;

use crate::{
    fs::{ImageFile, MiniExt2, Result},
    utils::fs_size_calculator,
};

/// create a new filesystem in the image file at `image_file_path`
///
/// The file is created when missing and overwritten otherwise; it ends up
/// exactly [image_size](fs_size_calculator::image_size) bytes long.
/// The returned filesystem is mounted as the superuser.
pub fn mkfs<P>(image_file_path: P) -> Result<MiniExt2<ImageFile>>
where
    P: AsRef<Path>,
{
    info!(
        "formatting {:?} ({})",
        image_file_path.as_ref(),
        Byte::from_bytes(fs_size_calculator::image_size() as _).get_appropriate_unit(true)
    );
    let device = ImageFile::create(image_file_path)?;
    MiniExt2::format(device)
}
