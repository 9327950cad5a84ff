use bincode::config;
use serde::{de::DeserializeOwned, Serialize};

use crate::fs::{FsError, Result};

/// Trait for records stored in a fixed-size slot of a block
/// # Note
/// Records are encoded with the bincode legacy configuration
/// (fixed-width integers, little endian) and zero padded to [RECORD_SIZE](OnDiskRecord::RECORD_SIZE).
pub trait OnDiskRecord: Serialize + DeserializeOwned {
    /// size of the slot this record occupies on disk
    const RECORD_SIZE: usize;

    /// serialize into the beginning of `slot`, zeroing the rest of the record
    fn encode_into(&self, slot: &mut [u8]) -> Result<()> {
        let bytes = bincode::serde::encode_to_vec(self, config::legacy())?;
        if bytes.len() > Self::RECORD_SIZE || slot.len() < Self::RECORD_SIZE {
            return Err(FsError::Codec(format!(
                "record of {} bytes does not fit a {} byte slot",
                bytes.len(),
                Self::RECORD_SIZE
            )));
        }
        slot[..Self::RECORD_SIZE].fill(0);
        slot[..bytes.len()].copy_from_slice(&bytes);
        Ok(())
    }

    /// deserialize from the beginning of `slot`
    fn decode_from(slot: &[u8]) -> Result<Self> {
        if slot.len() < Self::RECORD_SIZE {
            return Err(FsError::Codec(format!(
                "slot of {} bytes is shorter than a record",
                slot.len()
            )));
        }
        let (record, _read) =
            bincode::serde::decode_from_slice(&slot[..Self::RECORD_SIZE], config::legacy())?;
        Ok(record)
    }
}
