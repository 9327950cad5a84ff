use std::io;

use thiserror::Error;

/// every failure the filesystem reports to its caller
#[derive(Debug, Error)]
pub enum FsError {
    #[error("i/o failure: {0}")]
    Io(#[from] io::Error),
    #[error("{0}")]
    Failed(String),
    #[error("on-disk record codec failure: {0}")]
    Codec(String),
    #[error("no such file or directory")]
    NotFound,
    #[error("file exists")]
    AlreadyExists,
    #[error("no space left on device")]
    NoSpace,
    #[error("not a directory")]
    NotADirectory,
    #[error("is a directory")]
    IsADirectory,
    #[error("permission denied")]
    PermissionDenied,
    #[error("bad file descriptor")]
    BadDescriptor,
    #[error("invalid name: {0:?}")]
    InvalidName(String),
    #[error("directory not empty")]
    NotEmpty,
}

pub type Result<T> = std::result::Result<T, FsError>;

impl FsError {
    pub fn failed(msg: impl Into<String>) -> Self {
        FsError::Failed(msg.into())
    }

    /// the closest `errno` value
    pub fn errno(&self) -> libc::c_int {
        match self {
            FsError::Io(e) => e.raw_os_error().unwrap_or(libc::EIO),
            FsError::Failed(_) | FsError::Codec(_) => libc::EIO,
            FsError::NotFound => libc::ENOENT,
            FsError::AlreadyExists => libc::EEXIST,
            FsError::NoSpace => libc::ENOSPC,
            FsError::NotADirectory => libc::ENOTDIR,
            FsError::IsADirectory => libc::EISDIR,
            FsError::PermissionDenied => libc::EACCES,
            FsError::BadDescriptor => libc::EBADF,
            FsError::InvalidName(_) => libc::EINVAL,
            FsError::NotEmpty => libc::ENOTEMPTY,
        }
    }
}

impl From<bincode::error::EncodeError> for FsError {
    fn from(e: bincode::error::EncodeError) -> Self {
        FsError::Codec(e.to_string())
    }
}

impl From<bincode::error::DecodeError> for FsError {
    fn from(e: bincode::error::DecodeError) -> Self {
        FsError::Codec(e.to_string())
    }
}

impl From<FsError> for io::Error {
    fn from(e: FsError) -> Self {
        let kind = match &e {
            FsError::Io(inner) => inner.kind(),
            FsError::NotFound => io::ErrorKind::NotFound,
            FsError::AlreadyExists => io::ErrorKind::AlreadyExists,
            FsError::PermissionDenied => io::ErrorKind::PermissionDenied,
            FsError::InvalidName(_) => io::ErrorKind::InvalidInput,
            _ => io::ErrorKind::Other,
        };
        match e {
            FsError::Io(inner) => inner,
            other => io::Error::new(kind, other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errno_mapping() {
        assert_eq!(FsError::NotFound.errno(), libc::ENOENT);
        assert_eq!(FsError::NoSpace.errno(), libc::ENOSPC);
        assert_eq!(FsError::BadDescriptor.errno(), libc::EBADF);
        assert_eq!(FsError::failed("boom").errno(), libc::EIO);
    }

    #[test]
    fn test_into_io_error_keeps_kind() {
        let e: io::Error = FsError::PermissionDenied.into();
        assert_eq!(e.kind(), io::ErrorKind::PermissionDenied);
        let e: io::Error = FsError::NotFound.into();
        assert_eq!(e.kind(), io::ErrorKind::NotFound);
    }
}
