//! owner/other permission checks; there is no group tier
use std::fmt;

use super::{
    error::{FsError, Result},
    inode::Inode,
};

/// the identity operations run as
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: u16,
    pub name: String,
}

impl Identity {
    pub fn new(uid: u16, name: impl Into<String>) -> Self {
        Self {
            uid,
            name: name.into(),
        }
    }

    /// the superuser, UID 0
    pub fn root() -> Self {
        Self::new(0, "root")
    }

    pub fn is_superuser(&self) -> bool {
        self.uid == 0
    }

    /// may `self` change the metadata of, or delete, `inode`
    pub fn owns(&self, inode: &Inode) -> bool {
        self.is_superuser() || self.uid == inode.uid
    }
}

impl Default for Identity {
    fn default() -> Self {
        Self::root()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (uid {})", self.name, self.uid)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

impl Access {
    /// the bit in an "other" permission triple
    const fn other_bit(self) -> u16 {
        match self {
            Access::Read => 0o4,
            Access::Write => 0o2,
        }
    }
}

/// UID 0 always passes, the owner is checked against the owner bits,
/// everybody else against the other bits
pub fn check_access(identity: &Identity, inode: &Inode, access: Access) -> Result<()> {
    if identity.is_superuser() {
        return Ok(());
    }
    let bit = if identity.uid == inode.uid {
        access.other_bit() << 6
    } else {
        access.other_bit()
    };
    if inode.mode & bit != 0 {
        Ok(())
    } else {
        Err(FsError::PermissionDenied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::FileKind;

    #[test]
    fn test_superuser_always_passes() {
        let inode = Inode::new(FileKind::RegularFile, 0o000, 5);
        assert!(check_access(&Identity::root(), &inode, Access::Read).is_ok());
        assert!(check_access(&Identity::root(), &inode, Access::Write).is_ok());
    }

    #[test]
    fn test_owner_and_other_bits() {
        let inode = Inode::new(FileKind::RegularFile, 0o604, 1);
        let owner = Identity::new(1, "bob");
        let other = Identity::new(2, "eve");

        assert!(check_access(&owner, &inode, Access::Read).is_ok());
        assert!(check_access(&owner, &inode, Access::Write).is_ok());
        assert!(check_access(&other, &inode, Access::Read).is_ok());
        assert!(matches!(
            check_access(&other, &inode, Access::Write),
            Err(FsError::PermissionDenied)
        ));
    }

    #[test]
    fn test_group_bits_are_ignored() {
        // only the group triple grants anything
        let inode = Inode::new(FileKind::RegularFile, 0o060, 1);
        assert!(check_access(&Identity::new(1, "bob"), &inode, Access::Read).is_err());
        assert!(check_access(&Identity::new(2, "eve"), &inode, Access::Write).is_err());
    }

    #[test]
    fn test_ownership() {
        let inode = Inode::new(FileKind::RegularFile, 0o644, 1);
        assert!(Identity::root().owns(&inode));
        assert!(Identity::new(1, "bob").owns(&inode));
        assert!(!Identity::new(2, "eve").owns(&inode));
    }
}
