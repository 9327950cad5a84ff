//! user accounts and the persisted session
//!
//! Accounts live in `/.users`, one `name:password:uid` line each.
//! The identity of the last login lives in `/.session`.
//! Both files belong to the superuser with mode `0o600`; the operations
//! here reach them as the superuser and only through the file API.
use std::{fmt, str::FromStr};

use log::{debug, info, warn};

use crate::fs::{BlockDevice, FsError, Identity, MiniExt2, OpenMode, Result};

pub const USERS_PATH: &str = "/.users";
pub const SESSION_PATH: &str = "/.session";
const ACCOUNT_FILE_PERM: u16 = 0o600;

/// one line of `/.users`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRecord {
    pub name: String,
    pub password: String,
    pub uid: u16,
}

impl AccountRecord {
    pub fn new(name: impl Into<String>, password: impl Into<String>, uid: u16) -> Self {
        Self {
            name: name.into(),
            password: password.into(),
            uid,
        }
    }

    /// the account written when `/.users` is missing
    pub fn root() -> Self {
        Self::new("root", "root", 0)
    }
}

impl FromStr for AccountRecord {
    type Err = FsError;

    fn from_str(line: &str) -> Result<Self> {
        let mut fields = line.splitn(3, ':');
        match (fields.next(), fields.next(), fields.next()) {
            (Some(name), Some(password), Some(uid)) if !name.is_empty() => {
                let uid = uid
                    .trim()
                    .parse()
                    .map_err(|_| FsError::failed(format!("bad uid in account line {line:?}")))?;
                Ok(Self::new(name, password, uid))
            }
            _ => Err(FsError::failed(format!("malformed account line {line:?}"))),
        }
    }
}

impl fmt::Display for AccountRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.name, self.password, self.uid)
    }
}

/// names and passwords end up between `:` separators on one line
fn check_field(value: &str) -> Result<()> {
    if value.is_empty() || value.contains([':', '\n']) {
        return Err(FsError::InvalidName(value.to_string()));
    }
    Ok(())
}

/// well-formed records of an account file, malformed lines are skipped
fn parse_accounts(content: &str) -> Vec<AccountRecord> {
    content
        .lines()
        .filter(|line| !line.is_empty())
        .filter_map(|line| match line.parse() {
            Ok(record) => Some(record),
            Err(e) => {
                debug!("skipping account line: {e}");
                None
            }
        })
        .collect()
}

/// `uid:N` and `user:NAME` lines, in any order
fn parse_session(content: &str) -> Option<Identity> {
    let mut uid = None;
    let mut name = None;
    for line in content.lines() {
        if let Some(value) = line.strip_prefix("uid:") {
            uid = value.trim().parse::<u16>().ok();
        } else if let Some(value) = line.strip_prefix("user:") {
            name = Some(value.to_string());
        }
    }
    match (uid, name) {
        (Some(uid), Some(name)) if !name.is_empty() => Some(Identity::new(uid, name)),
        _ => None,
    }
}

/// This block is about file helpers, callers run them as the superuser
impl<D: BlockDevice> MiniExt2<D> {
    fn read_whole_file(&mut self, path: &str) -> Result<String> {
        let fd = self.open(path, OpenMode::Read)?;
        let content = self
            .fstat(fd)
            .and_then(|inode| self.read(fd, inode.size as usize));
        self.close(fd)?;
        Ok(String::from_utf8_lossy(&content?).into_owned())
    }

    /// replace the whole content of `path`, creating it when missing
    fn replace_file(&mut self, path: &str, content: &str) -> Result<()> {
        let fd = self.open(path, OpenMode::Write)?;
        let written = self
            .truncate(path)
            .and_then(|_| self.write(fd, content.as_bytes()));
        self.close(fd)?;
        written?;
        self.chmod(path, ACCOUNT_FILE_PERM)
    }

    fn append_line(&mut self, path: &str, line: &str) -> Result<()> {
        let fd = self.open(path, OpenMode::Write)?;
        let written = self.fstat(fd).and_then(|inode| {
            self.seek(fd, inode.size as i64)?;
            self.write(fd, format!("{line}\n").as_bytes())
        });
        self.close(fd)?;
        written.map(|_| ())
    }

    fn read_accounts(&mut self) -> Result<Vec<AccountRecord>> {
        Ok(parse_accounts(&self.read_whole_file(USERS_PATH)?))
    }

    fn save_session(&mut self, identity: &Identity) -> Result<()> {
        let content = format!("uid:{}\nuser:{}\n", identity.uid, identity.name);
        self.replace_file(SESSION_PATH, &content)
    }
}

/// This block is about accounts
impl<D: BlockDevice> MiniExt2<D> {
    /// create `/.users` holding only the superuser when it is missing
    pub(crate) fn bootstrap_accounts(&mut self) -> Result<()> {
        self.with_identity(Identity::root(), |fs| match fs.stat(USERS_PATH) {
            Ok(_) => Ok(()),
            Err(FsError::NotFound) => {
                info!("creating the account file {USERS_PATH}");
                fs.replace_file(USERS_PATH, &format!("{}\n", AccountRecord::root()))
            }
            Err(e) => Err(e),
        })
    }

    /// restore the identity saved by the last login
    ///
    /// A missing or unreadable session leaves the superuser in place.
    pub(crate) fn load_session(&mut self) {
        let content = self.with_identity(Identity::root(), |fs| fs.read_whole_file(SESSION_PATH));
        match content {
            Ok(content) => match parse_session(&content) {
                Some(identity) => {
                    debug!("restored session of {identity}");
                    self.identity = identity;
                }
                None => warn!("{SESSION_PATH} is unreadable, staying {}", self.identity),
            },
            Err(FsError::NotFound) => debug!("no saved session"),
            Err(e) => warn!("failed to read {SESSION_PATH}: {e}"),
        }
    }

    /// switch to the account matching `name` and `password`
    pub fn login(&mut self, name: &str, password: &str) -> Result<()> {
        info!("login() called with name: {name:?}");
        let accounts = self.with_identity(Identity::root(), |fs| fs.read_accounts())?;
        let account = accounts
            .into_iter()
            .find(|account| account.name == name && account.password == password)
            .ok_or(FsError::PermissionDenied)?;
        let identity = Identity::new(account.uid, account.name);
        self.with_identity(Identity::root(), |fs| fs.save_session(&identity))?;
        info!("logged in as {identity}");
        self.identity = identity;
        Ok(())
    }

    /// register a new account, superuser only
    ///
    /// The new UID is one above the largest UID in use.
    pub fn add_account(&mut self, name: &str, password: &str) -> Result<u16> {
        info!("add_account() called with name: {name:?}");
        if !self.identity.is_superuser() {
            return Err(FsError::PermissionDenied);
        }
        check_field(name)?;
        check_field(password)?;
        self.with_identity(Identity::root(), |fs| {
            let accounts = fs.read_accounts()?;
            if accounts.iter().any(|account| account.name == name) {
                return Err(FsError::AlreadyExists);
            }
            let uid = accounts
                .iter()
                .map(|account| account.uid)
                .max()
                .unwrap_or(0)
                .checked_add(1)
                .ok_or_else(|| FsError::failed("no UID left"))?;
            fs.append_line(USERS_PATH, &AccountRecord::new(name, password, uid).to_string())?;
            Ok(uid)
        })
    }

    /// set a new password for `name`, allowed to the superuser and to the account itself
    pub fn change_password(&mut self, name: &str, password: &str) -> Result<()> {
        info!("change_password() called with name: {name:?}");
        if !(self.identity.is_superuser() || self.identity.name == name) {
            return Err(FsError::PermissionDenied);
        }
        check_field(password)?;
        self.with_identity(Identity::root(), |fs| {
            let content = fs.read_whole_file(USERS_PATH)?;
            let mut found = false;
            let mut rewritten = String::with_capacity(content.len());
            for line in content.lines().filter(|line| !line.is_empty()) {
                match line.parse::<AccountRecord>() {
                    Ok(mut record) if record.name == name => {
                        record.password = password.to_string();
                        rewritten.push_str(&record.to_string());
                        found = true;
                    }
                    _ => rewritten.push_str(line),
                }
                rewritten.push('\n');
            }
            if !found {
                return Err(FsError::NotFound);
            }
            fs.replace_file(USERS_PATH, &rewritten)
        })
    }

    /// the identity operations currently run as
    pub fn whoami(&self) -> &Identity {
        &self.identity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{fs::MemDisk, utils::init_test_environment::init_logger};

    fn fresh_fs() -> MiniExt2<MemDisk> {
        init_logger();
        MiniExt2::format(MemDisk::new()).expect("format failed")
    }

    fn remount(fs: MiniExt2<MemDisk>) -> MiniExt2<MemDisk> {
        MiniExt2::mount(fs.unmount().unwrap()).expect("mount failed")
    }

    #[test]
    fn test_account_record_parse() {
        let record: AccountRecord = "bob:pw:7".parse().unwrap();
        assert_eq!(record, AccountRecord::new("bob", "pw", 7));
        assert_eq!(record.to_string(), "bob:pw:7");
        assert!("bob:pw".parse::<AccountRecord>().is_err());
        assert!(":pw:1".parse::<AccountRecord>().is_err());
        assert!("bob:pw:x".parse::<AccountRecord>().is_err());
    }

    #[test]
    fn test_parse_session() {
        assert_eq!(
            parse_session("uid:3\nuser:carol\n"),
            Some(Identity::new(3, "carol"))
        );
        assert_eq!(parse_session("user:carol\nuid:3"), Some(Identity::new(3, "carol")));
        assert_eq!(parse_session("uid:3\n"), None);
        assert_eq!(parse_session("uid:abc\nuser:carol\n"), None);
        assert_eq!(parse_session(""), None);
    }

    #[test]
    fn test_bootstrap_writes_root_account() {
        let mut fs = fresh_fs();
        let (_, inode) = fs.stat(USERS_PATH).unwrap();
        assert_eq!(inode.permissions(), ACCOUNT_FILE_PERM);
        assert_eq!(inode.uid, 0);
        assert_eq!(fs.read_whole_file(USERS_PATH).unwrap(), "root:root:0\n");
        assert_eq!(fs.whoami(), &Identity::root());

        // mounting again does not rewrite it
        fs.add_account("bob", "pw").unwrap();
        let mut fs = remount(fs);
        assert_eq!(fs.read_accounts().unwrap().len(), 2);
    }

    #[test]
    fn test_add_account_assigns_next_uid() {
        let mut fs = fresh_fs();
        assert_eq!(fs.add_account("bob", "pw").unwrap(), 1);
        assert_eq!(fs.add_account("carol", "secret").unwrap(), 2);
        assert!(matches!(
            fs.add_account("bob", "other"),
            Err(FsError::AlreadyExists)
        ));
        assert_eq!(
            fs.read_whole_file(USERS_PATH).unwrap(),
            "root:root:0\nbob:pw:1\ncarol:secret:2\n"
        );
    }

    #[test]
    fn test_add_account_rejects_bad_fields() {
        let mut fs = fresh_fs();
        assert!(matches!(fs.add_account("", "pw"), Err(FsError::InvalidName(_))));
        assert!(matches!(fs.add_account("a:b", "pw"), Err(FsError::InvalidName(_))));
        assert!(matches!(fs.add_account("bob", "p\nw"), Err(FsError::InvalidName(_))));
        assert!(matches!(fs.add_account("bob", ""), Err(FsError::InvalidName(_))));
    }

    #[test]
    fn test_login_persists_across_mounts() {
        let mut fs = fresh_fs();
        fs.add_account("bob", "pw").unwrap();
        fs.login("bob", "pw").unwrap();
        assert_eq!(fs.whoami(), &Identity::new(1, "bob"));

        let mut fs = remount(fs);
        assert_eq!(fs.whoami(), &Identity::new(1, "bob"));
        // bob may not touch what root owns
        assert!(matches!(fs.chmod(USERS_PATH, 0o644), Err(FsError::PermissionDenied)));
        assert!(matches!(fs.open(USERS_PATH, "r"), Err(FsError::PermissionDenied)));
        assert!(matches!(fs.add_account("eve", "pw"), Err(FsError::PermissionDenied)));

        fs.login("root", "root").unwrap();
        let fs = remount(fs);
        assert!(fs.whoami().is_superuser());
    }

    #[test]
    fn test_failed_login_keeps_identity() {
        let mut fs = fresh_fs();
        fs.add_account("bob", "pw").unwrap();
        assert!(matches!(fs.login("bob", "wrong"), Err(FsError::PermissionDenied)));
        assert!(matches!(fs.login("nobody", "pw"), Err(FsError::PermissionDenied)));
        assert!(fs.whoami().is_superuser());
        assert!(matches!(fs.stat(SESSION_PATH), Err(FsError::NotFound)));
    }

    #[test]
    fn test_change_password() {
        let mut fs = fresh_fs();
        fs.add_account("bob", "pw").unwrap();
        fs.add_account("carol", "pw").unwrap();
        fs.login("bob", "pw").unwrap();

        fs.change_password("bob", "new").unwrap();
        assert!(matches!(
            fs.change_password("carol", "mine"),
            Err(FsError::PermissionDenied)
        ));
        assert!(matches!(fs.login("bob", "pw"), Err(FsError::PermissionDenied)));
        fs.login("bob", "new").unwrap();

        fs.login("root", "root").unwrap();
        assert!(matches!(
            fs.change_password("nobody", "x"),
            Err(FsError::NotFound)
        ));
        fs.change_password("carol", "changed").unwrap();
        assert_eq!(
            fs.read_whole_file(USERS_PATH).unwrap(),
            "root:root:0\nbob:new:1\ncarol:changed:2\n"
        );
        assert_eq!(fs.stat(USERS_PATH).unwrap().1.permissions(), ACCOUNT_FILE_PERM);
    }

    #[test]
    fn test_garbled_session_falls_back_to_root() {
        let mut fs = fresh_fs();
        fs.replace_file(SESSION_PATH, "nonsense").unwrap();
        let fs = remount(fs);
        assert!(fs.whoami().is_superuser());
    }
}
