//! run parsed commands against a mounted filesystem
use std::{
    fs::File,
    io::{self, BufRead, Write},
};

use anyhow::{bail, Context};
use byte_unit::Byte;
use log::debug;

use super::cli_struct::{Command, ShellLine};
use crate::{
    fd_cursor::FdCursor,
    fs::{BlockDevice, FileKind, FsError, MiniExt2, OpenMode, BLOCK_SIZE},
    utils::{fs_size_calculator, time_util},
};
use clap::Parser;

/// render mode bits the way `ls -l` does, e.g. `drwxr-xr-x`
pub fn mode_string(mode: u16) -> String {
    let mut text = String::with_capacity(10);
    text.push(match FileKind::from(mode) {
        FileKind::Directory => 'd',
        FileKind::RegularFile => '-',
        FileKind::Unknown => '?',
    });
    for shift in [6, 3, 0] {
        let triple = mode >> shift;
        text.push(if triple & 0o4 != 0 { 'r' } else { '-' });
        text.push(if triple & 0o2 != 0 { 'w' } else { '-' });
        text.push(if triple & 0o1 != 0 { 'x' } else { '-' });
    }
    text
}

fn password_or_prompt(password: Option<String>, prompt: &str) -> anyhow::Result<String> {
    match password {
        Some(password) => Ok(password),
        None => Ok(rpassword::prompt_password(prompt)?),
    }
}

/// run one command, everything it prints goes to `out`
///
/// `format` and `shell` need the image itself and are handled by the caller.
pub fn execute<D, W>(fs: &mut MiniExt2<D>, command: Command, out: &mut W) -> anyhow::Result<()>
where
    D: BlockDevice,
    W: Write,
{
    debug!("executing {command:?}");
    match command {
        Command::Format | Command::Shell => {
            bail!("this command needs direct access to the image")
        }
        Command::Info => {
            let superblock = fs.superblock();
            let free_bytes = superblock.free_blocks as u64 * BLOCK_SIZE as u64;
            writeln!(
                out,
                "image size:   {}",
                Byte::from_bytes(fs_size_calculator::image_size() as _).get_appropriate_unit(true)
            )?;
            writeln!(out, "block size:   {} B", superblock.block_size)?;
            writeln!(
                out,
                "blocks:       {} total, {} free ({})",
                superblock.blocks_count,
                superblock.free_blocks,
                Byte::from_bytes(free_bytes as _).get_appropriate_unit(true)
            )?;
            writeln!(
                out,
                "inodes:       {} total, {} free",
                superblock.inodes_count, superblock.free_inodes
            )?;
            writeln!(out, "data starts:  block {}", superblock.first_data_block)?;
            writeln!(out, "mounted at:   {}", time_util::human_time(superblock.mount_time))?;
            writeln!(out, "written at:   {}", time_util::human_time(superblock.write_time))?;
        }
        Command::Check => {
            let report = fs.census()?;
            writeln!(out, "{report}")?;
            if !report.is_consistent() {
                bail!("free counters disagree with the bitmaps");
            }
        }
        Command::Ls { path } => {
            for entry in fs.list_dir(path.as_deref().unwrap_or("."))? {
                writeln!(
                    out,
                    "{} {:>5} {:>8} {} {}",
                    mode_string(entry.mode),
                    entry.uid,
                    entry.size,
                    time_util::human_time(entry.mtime as u64),
                    entry.name
                )?;
            }
        }
        Command::Mkdir { path } => {
            fs.mkdir(&path)?;
        }
        Command::Create { path } => fs.create(&path)?,
        Command::Rm { path } => {
            if fs.stat(&path)?.1.is_dir() {
                return Err(FsError::IsADirectory).context(path);
            }
            fs.delete(&path)?;
        }
        Command::Rmdir { path } => {
            if !fs.stat(&path)?.1.is_dir() {
                return Err(FsError::NotADirectory).context(path);
            }
            fs.delete(&path)?;
        }
        Command::Cd { path } => fs.cd(&path)?,
        Command::Chmod { mode, path } => fs.chmod(&path, mode)?,
        Command::Stat { path } => {
            let (ino, inode) = fs.stat(&path)?;
            writeln!(out, "inode:    {ino}")?;
            writeln!(out, "kind:     {:?}", inode.kind())?;
            writeln!(out, "mode:     {} ({:o})", mode_string(inode.mode), inode.permissions())?;
            writeln!(out, "uid:      {}", inode.uid)?;
            writeln!(out, "links:    {}", inode.links)?;
            writeln!(out, "size:     {}", inode.size)?;
            writeln!(out, "blocks:   {}", inode.blocks)?;
            writeln!(out, "direct:   {:?}", inode.direct)?;
            writeln!(out, "indirect: {}", inode.indirect)?;
            writeln!(out, "accessed: {}", time_util::human_time(inode.atime as u64))?;
            writeln!(out, "modified: {}", time_util::human_time(inode.mtime as u64))?;
            writeln!(out, "changed:  {}", time_util::human_time(inode.ctime as u64))?;
        }
        Command::Truncate { path } => fs.truncate(&path)?,
        Command::Open { path, mode } => {
            let fd = fs.open(&path, mode.as_str())?;
            writeln!(out, "fd {fd}")?;
        }
        Command::Write { fd, text } => {
            let written = fs.write(fd, text.as_bytes())?;
            writeln!(out, "wrote {written} bytes")?;
        }
        Command::Read { fd, n } => {
            let data = fs.read(fd, n)?;
            out.write_all(&data)?;
            writeln!(out)?;
        }
        Command::Seek { fd, offset } => {
            let position = fs.seek(fd, offset)?;
            writeln!(out, "offset {position}")?;
        }
        Command::Close { fd } => fs.close(fd)?,
        Command::Writef { path, text } => {
            let fd = fs.open(&path, OpenMode::Write)?;
            let written = fs.write(fd, text.as_bytes());
            fs.close(fd)?;
            writeln!(out, "wrote {} bytes", written?)?;
        }
        Command::Readf { path, n } => {
            let fd = fs.open(&path, OpenMode::Read)?;
            let data = fs.read(fd, n);
            fs.close(fd)?;
            out.write_all(&data?)?;
            writeln!(out)?;
        }
        Command::Writefile { path, host_path } => {
            let mut host_file = File::open(&host_path)
                .with_context(|| format!("cannot open host file {}", host_path.display()))?;
            let fd = fs.open(&path, OpenMode::Write)?;
            let copied = io::copy(&mut host_file, &mut FdCursor::new(fs, fd));
            fs.close(fd)?;
            writeln!(out, "wrote {} bytes", copied?)?;
        }
        Command::Cat { path } => {
            let fd = fs.open(&path, OpenMode::Read)?;
            let copied = io::copy(&mut FdCursor::new(fs, fd), out);
            fs.close(fd)?;
            copied?;
        }
        Command::Login { name, password } => {
            let password = password_or_prompt(password, "Please input the password: ")?;
            fs.login(&name, &password)?;
            writeln!(out, "logged in as {}", fs.whoami())?;
        }
        Command::Useradd { name, password } => {
            let password =
                password_or_prompt(password, "Please input a password for the new user: ")?;
            let uid = fs.add_account(&name, &password)?;
            writeln!(out, "added {name} with uid {uid}")?;
        }
        Command::Passwd { name, password } => {
            let password =
                password_or_prompt(password, "Please input the new password for the user: ")?;
            fs.change_password(&name, &password)?;
            writeln!(out, "update user password successfully.")?;
        }
        Command::Whoami => writeln!(out, "{}", fs.whoami())?,
    }
    Ok(())
}

/// read commands line by line until `exit`, `quit` or end of input
///
/// A failing command is reported and the loop goes on.
pub fn run_shell<D, R, W>(fs: &mut MiniExt2<D>, input: R, out: &mut W) -> anyhow::Result<()>
where
    D: BlockDevice,
    R: BufRead,
    W: Write,
{
    let mut lines = input.lines();
    loop {
        write!(out, "{}> ", fs.whoami().name)?;
        out.flush()?;
        let Some(line) = lines.next() else {
            writeln!(out)?;
            break;
        };
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }
        let Some(words) = shlex::split(line) else {
            writeln!(out, "unbalanced quotes")?;
            continue;
        };
        let command = match ShellLine::try_parse_from(words) {
            Ok(parsed) => parsed.command,
            Err(e) => {
                write!(out, "{e}")?;
                continue;
            }
        };
        if matches!(command, Command::Format | Command::Shell) {
            writeln!(out, "not available inside the shell")?;
            continue;
        }
        if let Err(e) = execute(fs, command, out) {
            writeln!(out, "error: {e:#}")?;
        }
    }
    Ok(())
}
