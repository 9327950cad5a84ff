use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::fs::{Fd, MODE_PERM_MASK};

pub const DEFAULT_IMAGE_PATH: &str = "disk.img";

/// a small ext2-like filesystem living inside one image file.
///
/// Every subcommand mounts the image, runs and unmounts again;
/// `shell` keeps one session open so descriptors and the current
/// directory survive between commands.
#[derive(Parser, Debug, PartialEq)]
#[command(author, version, about, long_about)]
pub struct MiniExt2Cli {
    /// the path of the file system image file
    #[arg(
        short,
        long,
        global = true,
        env = "MINI_EXT2_IMAGE",
        default_value = DEFAULT_IMAGE_PATH
    )]
    pub image: PathBuf,
    #[command(subcommand)]
    pub command: Command,
}

/// one line typed into `shell`, same grammar without the program name
#[derive(Parser, Debug, PartialEq)]
#[command(no_binary_name = true)]
pub struct ShellLine {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// create a new file system, destroying the old one
    Format,
    /// show the superblock
    Info,
    /// compare the bitmaps with both free counters
    Check,
    /// list a directory, the current one by default
    Ls { path: Option<String> },
    /// make a directory
    Mkdir { path: String },
    /// create an empty file, existing files are left alone
    Create { path: String },
    /// delete a regular file
    Rm { path: String },
    /// delete an empty directory
    Rmdir { path: String },
    /// change the current directory
    Cd { path: String },
    /// set permission bits, given in octal
    Chmod {
        #[arg(value_parser = parse_octal_mode)]
        mode: u16,
        path: String,
    },
    /// show an inode
    Stat { path: String },
    /// drop the content of a file
    Truncate { path: String },
    /// open a file and print its descriptor
    Open {
        path: String,
        /// `r` to read, anything containing `w` to write
        #[arg(default_value = "r")]
        mode: String,
    },
    /// write text at the cursor of a descriptor
    Write { fd: Fd, text: String },
    /// read up to `n` bytes at the cursor of a descriptor
    Read { fd: Fd, n: usize },
    /// move the cursor of a descriptor
    Seek {
        fd: Fd,
        #[arg(allow_hyphen_values = true)]
        offset: i64,
    },
    /// release a descriptor
    Close { fd: Fd },
    /// open, write text from the start, close
    Writef { path: String, text: String },
    /// open, read up to `n` bytes, close
    Readf { path: String, n: usize },
    /// copy a host file into the file system
    Writefile { path: String, host_path: PathBuf },
    /// print a whole file
    Cat { path: String },
    /// switch to another account, kept across runs
    Login {
        name: String,
        #[arg(short, long)]
        password: Option<String>,
    },
    /// add an account, superuser only
    Useradd {
        name: String,
        #[arg(short, long)]
        password: Option<String>,
    },
    /// change the password of an account
    Passwd {
        name: String,
        #[arg(short, long)]
        password: Option<String>,
    },
    /// show the current account
    Whoami,
    /// read commands from standard input until `exit`
    Shell,
}

fn parse_octal_mode(s: &str) -> Result<u16, String> {
    let digits = s.strip_prefix("0o").unwrap_or(s);
    let mode = u16::from_str_radix(digits, 8).map_err(|e| format!("{s:?} is not octal: {e}"))?;
    if mode > MODE_PERM_MASK {
        return Err(format!("{s} has bits outside {MODE_PERM_MASK:o}"));
    }
    Ok(mode)
}
