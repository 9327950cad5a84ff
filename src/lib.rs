pub mod accounts;
pub mod cli_interface;
pub mod fd_cursor;
mod fs;
pub mod mkfs;
pub mod mount;
pub mod utils;
pub use fs::*;
