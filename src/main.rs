use std::{
    io::{self, Write},
    process::ExitCode,
};

use anyhow::Context;
use clap::Parser;
use mini_ext2::{
    cli_interface::{execute, run_shell, Command, MiniExt2Cli},
    mkfs::mkfs,
    mount::mount,
    FsError,
};

/// a CLI interface to format an image or to run filesystem commands on it.
///
/// Every command but `format` mounts the image first and unmounts it when done,
/// so only the logged-in account survives between two runs.
fn main() -> ExitCode {
    env_logger::builder().format_timestamp_nanos().init();
    let args = MiniExt2Cli::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("mini-ext2: {e:#}");
            // the errno of the filesystem error becomes the exit status
            let code = e.downcast_ref::<FsError>().map(FsError::errno).unwrap_or(1);
            ExitCode::from(code.clamp(1, u8::MAX as _) as u8)
        }
    }
}

fn run(args: MiniExt2Cli) -> anyhow::Result<()> {
    let image = args.image;
    let mut out = io::stdout().lock();
    match args.command {
        Command::Format => {
            let fs = mkfs(&image)
                .with_context(|| format!("failed to format {}", image.display()))?;
            fs.unmount()?;
            writeln!(out, "formatted {}", image.display())?;
        }
        Command::Shell => {
            let mut fs = mount(&image)
                .with_context(|| format!("failed to mount {}", image.display()))?;
            let result = run_shell(&mut fs, io::stdin().lock(), &mut out);
            fs.unmount()?;
            result?;
        }
        command => {
            let mut fs = mount(&image)
                .with_context(|| format!("failed to mount {}", image.display()))?;
            let result = execute(&mut fs, command, &mut out);
            fs.unmount()?;
            result?;
        }
    }
    Ok(())
}
