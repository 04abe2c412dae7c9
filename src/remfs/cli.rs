//! Argument parsing and session wiring for the `remfs` binary.
//!
//! The binary stays thin: parse arguments, build the transport, load the
//! document tree, mount, then wait for a shutdown signal. All filesystem
//! behaviour lives in the library.

use clap::Parser;
use log::info;
use remfs::error::{RemfsError, Result};
use remfs::model::DocumentRoot;
use remfs::session::{self, NoHooks, SessionGuard};
use remfs::transport::local::LocalDirectory;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    name = "remfs",
    version,
    about = "Mount the document library of a reMarkable tablet as a filesystem"
)]
pub struct Args {
    /// Directory to mount the library on. Prompted for when absent.
    pub mountpoint: Option<PathBuf>,

    /// Local copy of the device's document directory, replacing the
    /// remote transport (offline inspection).
    pub documents: Option<PathBuf>,
}

fn prompt_mountpoint() -> Result<PathBuf> {
    print!("Mount point: ");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(RemfsError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "no mount point given",
        )));
    }
    Ok(PathBuf::from(trimmed))
}

pub fn run() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mountpoint = match args.mountpoint {
        Some(path) => path,
        None => prompt_mountpoint()?,
    };
    let documents = args.documents.ok_or_else(|| {
        RemfsError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "no document directory given; pass a local copy of the \
             device's xochitl directory as the second argument",
        ))
    })?;

    let root = DocumentRoot::load(LocalDirectory::new(&documents))?;

    session::install_signal_handlers();
    let _guard = SessionGuard::open(NoHooks)?;
    let mounted = remfs::fs::spawn(root, &mountpoint)?;
    info!("mounted {} on {}", documents.display(), mountpoint.display());

    while !session::shutdown_requested() && !mounted.guard.is_finished() {
        std::thread::sleep(Duration::from_millis(200));
    }

    // Dropping the session unmounts; the guard then restarts whatever
    // the open hook paused.
    drop(mounted);
    Ok(())
}
