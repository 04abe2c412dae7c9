//! # Transport Layer
//!
//! The tablet stores its whole library in one flat directory. The
//! [`Transport`] trait is the seam between the document model and
//! whatever actually holds that directory: an SFTP session to the
//! device, a local copy for offline inspection, or an in-memory map in
//! tests.
//!
//! The interface is deliberately small and synchronous — list a flat
//! namespace, read, stat, replace, unlink. Everything above it treats
//! entry names as opaque keys (`<uuid>.metadata`, `<uuid>.content`,
//! `<uuid>.pdf`, ...). Absolute names escape the namespace; the template
//! cache uses them to reach `/usr/share/remarkable/templates`.
//!
//! ## Implementations
//!
//! - [`local::LocalDirectory`]: a directory on the host, used by the
//!   offline mode of the CLI.
//! - [`memory::InMemoryTransport`]: for testing the model without
//!   touching a filesystem.

use crate::error::Result;
use std::time::SystemTime;

pub mod local;
pub mod memory;

/// Stat result for a remote entry.
#[derive(Debug, Clone, Copy)]
pub struct FileStat {
    pub size: u64,
    pub mtime: SystemTime,
    pub atime: SystemTime,
}

/// Synchronous access to the flat document directory.
///
/// All operations may block on remote I/O; failures carry either a
/// not-found condition or a generic I/O condition and are translated to
/// POSIX codes further up.
pub trait Transport {
    /// Entry names in the document directory, non-recursive.
    fn list(&mut self) -> Result<Vec<String>>;

    /// Read a whole entry.
    fn read_all(&mut self, name: &str) -> Result<Vec<u8>>;

    /// Read `len` bytes at `offset`. Short reads at end of file are not
    /// an error.
    fn read_range(&mut self, name: &str, offset: u64, len: u32) -> Result<Vec<u8>>;

    fn stat(&mut self, name: &str) -> Result<FileStat>;

    /// Atomically replace an entry with `data`.
    fn write(&mut self, name: &str, data: &[u8]) -> Result<()>;

    fn unlink(&mut self, name: &str) -> Result<()>;
}
