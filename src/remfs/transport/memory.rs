use super::{FileStat, Transport};
use crate::error::{RemfsError, Result};
use std::collections::BTreeMap;
use std::time::SystemTime;

/// In-memory transport for tests.
///
/// Entries live in a sorted map so `list` order is deterministic. A
/// write log is kept so tests can assert how many remote writes an
/// operation performed.
#[derive(Default)]
pub struct InMemoryTransport {
    entries: BTreeMap<String, Vec<u8>>,
    pub write_log: Vec<String>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an entry without recording it in the write log.
    pub fn seed(&mut self, name: &str, data: impl Into<Vec<u8>>) {
        self.entries.insert(name.to_string(), data.into());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.entries.get(name).map(|v| v.as_slice())
    }
}

impl Transport for InMemoryTransport {
    fn list(&mut self) -> Result<Vec<String>> {
        Ok(self.entries.keys().cloned().collect())
    }

    fn read_all(&mut self, name: &str) -> Result<Vec<u8>> {
        self.entries
            .get(name)
            .cloned()
            .ok_or_else(|| RemfsError::NotFound(name.to_string()))
    }

    fn read_range(&mut self, name: &str, offset: u64, len: u32) -> Result<Vec<u8>> {
        let data = self
            .entries
            .get(name)
            .ok_or_else(|| RemfsError::NotFound(name.to_string()))?;
        let start = (offset as usize).min(data.len());
        let end = (start + len as usize).min(data.len());
        Ok(data[start..end].to_vec())
    }

    fn stat(&mut self, name: &str) -> Result<FileStat> {
        let data = self
            .entries
            .get(name)
            .ok_or_else(|| RemfsError::NotFound(name.to_string()))?;
        Ok(FileStat {
            size: data.len() as u64,
            mtime: SystemTime::UNIX_EPOCH,
            atime: SystemTime::UNIX_EPOCH,
        })
    }

    fn write(&mut self, name: &str, data: &[u8]) -> Result<()> {
        self.entries.insert(name.to_string(), data.to_vec());
        self.write_log.push(name.to_string());
        Ok(())
    }

    fn unlink(&mut self, name: &str) -> Result<()> {
        self.entries
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| RemfsError::NotFound(name.to_string()))
    }
}
