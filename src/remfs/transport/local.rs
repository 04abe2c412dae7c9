use super::{FileStat, Transport};
use crate::error::{RemfsError, Result};
use std::fs;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Transport over a directory on the host.
///
/// Used by the offline mode of the CLI, where a copy of the tablet's
/// `xochitl` directory stands in for the device. Entry names resolve
/// relative to the root; absolute names (template fetches) are taken
/// as-is.
pub struct LocalDirectory {
    root: PathBuf,
}

impl LocalDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, name: &str) -> PathBuf {
        let path = Path::new(name);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

fn map_io(name: &str, e: std::io::Error) -> RemfsError {
    if e.kind() == std::io::ErrorKind::NotFound {
        RemfsError::NotFound(name.to_string())
    } else {
        RemfsError::Io(e)
    }
}

impl Transport for LocalDirectory {
    fn list(&mut self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    fn read_all(&mut self, name: &str) -> Result<Vec<u8>> {
        fs::read(self.resolve(name)).map_err(|e| map_io(name, e))
    }

    fn read_range(&mut self, name: &str, offset: u64, len: u32) -> Result<Vec<u8>> {
        let mut file = fs::File::open(self.resolve(name)).map_err(|e| map_io(name, e))?;
        file.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; len as usize];
        let mut filled = 0;
        while filled < buf.len() {
            let n = file.read(&mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        buf.truncate(filled);
        Ok(buf)
    }

    fn stat(&mut self, name: &str) -> Result<FileStat> {
        let meta = fs::metadata(self.resolve(name)).map_err(|e| map_io(name, e))?;
        Ok(FileStat {
            size: meta.len(),
            mtime: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            atime: meta.accessed().unwrap_or(SystemTime::UNIX_EPOCH),
        })
    }

    fn write(&mut self, name: &str, data: &[u8]) -> Result<()> {
        // Replace atomically: write a sibling temp file, then rename over.
        let target = self.resolve(name);
        let dir = target.parent().ok_or(RemfsError::NotPermitted)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        std::io::Write::write_all(&mut tmp, data)?;
        tmp.persist(&target).map_err(|e| RemfsError::Io(e.error))?;
        Ok(())
    }

    fn unlink(&mut self, name: &str) -> Result<()> {
        fs::remove_file(self.resolve(name)).map_err(|e| map_io(name, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut t = LocalDirectory::new(dir.path());
        t.write("a.metadata", b"hello").unwrap();
        assert_eq!(t.read_all("a.metadata").unwrap(), b"hello");
        assert_eq!(t.stat("a.metadata").unwrap().size, 5);
        assert_eq!(t.list().unwrap(), vec!["a.metadata".to_string()]);
    }

    #[test]
    fn read_range_is_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let mut t = LocalDirectory::new(dir.path());
        t.write("doc.pdf", b"0123456789").unwrap();
        assert_eq!(t.read_range("doc.pdf", 2, 4).unwrap(), b"2345");
        // Reading past the end yields the short tail, not an error.
        assert_eq!(t.read_range("doc.pdf", 8, 100).unwrap(), b"89");
    }

    #[test]
    fn missing_entry_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mut t = LocalDirectory::new(dir.path());
        assert!(matches!(
            t.read_all("nope.metadata"),
            Err(RemfsError::NotFound(_))
        ));
        assert!(matches!(t.unlink("nope.pdf"), Err(RemfsError::NotFound(_))));
    }
}
