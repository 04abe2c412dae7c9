//! # Filesystem Adapter
//!
//! Binds the document model to the kernel through FUSE. The mount is
//! single-threaded by construction: one session loop dispatches every
//! operation serially against the model, so the registry, child maps,
//! handle table and upload buffers need no locking.
//!
//! The kernel speaks inode numbers; the model speaks id strings. The
//! adapter owns that bijection plus the open-handle table, translates
//! every model error to a POSIX code at this one boundary, and enforces
//! the write policy: existing documents are read-only (editing them in
//! place would silently drop handwritten annotations), uploads go
//! through pending documents created here.

use crate::error::{RemfsError, Result};
use crate::model::node::Node;
use crate::model::{DocumentRoot, ROOT_ID};
use crate::transport::Transport;
use fuser::{
    FileAttr, FileType, Filesystem, KernelConfig, MountOption, ReplyAttr, ReplyCreate, ReplyData,
    ReplyDirectory, ReplyEmpty, ReplyEntry, ReplyOpen, ReplyStatfs, ReplyWrite, ReplyXattr,
    Request, TimeOrNow,
};
use log::{debug, warn};
use std::ffi::OsStr;
use std::path::Path;
use std::time::{Duration, SystemTime};

pub mod handles;

use handles::{HandleTable, InodeTable};

const TTL: Duration = Duration::from_secs(1);

/// The one extended attribute we expose.
const XATTR_BOOKMARKED: &str = "user.bookmarked";

/// Synthesized free space: Finder refuses to copy onto volumes that
/// report zero blocks, so pretend to 8 GiB in 512-byte blocks.
const FAKE_BLOCKS: u64 = 8 * 1024 * 1024 * 1024 / 512;

pub struct Remarkable<T: Transport> {
    root: DocumentRoot<T>,
    handles: HandleTable,
    inodes: InodeTable,
}

/// Write-intent check shared by `open`: anything but read-only access to
/// a persisted document is refused.
fn wants_write(flags: i32) -> bool {
    flags & (libc::O_WRONLY | libc::O_RDWR) != 0
}

fn parse_bookmark_value(value: &[u8]) -> Result<bool> {
    match value {
        b"yes" | b"true" | b"1" => Ok(true),
        b"no" | b"false" | b"0" => Ok(false),
        _ => Err(RemfsError::NotSupported),
    }
}

impl<T: Transport> Remarkable<T> {
    pub fn new(root: DocumentRoot<T>) -> Self {
        Self {
            root,
            handles: HandleTable::new(),
            inodes: InodeTable::new(ROOT_ID),
        }
    }

    fn id_of(&self, ino: u64) -> Result<String> {
        self.inodes
            .id_for(ino)
            .map(|s| s.to_string())
            .ok_or_else(|| RemfsError::NotFound(format!("ino {}", ino)))
    }

    /// Node id under an open handle, falling back to the inode for
    /// kernels that reuse a stale fh.
    fn id_of_handle(&self, fh: u64, ino: u64) -> Result<String> {
        match self.handles.get(fh) {
            Some(id) => Ok(id.to_string()),
            None => self.id_of(ino),
        }
    }

    fn attr_of(&mut self, id: &str, req: &Request<'_>) -> Result<FileAttr> {
        let ino = self.inodes.ino_for(id);
        let node = self
            .root
            .node(id)
            .ok_or_else(|| RemfsError::NotFound(id.to_string()))?;
        let (kind, perm) = if node.is_collection() {
            (FileType::Directory, 0o555)
        } else {
            (FileType::RegularFile, 0o444)
        };
        let size = node.size();
        let time = SystemTime::UNIX_EPOCH + Duration::from_millis(node.meta().last_modified_ms());
        Ok(FileAttr {
            ino,
            size,
            blocks: size.div_ceil(512),
            atime: time,
            mtime: time,
            ctime: time,
            crtime: time,
            kind,
            perm,
            nlink: 1,
            uid: req.uid(),
            gid: req.gid(),
            rdev: 0,
            blksize: 512,
            flags: 0,
        })
    }

    fn lookup_child(&self, parent_ino: u64, name: &OsStr) -> Result<String> {
        let parent = self.id_of(parent_ino)?;
        let name = name
            .to_str()
            .ok_or_else(|| RemfsError::NotFound(name.to_string_lossy().into_owned()))?;
        self.root.child(&parent, name)
    }

    /// Reply with a size or the value itself, following the xattr
    /// size-probe protocol.
    fn reply_xattr(data: &[u8], size: u32, reply: ReplyXattr) {
        if size == 0 {
            reply.size(data.len() as u32);
        } else if data.len() as u32 <= size {
            reply.data(data);
        } else {
            reply.error(libc::ERANGE);
        }
    }
}

impl<T: Transport> Filesystem for Remarkable<T> {
    fn init(&mut self, _req: &Request<'_>, config: &mut KernelConfig) -> std::result::Result<(), libc::c_int> {
        // Large uploads arrive in far fewer round trips at 1 MiB.
        let _ = config.set_max_write(1024 * 1024);
        Ok(())
    }

    fn lookup(&mut self, req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        match self
            .lookup_child(parent, name)
            .and_then(|id| self.attr_of(&id, req))
        {
            Ok(attr) => reply.entry(&TTL, &attr, 0),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn getattr(&mut self, req: &Request<'_>, ino: u64, reply: ReplyAttr) {
        match self.id_of(ino).and_then(|id| self.attr_of(&id, req)) {
            Ok(attr) => reply.attr(&TTL, &attr),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn setattr(
        &mut self,
        req: &Request<'_>,
        ino: u64,
        _mode: Option<u32>,
        _uid: Option<u32>,
        _gid: Option<u32>,
        size: Option<u64>,
        _atime: Option<TimeOrNow>,
        _mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        // chmod/chown/utimens are accepted and ignored; refusing them
        // breaks `cp -p` and friends. Only truncation reaches the model.
        let result = self.id_of(ino).and_then(|id| {
            if let Some(len) = size {
                self.root.truncate(&id, len)?;
            }
            self.attr_of(&id, req)
        });
        match result {
            Ok(attr) => reply.attr(&TTL, &attr),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn mkdir(
        &mut self,
        req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        let result = (|| {
            let parent_id = self.id_of(parent)?;
            let name = name.to_str().ok_or(RemfsError::NotSupported)?;
            if self.root.child(&parent_id, name).is_ok() {
                return Err(RemfsError::AlreadyExists(name.to_string()));
            }
            let id = self.root.new_collection(&parent_id, name)?;
            self.attr_of(&id, req)
        })();
        match result {
            Ok(attr) => reply.entry(&TTL, &attr, 0),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let result = (|| {
            let id = self.lookup_child(parent, name)?;
            if self
                .root
                .node(&id)
                .is_some_and(|node| node.is_collection())
            {
                return Err(RemfsError::IsADirectory(id));
            }
            self.root.delete(&id)?;
            self.inodes.forget(&id);
            Ok(())
        })();
        match result {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn rmdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let result = (|| {
            let id = self.lookup_child(parent, name)?;
            match self.root.node(&id) {
                Some(Node::Collection(c)) if !c.is_empty() => {
                    return Err(RemfsError::NotEmpty(id))
                }
                Some(Node::Collection(_)) => {}
                Some(_) => return Err(RemfsError::NotADirectory(id)),
                None => return Err(RemfsError::NotFound(id)),
            }
            self.root.delete(&id)?;
            self.inodes.forget(&id);
            Ok(())
        })();
        match result {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn rename(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        newparent: u64,
        newname: &OsStr,
        _flags: u32,
        reply: ReplyEmpty,
    ) {
        let result = (|| {
            let id = self.lookup_child(parent, name)?;
            let newparent_id = self.id_of(newparent)?;
            let newname = newname.to_str().ok_or(RemfsError::NotSupported)?;

            match self.root.child(&newparent_id, newname) {
                Err(RemfsError::NotFound(_)) => self.root.rename(&id, &newparent_id, newname),
                Err(e) => Err(e),
                Ok(target) if target == id => Ok(()),
                Ok(target) => {
                    if self
                        .root
                        .node(&target)
                        .is_some_and(|node| node.is_collection())
                    {
                        // Moving onto a folder means moving into it,
                        // keeping the source's display name.
                        let keep = name.to_str().ok_or(RemfsError::NotSupported)?;
                        self.root.rename(&id, &target, keep)
                    } else {
                        // Overwriting a document would discard its
                        // annotations; make the caller delete first.
                        Err(RemfsError::AlreadyExists(newname.to_string()))
                    }
                }
            }
        })();
        match result {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        let result = (|| {
            let id = self.id_of(ino)?;
            match self.root.node(&id) {
                Some(Node::Collection(_)) => Err(RemfsError::IsADirectory(id)),
                Some(Node::Opaque(_)) | None => Err(RemfsError::NotFound(id)),
                Some(Node::Document(_)) | Some(Node::Pending(_)) => {
                    if wants_write(flags) {
                        return Err(RemfsError::NotPermitted);
                    }
                    Ok(self.handles.open(&id))
                }
            }
        })();
        match result {
            Ok(fh) => reply.opened(fh, 0),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn create(
        &mut self,
        req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        _flags: i32,
        reply: ReplyCreate,
    ) {
        let result = (|| {
            let parent_id = self.id_of(parent)?;
            let name = name.to_str().ok_or(RemfsError::NotSupported)?;
            if self.root.child(&parent_id, name).is_ok() {
                return Err(RemfsError::AlreadyExists(name.to_string()));
            }
            let id = self.root.new_document(&parent_id, name)?;
            let attr = self.attr_of(&id, req)?;
            Ok((attr, self.handles.open(&id)))
        })();
        match result {
            Ok((attr, fh)) => reply.created(&TTL, &attr, 0, fh, 0),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        let result = self
            .id_of_handle(fh, ino)
            .and_then(|id| self.root.read(&id, offset.max(0) as u64, size));
        match result {
            Ok(data) => reply.data(&data),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn write(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        let result = self
            .id_of_handle(fh, ino)
            .and_then(|id| self.root.write(&id, offset.max(0) as u64, data));
        match result {
            Ok(written) => reply.written(written),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn flush(&mut self, _req: &Request<'_>, ino: u64, fh: u64, _lock_owner: u64, reply: ReplyEmpty) {
        // Uploads persist here, not at release: flush is the last point
        // where an error can still reach the writing process.
        match self
            .id_of_handle(fh, ino)
            .and_then(|id| self.root.save(&id))
        {
            Ok(()) => reply.ok(),
            Err(e) => {
                warn!("flush failed: {}", e);
                reply.error(e.errno());
            }
        }
    }

    fn release(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        self.handles.close(fh);
        reply.ok();
    }

    fn opendir(&mut self, _req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
        let result = (|| {
            let id = self.id_of(ino)?;
            match self.root.node(&id) {
                Some(node) if node.is_collection() => Ok(self.handles.open(&id)),
                Some(_) => Err(RemfsError::NotADirectory(id)),
                None => Err(RemfsError::NotFound(id)),
            }
        })();
        match result {
            Ok(fh) => reply.opened(fh, 0),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let result: Result<Vec<(u64, FileType, String)>> = (|| {
            let id = self.id_of_handle(fh, ino)?;
            let children = self.root.children(&id)?;
            let parent_id = self
                .root
                .node(&id)
                .map(|node| node.meta().parent.clone())
                .unwrap_or_default();

            let mut entries = Vec::with_capacity(children.len() + 2);
            entries.push((ino, FileType::Directory, ".".to_string()));
            entries.push((self.inodes.ino_for(&parent_id), FileType::Directory, "..".to_string()));
            for (name, child_id) in children {
                let kind = match self.root.node(&child_id) {
                    Some(node) if node.is_collection() => FileType::Directory,
                    _ => FileType::RegularFile,
                };
                entries.push((self.inodes.ino_for(&child_id), kind, name));
            }
            Ok(entries)
        })();

        match result {
            Ok(entries) => {
                for (i, (entry_ino, kind, name)) in
                    entries.into_iter().enumerate().skip(offset.max(0) as usize)
                {
                    if reply.add(entry_ino, (i + 1) as i64, kind, &name) {
                        break;
                    }
                }
                reply.ok();
            }
            Err(e) => reply.error(e.errno()),
        }
    }

    fn releasedir(&mut self, _req: &Request<'_>, _ino: u64, fh: u64, _flags: i32, reply: ReplyEmpty) {
        self.handles.close(fh);
        reply.ok();
    }

    fn statfs(&mut self, _req: &Request<'_>, _ino: u64, reply: ReplyStatfs) {
        reply.statfs(FAKE_BLOCKS, FAKE_BLOCKS, FAKE_BLOCKS, 0, 0, 512, 255, 512);
    }

    fn setxattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        name: &OsStr,
        value: &[u8],
        _flags: i32,
        _position: u32,
        reply: ReplyEmpty,
    ) {
        let result = (|| {
            if name.to_str() != Some(XATTR_BOOKMARKED) {
                return Err(RemfsError::NotSupported);
            }
            let pinned = parse_bookmark_value(value)?;
            let id = self.id_of(ino)?;
            self.root.set_pinned(&id, pinned)
        })();
        match result {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn getxattr(&mut self, _req: &Request<'_>, ino: u64, name: &OsStr, size: u32, reply: ReplyXattr) {
        let id = match self.id_of(ino) {
            Ok(id) => id,
            Err(e) => return reply.error(e.errno()),
        };
        if name.to_str() == Some(XATTR_BOOKMARKED) {
            match self.root.pinned(&id) {
                Ok(true) => Self::reply_xattr(b"yes", size, reply),
                Ok(false) => Self::reply_xattr(b"no", size, reply),
                Err(e) => reply.error(e.errno()),
            }
        } else {
            // Unknown names answer with an empty value; Finder probes a
            // long list of com.apple.* attributes on every copy.
            debug!("getxattr {:?} answered empty", name);
            Self::reply_xattr(b"", size, reply);
        }
    }

    fn listxattr(&mut self, _req: &Request<'_>, ino: u64, size: u32, reply: ReplyXattr) {
        if let Err(e) = self.id_of(ino) {
            return reply.error(e.errno());
        }
        let mut names = XATTR_BOOKMARKED.as_bytes().to_vec();
        names.push(0);
        Self::reply_xattr(&names, size, reply);
    }
}

/// Mount options shared by every platform; macOS additionally gets a
/// volume name so the mount shows up sensibly in Finder.
fn mount_options() -> Vec<MountOption> {
    let mut options = vec![MountOption::FSName("remfs".to_string())];
    if cfg!(target_os = "macos") {
        options.push(MountOption::CUSTOM("volname=reMarkable".to_string()));
    }
    options
}

/// Mount in the background and return the running session; dropping it
/// unmounts. The caller owns the wait-for-shutdown loop.
pub fn spawn<T: Transport + Send + 'static>(
    root: DocumentRoot<T>,
    mountpoint: &Path,
) -> Result<fuser::BackgroundSession> {
    fuser::spawn_mount2(Remarkable::new(root), mountpoint, &mount_options())
        .map_err(RemfsError::Io)
}
