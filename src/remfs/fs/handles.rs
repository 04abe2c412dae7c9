//! Descriptor and inode bookkeeping for the filesystem adapter.

use std::collections::HashMap;

/// Dense file-handle allocator: a pool of freed descriptors plus a
/// monotonically increasing next-descriptor counter. Handles map to
/// whatever node id was open at the time — collections for readdir,
/// documents for read, pending documents for read/write.
#[derive(Default)]
pub struct HandleTable {
    free: Vec<u64>,
    next: u64,
    open: HashMap<u64, String>,
}

impl HandleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self, node_id: &str) -> u64 {
        let fh = self.free.pop().unwrap_or_else(|| {
            self.next += 1;
            self.next
        });
        self.open.insert(fh, node_id.to_string());
        fh
    }

    pub fn get(&self, fh: u64) -> Option<&str> {
        self.open.get(&fh).map(|s| s.as_str())
    }

    pub fn close(&mut self, fh: u64) -> Option<String> {
        let id = self.open.remove(&fh);
        if id.is_some() {
            self.free.push(fh);
        }
        id
    }
}

/// The kernel addresses nodes by inode number; the model addresses them
/// by id string. This table owns the bijection, assigning inos lazily
/// as nodes are first seen. The root id maps to `FUSE_ROOT_ID`.
pub struct InodeTable {
    by_ino: HashMap<u64, String>,
    by_id: HashMap<String, u64>,
    next: u64,
}

impl InodeTable {
    pub fn new(root_id: &str) -> Self {
        let mut table = Self {
            by_ino: HashMap::new(),
            by_id: HashMap::new(),
            next: fuser::FUSE_ROOT_ID,
        };
        table.by_ino.insert(fuser::FUSE_ROOT_ID, root_id.to_string());
        table.by_id.insert(root_id.to_string(), fuser::FUSE_ROOT_ID);
        table
    }

    pub fn ino_for(&mut self, id: &str) -> u64 {
        if let Some(&ino) = self.by_id.get(id) {
            return ino;
        }
        self.next += 1;
        let ino = self.next;
        self.by_ino.insert(ino, id.to_string());
        self.by_id.insert(id.to_string(), ino);
        ino
    }

    pub fn id_for(&self, ino: u64) -> Option<&str> {
        self.by_ino.get(&ino).map(|s| s.as_str())
    }

    pub fn forget(&mut self, id: &str) {
        if let Some(ino) = self.by_id.remove(id) {
            self.by_ino.remove(&ino);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_dense_and_reused() {
        let mut t = HandleTable::new();
        let a = t.open("node-a");
        let b = t.open("node-b");
        assert_ne!(a, b);
        assert_eq!(t.get(a), Some("node-a"));

        assert_eq!(t.close(a), Some("node-a".to_string()));
        assert_eq!(t.get(a), None);
        // Freed descriptors are handed out again before the counter grows.
        let c = t.open("node-c");
        assert_eq!(c, a);
    }

    #[test]
    fn closing_an_unknown_handle_is_a_noop() {
        let mut t = HandleTable::new();
        assert_eq!(t.close(42), None);
        assert_eq!(t.open("x"), 1);
    }

    #[test]
    fn inode_mapping_is_stable_and_rooted() {
        let mut t = InodeTable::new("");
        assert_eq!(t.id_for(fuser::FUSE_ROOT_ID), Some(""));
        assert_eq!(t.ino_for(""), fuser::FUSE_ROOT_ID);

        let a = t.ino_for("doc-a");
        assert_eq!(t.ino_for("doc-a"), a);
        assert_eq!(t.id_for(a), Some("doc-a"));

        t.forget("doc-a");
        assert_eq!(t.id_for(a), None);
        assert_ne!(t.ino_for("doc-a"), a);
    }
}
