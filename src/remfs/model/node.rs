//! In-memory node variants and the display-name policy.
//!
//! The tablet stores a flat set of records; the tree shape lives only in
//! each record's `parent` field. Nodes here are arena-style: the
//! registry in [`crate::model::DocumentRoot`] owns every node keyed by
//! id, child maps hold ids, and back-pointers to parents are the
//! `parent` id inside the metadata. No owning cycles.

use crate::model::metadata::{Content, Metadata};
use std::collections::{BTreeMap, HashMap};

pub type NodeId = String;

/// Extensions recognised on upload and stripped back off a filename to
/// recover the visible name.
pub const KNOWN_EXTENSIONS: [&str; 4] = ["pdf", "djvu", "ps", "epub"];

/// `Foo.pdf` → `Foo`; anything with an unrecognised extension is kept
/// whole, so `notes.txt` stays `notes.txt`.
pub fn strip_extension(filename: &str) -> &str {
    for ext in KNOWN_EXTENSIONS {
        if let Some(stem) = filename.strip_suffix(ext) {
            if let Some(stem) = stem.strip_suffix('.') {
                if !stem.is_empty() {
                    return stem;
                }
            }
        }
    }
    filename
}

/// Directory-like node. The child map is keyed by the disambiguated
/// display name; `names` is the inverse lookup used when a child is
/// removed or renamed.
#[derive(Debug)]
pub struct Collection {
    pub id: NodeId,
    pub meta: Metadata,
    pub file_name: String,
    pub dirty: bool,
    children: BTreeMap<String, NodeId>,
    names: HashMap<NodeId, String>,
}

impl Collection {
    pub fn new(id: NodeId, meta: Metadata) -> Self {
        let file_name = meta.visible_name.clone();
        Self {
            id,
            meta,
            file_name,
            dirty: false,
            children: BTreeMap::new(),
            names: HashMap::new(),
        }
    }

    /// Insert a child under `file_name`, sanitising slashes and
    /// appending ` (2)`, ` (3)`, ... until the name is free. Returns the
    /// name actually used.
    pub fn add_child(&mut self, id: &str, file_name: &str) -> String {
        let base = file_name.replace('/', "-");
        let mut name = base.clone();
        let mut n = 2;
        while self.children.contains_key(&name) {
            name = format!("{} ({})", base, n);
            n += 1;
        }
        self.children.insert(name.clone(), id.to_string());
        self.names.insert(id.to_string(), name.clone());
        name
    }

    pub fn remove_child(&mut self, id: &str) {
        if let Some(name) = self.names.remove(id) {
            self.children.remove(&name);
        }
    }

    pub fn get(&self, name: &str) -> Option<&NodeId> {
        self.children.get(name)
    }

    /// The display name a child was inserted under.
    pub fn name_of(&self, id: &str) -> Option<&str> {
        self.names.get(id).map(|s| s.as_str())
    }

    pub fn children(&self) -> impl Iterator<Item = (&str, &NodeId)> {
        self.children.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

/// Persisted document. `raw_type` names the payload on the device
/// (`pdf`, `epub` or `lines`); the display extension is always a
/// readable one, so notebooks present as `.pdf`.
#[derive(Debug)]
pub struct Document {
    pub id: NodeId,
    pub meta: Metadata,
    /// Display filename. Derived from the visible name at load time;
    /// a rename keeps the caller's input verbatim.
    pub file_name: String,
    pub dirty: bool,
    pub content: Content,
    pub raw_type: String,
    pub size: u64,
    /// Memoised render of a `lines` notebook; filled on first read.
    pub rendered: Option<Vec<u8>>,
}

impl Document {
    pub fn raw_file_name(&self) -> String {
        format!("{}.{}", self.id, self.raw_type)
    }

    /// Display filename derived from the visible name: `fileType` if the
    /// content names one, else `pdf` (notebooks render to PDF).
    pub fn derived_file_name(meta: &Metadata, content: &Content) -> String {
        let ext = if content.file_type.is_empty() {
            "pdf"
        } else {
            &content.file_type
        };
        format!("{}.{}", meta.visible_name, ext)
    }
}

/// An upload in flight: created by the filesystem, buffered in memory,
/// persisted (or silently discarded) at release time.
#[derive(Debug)]
pub struct PendingDocument {
    pub id: NodeId,
    pub meta: Metadata,
    pub file_name: String,
    pub buf: Vec<u8>,
}

impl PendingDocument {
    pub fn write(&mut self, offset: u64, data: &[u8]) {
        let end = offset as usize + data.len();
        if end > self.buf.len() {
            self.buf.resize(end, 0);
        }
        self.buf[offset as usize..end].copy_from_slice(data);
        self.meta.set_data_modified(true);
    }

    pub fn truncate(&mut self, len: u64) {
        self.buf.resize(len as usize, 0);
        self.meta.set_data_modified(true);
    }
}

/// Node with an unrecognised `type`. Registered so descendants can still
/// resolve their parent chain, but never listed and never readable.
#[derive(Debug)]
pub struct Opaque {
    pub id: NodeId,
    pub meta: Metadata,
}

#[derive(Debug)]
pub enum Node {
    Collection(Collection),
    Document(Document),
    Pending(PendingDocument),
    Opaque(Opaque),
}

impl Node {
    pub fn id(&self) -> &str {
        match self {
            Node::Collection(c) => &c.id,
            Node::Document(d) => &d.id,
            Node::Pending(p) => &p.id,
            Node::Opaque(o) => &o.id,
        }
    }

    pub fn meta(&self) -> &Metadata {
        match self {
            Node::Collection(c) => &c.meta,
            Node::Document(d) => &d.meta,
            Node::Pending(p) => &p.meta,
            Node::Opaque(o) => &o.meta,
        }
    }

    pub fn meta_mut(&mut self) -> &mut Metadata {
        match self {
            Node::Collection(c) => &mut c.meta,
            Node::Document(d) => &mut d.meta,
            Node::Pending(p) => &mut p.meta,
            Node::Opaque(o) => &mut o.meta,
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, Node::Collection(_))
    }

    /// Display filename before disambiguation. Opaque nodes are never
    /// listed and have none.
    pub fn file_name(&self) -> Option<&str> {
        match self {
            Node::Collection(c) => Some(&c.file_name),
            Node::Document(d) => Some(&d.file_name),
            Node::Pending(p) => Some(&p.file_name),
            Node::Opaque(_) => None,
        }
    }

    pub fn set_file_name(&mut self, name: &str) {
        match self {
            Node::Collection(c) => c.file_name = name.to_string(),
            Node::Document(d) => d.file_name = name.to_string(),
            Node::Pending(p) => p.file_name = name.to_string(),
            Node::Opaque(_) => {}
        }
    }

    pub fn as_collection(&self) -> Option<&Collection> {
        match self {
            Node::Collection(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_collection_mut(&mut self) -> Option<&mut Collection> {
        match self {
            Node::Collection(c) => Some(c),
            _ => None,
        }
    }

    /// Bytes reported by `getattr`.
    pub fn size(&self) -> u64 {
        match self {
            Node::Collection(_) | Node::Opaque(_) => 0,
            Node::Document(d) => d.size,
            Node::Pending(p) => p.buf.len() as u64,
        }
    }

    pub fn dirty(&self) -> bool {
        match self {
            Node::Collection(c) => c.dirty,
            Node::Document(d) => d.dirty,
            Node::Opaque(_) => false,
            // Pending nodes persist through the upload pipeline instead.
            Node::Pending(_) => false,
        }
    }

    pub fn set_dirty(&mut self, dirty: bool) {
        match self {
            Node::Collection(c) => c.dirty = dirty,
            Node::Document(d) => d.dirty = dirty,
            Node::Opaque(_) | Node::Pending(_) => {}
        }
    }
}
