//! # Document Model
//!
//! The tablet keeps its library as a flat directory of id-keyed records;
//! the only tree structure is each record's `parent` field.
//! [`DocumentRoot`] reconstructs that tree in memory, owns every node in
//! a single id-keyed registry (arena style, no owning cycles), and is
//! the sole writer of records back to the transport.
//!
//! ## Loading
//!
//! One scan over `*.metadata` builds unlinked nodes, then a second pass
//! links each node to its parent. The scan is tolerant by design: a
//! corrupt record, an unreadable content file or a document with no
//! payload is logged and dropped, never fatal. Orphans stay registered
//! but unreachable, matching what the device itself does with them.
//!
//! ## Mutation discipline
//!
//! Every metadata mutation goes through the setters on
//! [`metadata::Metadata`], which bump `version` and raise the flags the
//! device sync protocol expects. The registry additionally tracks an
//! in-memory dirty bit per node so `save` writes each change exactly
//! once.

use crate::error::{RemfsError, Result};
use crate::lines;
use crate::model::metadata::{Content, Metadata, NodeType};
use crate::model::node::{strip_extension, Collection, Document, Node, NodeId, PendingDocument};
use crate::templates::TemplateCache;
use crate::transport::Transport;
use log::{debug, warn};
use std::collections::HashMap;
use uuid::Uuid;

pub mod convert;
pub mod metadata;
pub mod node;

/// Reserved id of the synthetic root collection.
pub const ROOT_ID: &str = "";
const ROOT_NAME: &str = "ROOT";

pub struct DocumentRoot<T: Transport> {
    transport: T,
    nodes: HashMap<NodeId, Node>,
    templates: TemplateCache,
}

impl<T: Transport> DocumentRoot<T> {
    /// Scan the transport and reconstruct the tree.
    pub fn load(transport: T) -> Result<Self> {
        let mut root = Self {
            transport,
            nodes: HashMap::new(),
            templates: TemplateCache::new()?,
        };
        root.nodes.insert(
            ROOT_ID.to_string(),
            Node::Collection(Collection::new(
                ROOT_ID.to_string(),
                Metadata::new(NodeType::CollectionType, ROOT_NAME, ""),
            )),
        );

        for entry in root.transport.list()? {
            if let Some(id) = entry.strip_suffix(".metadata") {
                if let Err(e) = root.load_node_unlinked(id) {
                    warn!("skipping {}: {}", id, e);
                }
            }
        }

        let ids: Vec<NodeId> = root
            .nodes
            .keys()
            .filter(|id| !id.is_empty())
            .cloned()
            .collect();
        for id in ids {
            root.link(&id);
        }
        Ok(root)
    }

    fn load_node_unlinked(&mut self, id: &str) -> Result<()> {
        let raw = self.transport.read_all(&format!("{}.metadata", id))?;
        let meta: Metadata = serde_json::from_slice(&raw)?;
        if meta.deleted {
            return Ok(());
        }

        let node = match meta.node_type {
            NodeType::CollectionType => {
                Node::Collection(Collection::new(id.to_string(), meta))
            }
            NodeType::DocumentType => {
                let raw = self.transport.read_all(&format!("{}.content", id))?;
                let content: Content = serde_json::from_slice(&raw)?;
                let raw_type = if content.file_type.is_empty() {
                    // A notebook has a .lines payload; a document with
                    // neither fileType nor strokes is partial device
                    // state and stays invisible.
                    if self.transport.stat(&format!("{}.lines", id)).is_err() {
                        debug!("{} has no payload, hiding", id);
                        return Ok(());
                    }
                    "lines".to_string()
                } else {
                    content.file_type.clone()
                };
                let size = self.transport.stat(&format!("{}.{}", id, raw_type))?.size;
                let file_name = Document::derived_file_name(&meta, &content);
                Node::Document(Document {
                    id: id.to_string(),
                    meta,
                    file_name,
                    dirty: false,
                    content,
                    raw_type,
                    size,
                    rendered: None,
                })
            }
            NodeType::Unknown => Node::Opaque(node::Opaque {
                id: id.to_string(),
                meta,
            }),
        };
        self.nodes.insert(id.to_string(), node);
        Ok(())
    }

    fn link(&mut self, id: &str) {
        let (parent_id, file_name) = match self.nodes.get(id) {
            Some(node) => match node.file_name() {
                Some(name) => (node.meta().parent.clone(), name.to_string()),
                // Opaque nodes are registered for their descendants'
                // sake but never listed anywhere.
                None => return,
            },
            None => return,
        };
        match self.nodes.get_mut(&parent_id).and_then(Node::as_collection_mut) {
            Some(parent) => {
                parent.add_child(id, &file_name);
            }
            None => debug!("orphan {} (parent {:?} not present)", id, parent_id),
        }
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    fn require(&self, id: &str) -> Result<&Node> {
        self.nodes
            .get(id)
            .ok_or_else(|| RemfsError::NotFound(id.to_string()))
    }

    /// Child id under `name` in the given collection.
    pub fn child(&self, parent_id: &str, name: &str) -> Result<NodeId> {
        let parent = self.require(parent_id)?;
        let collection = parent
            .as_collection()
            .ok_or_else(|| RemfsError::NotADirectory(parent_id.to_string()))?;
        collection
            .get(name)
            .cloned()
            .ok_or_else(|| RemfsError::NotFound(name.to_string()))
    }

    /// Display names and ids for readdir, in map order.
    pub fn children(&self, id: &str) -> Result<Vec<(String, NodeId)>> {
        let node = self.require(id)?;
        let collection = node
            .as_collection()
            .ok_or_else(|| RemfsError::NotADirectory(id.to_string()))?;
        Ok(collection
            .children()
            .map(|(name, child)| (name.to_string(), child.clone()))
            .collect())
    }

    fn write_metadata(&mut self, id: &str, meta: &Metadata) -> Result<()> {
        let bytes = serde_json::to_vec(meta)?;
        self.transport.write(&format!("{}.metadata", id), &bytes)
    }

    /// Create a collection under `parent_id` and persist it immediately.
    pub fn new_collection(&mut self, parent_id: &str, name: &str) -> Result<NodeId> {
        let id = Uuid::new_v4().to_string();
        let meta = Metadata::new(NodeType::CollectionType, name, parent_id);
        self.write_metadata(&id, &meta)?;
        self.transport.write(&format!("{}.content", id), b"{}")?;

        self.nodes
            .insert(id.clone(), Node::Collection(Collection::new(id.clone(), meta)));
        self.link(&id);
        Ok(id)
    }

    /// Allocate a pending document under `parent_id`. Nothing is
    /// persisted until [`DocumentRoot::save`] runs the upload pipeline.
    pub fn new_document(&mut self, parent_id: &str, file_name: &str) -> Result<NodeId> {
        let id = Uuid::new_v4().to_string();
        let meta = Metadata::new(NodeType::DocumentType, strip_extension(file_name), parent_id);
        let pending = PendingDocument {
            id: id.clone(),
            meta,
            file_name: file_name.to_string(),
            buf: Vec::new(),
        };
        self.nodes.insert(id.clone(), Node::Pending(pending));
        self.link(&id);
        Ok(id)
    }

    /// Read a slice of a document's presented bytes. Notebooks
    /// materialise to PDF on first read; other documents stream straight
    /// from the device.
    pub fn read(&mut self, id: &str, offset: u64, size: u32) -> Result<Vec<u8>> {
        let raw_name = match self.require(id)? {
            Node::Collection(_) => return Err(RemfsError::IsADirectory(id.to_string())),
            Node::Opaque(_) => return Err(RemfsError::NotPermitted),
            Node::Pending(p) => return Ok(slice(&p.buf, offset, size)),
            Node::Document(d) => {
                if d.raw_type == "lines" {
                    None
                } else {
                    Some(d.raw_file_name())
                }
            }
        };
        if let Some(name) = raw_name {
            return self.transport.read_range(&name, offset, size);
        }

        self.materialize(id)?;
        match self.nodes.get(id) {
            Some(Node::Document(d)) => {
                let rendered = d.rendered.as_deref().unwrap_or_default();
                Ok(slice(rendered, offset, size))
            }
            _ => Err(RemfsError::NotFound(id.to_string())),
        }
    }

    /// Render a notebook to PDF once per session.
    fn materialize(&mut self, id: &str) -> Result<()> {
        if let Some(Node::Document(d)) = self.nodes.get(id) {
            if d.rendered.is_some() {
                return Ok(());
            }
        }

        let strokes = self.transport.read_all(&format!("{}.lines", id))?;
        let pagedata = self
            .transport
            .read_all(&format!("{}.pagedata", id))
            .unwrap_or_default();

        let mut templates = Vec::new();
        for name in String::from_utf8_lossy(&pagedata).lines() {
            templates.push(self.templates.lookup(&mut self.transport, name.trim()));
        }

        let decoded = lines::parse(&strokes)?;
        let pdf = lines::render::render(&decoded, &templates)?;

        if let Some(Node::Document(d)) = self.nodes.get_mut(id) {
            d.size = pdf.len() as u64;
            d.rendered = Some(pdf);
        }
        Ok(())
    }

    /// Buffer bytes into a pending upload.
    pub fn write(&mut self, id: &str, offset: u64, data: &[u8]) -> Result<u32> {
        match self.nodes.get_mut(id) {
            Some(Node::Pending(p)) => {
                p.write(offset, data);
                Ok(data.len() as u32)
            }
            Some(_) => Err(RemfsError::NotPermitted),
            None => Err(RemfsError::NotFound(id.to_string())),
        }
    }

    pub fn truncate(&mut self, id: &str, len: u64) -> Result<()> {
        match self.nodes.get_mut(id) {
            Some(Node::Pending(p)) => {
                p.truncate(len);
                Ok(())
            }
            Some(_) => Err(RemfsError::NotPermitted),
            None => Err(RemfsError::NotFound(id.to_string())),
        }
    }

    /// Persist outstanding changes. For pending documents this is the
    /// whole upload pipeline; for everything else it writes the metadata
    /// record iff a mutation is unsaved.
    pub fn save(&mut self, id: &str) -> Result<()> {
        if matches!(self.require(id)?, Node::Pending(_)) {
            return self.save_pending(id);
        }
        let node = self.require(id)?;
        if !node.dirty() || id.is_empty() {
            return Ok(());
        }
        let meta = node.meta().clone();
        self.write_metadata(id, &meta)?;
        if let Some(node) = self.nodes.get_mut(id) {
            node.set_dirty(false);
        }
        Ok(())
    }

    fn save_pending(&mut self, id: &str) -> Result<()> {
        let (file_name, deleted, empty) = match self.nodes.get(id) {
            Some(Node::Pending(p)) => (p.file_name.clone(), p.meta.deleted, p.buf.is_empty()),
            _ => return Err(RemfsError::NotFound(id.to_string())),
        };
        // Editors probe with dot-files and zero-byte writes; both are
        // non-events, not uploads.
        if file_name.starts_with('.') || deleted || empty {
            return Ok(());
        }

        match self.persist_pending(id) {
            Ok(()) => Ok(()),
            Err(e) => {
                // A failed upload must not leave a phantom entry behind.
                warn!("upload of {:?} failed: {}", file_name, e);
                self.unlink_from_parent(id);
                self.nodes.remove(id);
                Err(e)
            }
        }
    }

    fn persist_pending(&mut self, id: &str) -> Result<()> {
        let buf = match self.nodes.get_mut(id) {
            Some(Node::Pending(p)) => std::mem::take(&mut p.buf),
            _ => return Err(RemfsError::NotFound(id.to_string())),
        };

        let format = convert::detect(&buf)?;
        let data = convert::to_upload_bytes(format, buf)?;
        let file_type = format.file_type();

        // Content first, payload second, metadata last: a crash leaves
        // the device with either no record or a complete one.
        let content = Content {
            file_type: file_type.to_string(),
        };
        self.transport
            .write(&format!("{}.content", id), &serde_json::to_vec(&content)?)?;
        self.transport
            .write(&format!("{}.{}", id, file_type), &data)?;

        let meta = match self.nodes.get_mut(id) {
            Some(Node::Pending(p)) => {
                p.meta.set_data_modified(false);
                p.meta.clone()
            }
            _ => return Err(RemfsError::NotFound(id.to_string())),
        };
        self.write_metadata(id, &meta)?;

        let pending = match self.nodes.remove(id) {
            Some(Node::Pending(p)) => p,
            _ => return Err(RemfsError::NotFound(id.to_string())),
        };
        self.nodes.insert(
            id.to_string(),
            Node::Document(Document {
                id: id.to_string(),
                meta: pending.meta,
                file_name: pending.file_name,
                dirty: false,
                content,
                raw_type: file_type.to_string(),
                size: data.len() as u64,
                rendered: None,
            }),
        );
        Ok(())
    }

    fn unlink_from_parent(&mut self, id: &str) {
        let parent_id = match self.nodes.get(id) {
            Some(node) => node.meta().parent.clone(),
            None => return,
        };
        if let Some(parent) = self
            .nodes
            .get_mut(&parent_id)
            .and_then(Node::as_collection_mut)
        {
            parent.remove_child(id);
        }
    }

    /// Move and/or rename a node. The new visible name is the filename
    /// with a recognised extension stripped; the filename itself is kept
    /// verbatim as the display name.
    pub fn rename(&mut self, id: &str, new_parent: &str, new_name: &str) -> Result<()> {
        if id.is_empty() {
            return Err(RemfsError::Busy);
        }
        {
            let node = self.require(id)?;
            if node.meta().parent == new_parent && node.file_name() == Some(new_name) {
                return Ok(());
            }
        }
        if !matches!(self.nodes.get(new_parent), Some(Node::Collection(_))) {
            return Err(RemfsError::ParentMissing(new_parent.to_string()));
        }

        self.unlink_from_parent(id);
        if let Some(node) = self.nodes.get_mut(id) {
            let visible = strip_extension(new_name).to_string();
            node.meta_mut().set_visible_name(&visible);
            node.meta_mut().parent = new_parent.to_string();
            node.set_file_name(new_name);
            node.set_dirty(true);
        }
        if let Some(parent) = self
            .nodes
            .get_mut(new_parent)
            .and_then(Node::as_collection_mut)
        {
            parent.add_child(id, new_name);
        }
        self.save(id)
    }

    /// Unlink a node from the tree and persist its tombstone. The
    /// `deleted` flag is written back so the device does not resurrect
    /// the entry on its next sync.
    pub fn delete(&mut self, id: &str) -> Result<()> {
        if id.is_empty() {
            return Err(RemfsError::Busy);
        }
        self.require(id)?;
        self.unlink_from_parent(id);
        match self.nodes.get_mut(id) {
            Some(Node::Pending(p)) => {
                // Nothing is on the device yet; flagging deleted makes
                // the eventual flush a no-op.
                p.meta.set_deleted(true);
                Ok(())
            }
            Some(node) => {
                node.meta_mut().set_deleted(true);
                node.set_dirty(true);
                self.save(id)
            }
            None => Err(RemfsError::NotFound(id.to_string())),
        }
    }

    pub fn pinned(&self, id: &str) -> Result<bool> {
        Ok(self.require(id)?.meta().pinned)
    }

    /// Toggle the bookmark flag and persist immediately.
    pub fn set_pinned(&mut self, id: &str, pinned: bool) -> Result<()> {
        match self.nodes.get_mut(id) {
            Some(node) => {
                node.meta_mut().set_pinned(pinned);
                node.set_dirty(true);
            }
            None => return Err(RemfsError::NotFound(id.to_string())),
        }
        self.save(id)
    }
}

fn slice(data: &[u8], offset: u64, size: u32) -> Vec<u8> {
    let start = (offset as usize).min(data.len());
    let end = (start + size as usize).min(data.len());
    data[start..end].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::memory::InMemoryTransport;

    fn meta_json(name: &str, parent: &str, node_type: &str) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "deleted": false,
            "lastModified": "1539442190000",
            "metadatamodified": false,
            "modified": false,
            "parent": parent,
            "pinned": false,
            "synced": true,
            "type": node_type,
            "version": 1,
            "visibleName": name
        }))
        .unwrap()
    }

    fn seed_document(t: &mut InMemoryTransport, id: &str, name: &str, parent: &str, ft: &str) {
        t.seed(&format!("{}.metadata", id), meta_json(name, parent, "DocumentType"));
        t.seed(
            &format!("{}.content", id),
            format!(r#"{{"fileType":"{}"}}"#, ft).into_bytes(),
        );
        if !ft.is_empty() {
            t.seed(&format!("{}.{}", id, ft), b"%PDF-1.4 payload".to_vec());
        }
    }

    fn seed_notebook(t: &mut InMemoryTransport, id: &str, name: &str, parent: &str) {
        use crate::lines::testdata::{LinesBuilder, RawStroke};
        t.seed(&format!("{}.metadata", id), meta_json(name, parent, "DocumentType"));
        t.seed(&format!("{}.content", id), br#"{"fileType":""}"#.to_vec());
        t.seed(
            &format!("{}.lines", id),
            LinesBuilder::new()
                .page(&[vec![RawStroke::pen_line(vec![(0.0, 0.0), (50.0, 80.0)])]])
                .build(),
        );
        t.seed(&format!("{}.pagedata", id), b"Blank\n".to_vec());
    }

    fn seed_collection(t: &mut InMemoryTransport, id: &str, name: &str, parent: &str) {
        t.seed(&format!("{}.metadata", id), meta_json(name, parent, "CollectionType"));
        t.seed(&format!("{}.content", id), b"{}".to_vec());
    }

    fn names_under(root: &DocumentRoot<InMemoryTransport>, id: &str) -> Vec<String> {
        root.children(id)
            .unwrap()
            .into_iter()
            .map(|(n, _)| n)
            .collect()
    }

    #[test]
    fn cold_load_lists_documents_with_pdf_extensions() {
        let mut t = InMemoryTransport::new();
        seed_document(&mut t, "a", "Book", "", "pdf");
        seed_notebook(&mut t, "b", "Notebook", "");
        let root = DocumentRoot::load(t).unwrap();
        // Notebooks present as rendered PDFs.
        assert_eq!(names_under(&root, ROOT_ID), vec!["Book.pdf", "Notebook.pdf"]);
    }

    #[test]
    fn every_ancestor_chain_ends_at_the_root() {
        let mut t = InMemoryTransport::new();
        seed_collection(&mut t, "f1", "Outer", "");
        seed_collection(&mut t, "f2", "Inner", "f1");
        seed_document(&mut t, "d1", "Doc", "f2", "pdf");
        let root = DocumentRoot::load(t).unwrap();

        let mut id = "d1".to_string();
        let mut hops = 0;
        while !id.is_empty() {
            id = root.node(&id).unwrap().meta().parent.clone();
            hops += 1;
            assert!(hops < 10, "parent chain must terminate");
        }
        assert!(root.node(ROOT_ID).unwrap().is_collection());
    }

    #[test]
    fn colliding_names_take_numbered_suffixes() {
        let mut t = InMemoryTransport::new();
        seed_document(&mut t, "a", "Notes", "", "pdf");
        seed_document(&mut t, "b", "Notes", "", "pdf");
        let root = DocumentRoot::load(t).unwrap();
        let names = names_under(&root, ROOT_ID);
        assert!(names.contains(&"Notes.pdf".to_string()));
        assert!(names.contains(&"Notes.pdf (2)".to_string()));
    }

    #[test]
    fn deleted_and_orphaned_records_stay_out_of_the_tree() {
        let mut t = InMemoryTransport::new();
        seed_document(&mut t, "live", "Live", "", "pdf");
        let mut dead = serde_json::from_slice::<serde_json::Value>(&meta_json("Dead", "", "DocumentType")).unwrap();
        dead["deleted"] = true.into();
        t.seed("dead.metadata", serde_json::to_vec(&dead).unwrap());
        t.seed("dead.content", br#"{"fileType":"pdf"}"#.to_vec());
        seed_document(&mut t, "lost", "Lost", "no-such-parent", "pdf");
        let root = DocumentRoot::load(t).unwrap();
        assert_eq!(names_under(&root, ROOT_ID), vec!["Live.pdf"]);
    }

    #[test]
    fn corrupt_metadata_drops_one_node_not_the_scan() {
        let mut t = InMemoryTransport::new();
        t.seed("bad.metadata", b"{ not json".to_vec());
        seed_document(&mut t, "good", "Good", "", "pdf");
        let root = DocumentRoot::load(t).unwrap();
        assert_eq!(names_under(&root, ROOT_ID), vec!["Good.pdf"]);
    }

    #[test]
    fn unknown_node_type_registers_but_never_lists() {
        let mut t = InMemoryTransport::new();
        t.seed("odd.metadata", meta_json("Odd", "", "TrashType"));
        seed_document(&mut t, "child", "Child", "odd", "pdf");
        let root = DocumentRoot::load(t).unwrap();
        assert!(root.node("odd").is_some());
        assert!(names_under(&root, ROOT_ID).is_empty());
    }

    #[test]
    fn document_without_payload_is_invisible() {
        let mut t = InMemoryTransport::new();
        t.seed("ghost.metadata", meta_json("Ghost", "", "DocumentType"));
        t.seed("ghost.content", br#"{"fileType":""}"#.to_vec());
        let root = DocumentRoot::load(t).unwrap();
        assert!(root.node("ghost").is_none());
    }

    #[test]
    fn upload_pdf_persists_content_payload_metadata() {
        let t = InMemoryTransport::new();
        let mut root = DocumentRoot::load(t).unwrap();
        let id = root.new_document(ROOT_ID, "Upload.pdf").unwrap();
        root.write(&id, 0, b"%PDF-1.4\nhello").unwrap();
        root.save(&id).unwrap();

        let t = &root.transport;
        assert_eq!(
            t.get(&format!("{}.content", id)).unwrap(),
            br#"{"fileType":"pdf"}"#
        );
        assert_eq!(t.get(&format!("{}.pdf", id)).unwrap(), b"%PDF-1.4\nhello");
        let meta: Metadata =
            serde_json::from_slice(t.get(&format!("{}.metadata", id)).unwrap()).unwrap();
        assert_eq!(meta.parent, "");
        assert_eq!(meta.node_type, NodeType::DocumentType);
        assert_eq!(meta.visible_name, "Upload");
        assert!(!meta.modified);

        // The pending node was promoted in place.
        assert!(matches!(root.node(&id), Some(Node::Document(_))));
        assert_eq!(names_under(&root, ROOT_ID), vec!["Upload.pdf"]);
    }

    #[test]
    fn unsupported_upload_unwinds_the_node() {
        let t = InMemoryTransport::new();
        let mut root = DocumentRoot::load(t).unwrap();
        let id = root.new_document(ROOT_ID, "junk.pdf").unwrap();
        root.write(&id, 0, b"hello world").unwrap();
        let err = root.save(&id).unwrap_err();
        assert!(matches!(err, RemfsError::Conversion(_)));
        assert!(root.node(&id).is_none());
        assert!(names_under(&root, ROOT_ID).is_empty());
        assert!(root.transport.write_log.is_empty());
    }

    #[test]
    fn dot_files_and_empty_probes_are_silent_non_events() {
        let t = InMemoryTransport::new();
        let mut root = DocumentRoot::load(t).unwrap();

        let dot = root.new_document(ROOT_ID, ".DS_Store").unwrap();
        root.write(&dot, 0, b"%PDF-1.4 x").unwrap();
        root.save(&dot).unwrap();
        assert!(root.transport.write_log.is_empty());

        let probe = root.new_document(ROOT_ID, "empty.pdf").unwrap();
        root.save(&probe).unwrap();
        assert!(root.transport.write_log.is_empty());
    }

    #[test]
    fn save_is_idempotent_per_mutation() {
        let mut t = InMemoryTransport::new();
        seed_document(&mut t, "a", "Book", "", "pdf");
        let mut root = DocumentRoot::load(t).unwrap();

        root.set_pinned("a", true).unwrap();
        let writes = root.transport.write_log.len();
        assert_eq!(writes, 1);
        root.save("a").unwrap();
        root.save("a").unwrap();
        assert_eq!(root.transport.write_log.len(), writes);
    }

    #[test]
    fn rename_across_folders_moves_and_bumps_version() {
        let mut t = InMemoryTransport::new();
        seed_collection(&mut t, "f", "Folder", "");
        seed_document(&mut t, "d", "D", "", "pdf");
        let mut root = DocumentRoot::load(t).unwrap();
        let before = root.node("d").unwrap().meta().version;

        root.rename("d", "f", "D.pdf").unwrap();

        assert_eq!(names_under(&root, "f"), vec!["D.pdf"]);
        assert!(!names_under(&root, ROOT_ID).contains(&"D.pdf".to_string()));
        let meta: Metadata =
            serde_json::from_slice(root.transport.get("d.metadata").unwrap()).unwrap();
        assert_eq!(meta.parent, "f");
        assert!(meta.version > before);
    }

    #[test]
    fn rename_strips_known_extensions_only() {
        let mut t = InMemoryTransport::new();
        seed_document(&mut t, "d", "D", "", "pdf");
        let mut root = DocumentRoot::load(t).unwrap();

        root.rename("d", ROOT_ID, "Notes.txt").unwrap();
        assert_eq!(root.node("d").unwrap().meta().visible_name, "Notes.txt");
        assert_eq!(names_under(&root, ROOT_ID), vec!["Notes.txt"]);

        root.rename("d", ROOT_ID, "Paper.pdf").unwrap();
        assert_eq!(root.node("d").unwrap().meta().visible_name, "Paper");
        assert_eq!(names_under(&root, ROOT_ID), vec!["Paper.pdf"]);
    }

    #[test]
    fn delete_persists_the_tombstone() {
        let mut t = InMemoryTransport::new();
        seed_document(&mut t, "d", "Doc", "", "pdf");
        let mut root = DocumentRoot::load(t).unwrap();
        root.delete("d").unwrap();

        assert!(names_under(&root, ROOT_ID).is_empty());
        let meta: Metadata =
            serde_json::from_slice(root.transport.get("d.metadata").unwrap()).unwrap();
        assert!(meta.deleted);
        assert!(!meta.synced);
    }

    #[test]
    fn new_collection_is_persisted_and_linked() {
        let t = InMemoryTransport::new();
        let mut root = DocumentRoot::load(t).unwrap();
        let id = root.new_collection(ROOT_ID, "Papers").unwrap();
        assert_eq!(names_under(&root, ROOT_ID), vec!["Papers"]);
        assert_eq!(root.transport.get(&format!("{}.content", id)).unwrap(), b"{}");
        let meta: Metadata = serde_json::from_slice(
            root.transport.get(&format!("{}.metadata", id)).unwrap(),
        )
        .unwrap();
        assert_eq!(meta.node_type, NodeType::CollectionType);
    }

    #[test]
    fn notebook_read_materialises_a_pdf() {
        let mut t = InMemoryTransport::new();
        seed_notebook(&mut t, "nb", "Sketches", "");
        let mut root = DocumentRoot::load(t).unwrap();
        let head = root.read("nb", 0, 4).unwrap();
        assert_eq!(head, b"%PDF");
        // Second read serves the memoised render.
        let tail = root.read("nb", 0, 1024).unwrap();
        assert!(tail.len() > 4);
        match root.node("nb") {
            Some(Node::Document(d)) => assert!(d.rendered.is_some()),
            _ => panic!("notebook should stay a document"),
        }
    }

    #[test]
    fn plain_documents_read_through_the_transport() {
        let mut t = InMemoryTransport::new();
        seed_document(&mut t, "d", "Book", "", "pdf");
        let mut root = DocumentRoot::load(t).unwrap();
        assert_eq!(root.read("d", 5, 3).unwrap(), b"1.4");
        assert!(matches!(
            root.read(ROOT_ID, 0, 10),
            Err(RemfsError::IsADirectory(_))
        ));
    }

    #[test]
    fn writes_to_persisted_documents_are_refused() {
        let mut t = InMemoryTransport::new();
        seed_document(&mut t, "d", "Book", "", "pdf");
        let mut root = DocumentRoot::load(t).unwrap();
        assert!(matches!(
            root.write("d", 0, b"x"),
            Err(RemfsError::NotPermitted)
        ));
        assert!(matches!(root.truncate("d", 0), Err(RemfsError::NotPermitted)));
    }

    #[test]
    fn bookmark_toggle_round_trips() {
        let mut t = InMemoryTransport::new();
        seed_document(&mut t, "d", "Book", "", "pdf");
        let mut root = DocumentRoot::load(t).unwrap();
        assert!(!root.pinned("d").unwrap());
        root.set_pinned("d", true).unwrap();
        assert!(root.pinned("d").unwrap());
        let meta: Metadata =
            serde_json::from_slice(root.transport.get("d.metadata").unwrap()).unwrap();
        assert!(meta.pinned);
    }

    #[test]
    fn slashes_in_visible_names_become_hyphens() {
        let mut t = InMemoryTransport::new();
        seed_document(&mut t, "d", "Reading/Writing", "", "pdf");
        let root = DocumentRoot::load(t).unwrap();
        assert_eq!(names_under(&root, ROOT_ID), vec!["Reading-Writing.pdf"]);
    }
}
