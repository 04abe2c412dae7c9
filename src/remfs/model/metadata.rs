//! The per-node JSON records the tablet persists: one `<id>.metadata`
//! and one `<id>.content` file per node.
//!
//! Field names follow the device's mixed conventions exactly
//! (`visibleName` but `metadatamodified`); serde renames keep the Rust
//! side idiomatic while round-tripping the wire form unchanged.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Node kind tag as stored in the `type` field.
///
/// The device has grown node types over firmware revisions; anything we
/// do not recognise degrades to [`NodeType::Unknown`], which is
/// registered (so its children can still find their parent) but never
/// listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeType {
    CollectionType,
    DocumentType,
    #[serde(other)]
    Unknown,
}

/// One `<id>.metadata` record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub deleted: bool,
    #[serde(rename = "lastModified")]
    pub last_modified: String,
    pub metadatamodified: bool,
    pub modified: bool,
    pub parent: String,
    pub pinned: bool,
    pub synced: bool,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub version: u64,
    #[serde(rename = "visibleName")]
    pub visible_name: String,
}

impl Metadata {
    /// Fresh metadata for a node created through the filesystem.
    pub fn new(node_type: NodeType, name: &str, parent: &str) -> Self {
        Self {
            deleted: false,
            last_modified: Utc::now().timestamp_millis().to_string(),
            metadatamodified: true,
            modified: true,
            parent: parent.to_string(),
            pinned: false,
            synced: false,
            node_type,
            version: 1,
            visible_name: name.to_string(),
        }
    }

    /// Milliseconds since the epoch, parsed from the stringified field.
    /// Unparseable values degrade to zero rather than failing a load.
    pub fn last_modified_ms(&self) -> u64 {
        self.last_modified.parse().unwrap_or(0)
    }

    /// Mutation bundle: the device expects every metadata edit to bump
    /// the version, drop the synced flag and raise `metadatamodified`.
    /// All setters below funnel through here so the invariant cannot be
    /// half-applied.
    fn touch(&mut self) {
        self.version += 1;
        self.synced = false;
        self.metadatamodified = true;
    }

    pub fn set_visible_name(&mut self, name: &str) {
        self.touch();
        self.visible_name = name.to_string();
    }

    pub fn set_parent(&mut self, parent: &str) {
        self.touch();
        self.parent = parent.to_string();
    }

    pub fn set_deleted(&mut self, deleted: bool) {
        self.touch();
        self.deleted = deleted;
    }

    pub fn set_pinned(&mut self, pinned: bool) {
        self.touch();
        self.pinned = pinned;
    }

    /// The data-modified flag, raised when a document's payload changes.
    pub fn set_data_modified(&mut self, modified: bool) {
        self.touch();
        self.modified = modified;
    }
}

/// One `<id>.content` record. Documents carry at least `fileType`;
/// collections persist an empty object. Extra fields written by newer
/// firmware are tolerated and dropped.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Content {
    #[serde(rename = "fileType", default)]
    pub file_type: String,
}
