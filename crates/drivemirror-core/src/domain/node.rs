//! Remote node metadata
//!
//! [`RemoteItem`] is the flat, parent-referencing record the remote store
//! hands out. It carries no children; the hierarchical view is built by the
//! mirror in the sync crate.

use serde::{Deserialize, Serialize};

use super::newtypes::RemoteId;

/// Type tag of a remote node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// A container node; may have children
    Directory,
    /// A content-bearing leaf node
    File,
}

impl NodeKind {
    /// Returns the lowercase tag used in logs
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Directory => "directory",
            NodeKind::File => "file",
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single node as reported by the remote store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteItem {
    /// Globally unique node identifier
    pub id: RemoteId,
    /// Display label (the "title" of the node)
    pub label: String,
    /// Directory or file
    pub kind: NodeKind,
    /// First declared parent; `None` for the root
    pub parent_id: Option<RemoteId>,
    /// Declared content type, if the store reports one
    pub content_type: Option<String>,
    /// Whether the store has the node in its trash
    pub trashed: bool,
}

impl RemoteItem {
    /// Creates a directory item
    pub fn directory(id: RemoteId, label: impl Into<String>, parent_id: Option<RemoteId>) -> Self {
        Self {
            id,
            label: label.into(),
            kind: NodeKind::Directory,
            parent_id,
            content_type: None,
            trashed: false,
        }
    }

    /// Creates a file item
    pub fn file(
        id: RemoteId,
        label: impl Into<String>,
        parent_id: RemoteId,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            id,
            label: label.into(),
            kind: NodeKind::File,
            parent_id: Some(parent_id),
            content_type: Some(content_type.into()),
            trashed: false,
        }
    }

    /// Returns true if the node is a directory
    #[must_use]
    pub fn is_directory(&self) -> bool {
        self.kind == NodeKind::Directory
    }
}
