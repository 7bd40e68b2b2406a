//! Remote store port (driven/secondary port)
//!
//! This module defines the narrow interface the reconciliation engine uses
//! to talk to the remote object store. The store is a flat graph of nodes
//! linked by parent ids; there is no path-based addressing here.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because errors at port boundaries are adapter-specific
//!   and don't need domain-level classification.
//! - Uses `#[async_trait]` for async trait methods.
//! - Exactly three capabilities are exposed: `list`, `get` and `insert`.

use crate::domain::newtypes::RemoteId;
use crate::domain::node::{NodeKind, RemoteItem};

/// Bytes and declared content type of a file being inserted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContent {
    /// MIME type sent along with the content
    pub content_type: String,
    /// The whole file body
    pub data: Vec<u8>,
}

/// Parameters for creating a node under an existing parent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertRequest {
    /// The node the new node is attached to
    pub parent_id: RemoteId,
    /// Display label of the new node
    pub label: String,
    /// Directory or file
    pub kind: NodeKind,
    /// Present for files, absent for directories
    pub content: Option<FileContent>,
}

impl InsertRequest {
    /// Builds a request that creates a directory
    pub fn directory(parent_id: RemoteId, label: impl Into<String>) -> Self {
        Self {
            parent_id,
            label: label.into(),
            kind: NodeKind::Directory,
            content: None,
        }
    }

    /// Builds a request that uploads a file
    pub fn file(
        parent_id: RemoteId,
        label: impl Into<String>,
        content_type: impl Into<String>,
        data: Vec<u8>,
    ) -> Self {
        Self {
            parent_id,
            label: label.into(),
            kind: NodeKind::File,
            content: Some(FileContent {
                content_type: content_type.into(),
                data,
            }),
        }
    }
}

/// Port trait for remote store operations
///
/// Implementations handle the wire protocol, authentication and error
/// mapping. They must not retry on their own behalf; the engine decides
/// what to do with a failed call.
#[async_trait::async_trait]
pub trait IRemoteStore: Send + Sync {
    /// Lists the direct children of `parent`
    ///
    /// # Arguments
    /// * `parent` - The node whose children are requested
    /// * `exclude_discarded` - Skip nodes that sit in the store's trash
    async fn list(&self, parent: &RemoteId, exclude_discarded: bool)
        -> anyhow::Result<Vec<RemoteItem>>;

    /// Retrieves a single node by id
    ///
    /// Used once at startup to fetch the root by its well-known identifier.
    async fn get(&self, id: &RemoteId) -> anyhow::Result<RemoteItem>;

    /// Creates a directory or uploads a file under an existing parent
    ///
    /// # Returns
    /// Metadata of the newly created node, including its fresh id
    async fn insert(&self, request: InsertRequest) -> anyhow::Result<RemoteItem>;
}
