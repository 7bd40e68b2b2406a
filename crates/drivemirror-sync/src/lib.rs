//! Drivemirror Sync - One-way reconciliation engine
//!
//! Bridges a local directory tree and a remote store whose nodes are linked
//! only by parent ids. Newly created local files are mirrored onto the remote
//! store, creating the missing directory chain first.
//!
//! ## Modules
//!
//! - [`mirror`] - In-memory copy of the remote graph, hydrated in parallel
//! - [`resolver`] - Local relative path to remote node lookup
//! - [`materializer`] - Creation of missing remote directory chains (single-flight)
//! - [`uploader`] - File uploads, with [`content_type`] inference
//! - [`dispatcher`] - Reaction to filesystem change events
//! - [`watcher`] - `notify` wrapper producing [`watcher::ChangeEvent`] values
//! - [`scan`] - Initial walk reporting pre-existing local content

pub mod content_type;
pub mod dispatcher;
pub mod materializer;
pub mod mirror;
pub mod resolver;
pub mod scan;
pub mod uploader;
pub mod watcher;

use std::path::PathBuf;

use thiserror::Error;

pub use dispatcher::{ChangeDispatcher, DispatchOutcome};
pub use materializer::Materializer;
pub use mirror::{HydrationReport, RemoteNode, RemoteTree};
pub use resolver::{ClosestAncestor, Resolution, ResolvedNode};
pub use uploader::Uploader;
pub use watcher::{ChangeEvent, EventKind};

/// Errors that can occur during synchronization operations
#[derive(Debug, Error)]
pub enum SyncError {
    /// A `list`, `get` or `insert` call to the remote store failed
    #[error("Remote {operation} failed: {source}")]
    RemoteCall {
        /// Name of the failed capability
        operation: &'static str,
        /// Adapter-specific cause
        #[source]
        source: anyhow::Error,
    },

    /// An I/O error occurred while reading local content
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The event path lies outside the watched root
    #[error("Path not within sync root: {0}")]
    PathNotInSyncRoot(PathBuf),

    /// The event path cannot be expressed as a label-path
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// The mirror does not know the requested node
    #[error("Mirror error: {0}")]
    Mirror(String),

    /// A domain-level error propagated from drivemirror-core
    #[error("Domain error: {0}")]
    Domain(#[from] drivemirror_core::domain::DomainError),
}

impl SyncError {
    /// Wraps a failed remote-store call
    pub fn remote(operation: &'static str, source: anyhow::Error) -> Self {
        Self::RemoteCall { operation, source }
    }

    /// Returns true for failures of the remote store itself
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::RemoteCall { .. })
    }
}
