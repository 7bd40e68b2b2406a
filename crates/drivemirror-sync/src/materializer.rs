//! Directory materializer
//!
//! Creates the remote directories a local path needs, one segment at a time,
//! starting below the closest ancestor the mirror already knows.
//!
//! ## Single-flight creation
//!
//! Events are dispatched concurrently, so two files dropped into the same new
//! directory would both see the directory missing. Every creation therefore
//! goes through an in-flight registry keyed by the directory's label-path:
//!
//! ```text
//!   dispatch(x/a.txt) ──┐
//!                       ├──► registry["x"] ──► OnceCell ──► insert(root, "x")
//!   dispatch(x/b.txt) ──┘         (second caller awaits the same cell)
//! ```
//!
//! Inside the cell the parent is checked once more for a directory with the
//! same label, so a creation that raced with a hydration still reuses it.
//!
//! Once the directory is recorded in the mirror, the cell is evicted: later
//! callers resolve it from the mirror instead. A directory the mirror could
//! not record (its parent was never fetched) keeps its cell, so it is still
//! created only once.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use drivemirror_core::domain::{LabelPath, RemoteItem};
use drivemirror_core::ports::InsertRequest;

use crate::mirror::RemoteTree;
use crate::resolver::Resolution;
use crate::SyncError;

/// Creates missing directory chains on the remote store
#[derive(Debug)]
pub struct Materializer {
    tree: Arc<RemoteTree>,
    /// One creation handle per directory label-path
    in_flight: DashMap<LabelPath, Arc<OnceCell<RemoteItem>>>,
}

impl Materializer {
    pub fn new(tree: Arc<RemoteTree>) -> Self {
        Self {
            tree,
            in_flight: DashMap::new(),
        }
    }

    /// Returns the node at `dir`, creating every missing directory on the way
    ///
    /// When `dir` already resolves the existing node is returned as-is and
    /// nothing is created, even if that node is a file.
    ///
    /// # Errors
    /// Returns `SyncError::RemoteCall` if a creation fails. Directories
    /// created before the failure stay in place.
    pub async fn materialize(&self, dir: &LabelPath) -> Result<RemoteItem, SyncError> {
        let ancestor = match self.tree.resolve(dir) {
            Resolution::Found(node) => return Ok(node.item),
            Resolution::NotFound(ancestor) => ancestor,
        };

        let segments = dir.segments();
        debug!(
            path = %dir,
            ancestor = %ancestor.label_path,
            missing = segments.len() - ancestor.depth,
            "Materializing directory chain"
        );

        let mut parent = ancestor.item;
        let mut path = ancestor.label_path;
        for label in &segments[ancestor.depth..] {
            path = path.child(label);
            parent = self.create_directory(&parent, &path, label).await?;
        }

        Ok(parent)
    }

    /// Materializes the directory that contains `file`
    ///
    /// # Errors
    /// Returns `SyncError::InvalidPath` for the root, which has no parent.
    pub async fn materialize_parent_of(&self, file: &LabelPath) -> Result<RemoteItem, SyncError> {
        let parent = file
            .parent()
            .ok_or_else(|| SyncError::InvalidPath("the sync root has no parent".to_string()))?;
        self.materialize(&parent).await
    }

    /// Number of directory label-paths held in the registry
    ///
    /// Counts creations in progress and created directories the mirror
    /// could not record.
    pub fn registered(&self) -> usize {
        self.in_flight.len()
    }

    async fn create_directory(
        &self,
        parent: &RemoteItem,
        path: &LabelPath,
        label: &str,
    ) -> Result<RemoteItem, SyncError> {
        let cell = self
            .in_flight
            .entry(path.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .value()
            .clone();

        let item = cell
            .get_or_try_init(|| async {
                if let Some(existing) = self.tree.find_directory_child(&parent.id, label) {
                    debug!(path = %path, id = %existing.id, "Directory already present");
                    return Ok(existing);
                }

                info!(path = %path, parent = %parent.label, "Creating remote directory");
                let created = self
                    .tree
                    .store()
                    .insert(InsertRequest::directory(parent.id.clone(), label))
                    .await
                    .map_err(|e| SyncError::remote("insert", e))?;

                self.tree.insert_child(&parent.id, created.clone());
                Ok::<_, SyncError>(created)
            })
            .await?
            .clone();

        drop(cell);
        let recorded = self
            .tree
            .find_directory_child(&parent.id, label)
            .is_some_and(|found| found.id == item.id);
        if recorded {
            self.in_flight.remove_if(path, |_, cell| cell.initialized());
        }

        Ok(item)
    }
}
