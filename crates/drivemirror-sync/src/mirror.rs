//! Remote tree mirror
//!
//! [`RemoteTree`] keeps an owned, in-memory copy of the remote graph rooted
//! at the store's well-known root. Each directory node either holds the full
//! set of its children (after a completed `list`) or is marked as not
//! fetched; a partially listed directory is never visible.
//!
//! ## Hydration
//!
//! ```text
//!   hydrate(root)
//!      ├── list(root) ─┬─ fetch(docs) ─┬─ fetch(2024)
//!      │               │               └─ fetch(drafts)
//!      │               └─ fetch(photos)
//!      └── join_all barrier, then graft the detached subtree under the lock
//! ```
//!
//! Subtrees are fetched off-lock and grafted in one write, so readers never
//! wait on the network. The mirror only grows: grafting merges into what is
//! already there and never drops a node.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use futures_util::future::join_all;
use tracing::{debug, info, warn};

use drivemirror_core::domain::{RemoteId, RemoteItem};
use drivemirror_core::ports::IRemoteStore;

use crate::SyncError;

// ============================================================================
// RemoteNode
// ============================================================================

/// A node of the mirror together with the children it owns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteNode {
    item: RemoteItem,
    /// `None` until the directory has been listed; always `None` for files
    children: Option<BTreeMap<RemoteId, RemoteNode>>,
}

impl RemoteNode {
    /// A node whose children have not been fetched
    pub fn unfetched(item: RemoteItem) -> Self {
        Self {
            item,
            children: None,
        }
    }

    /// A node known to have no children yet
    ///
    /// Used for directories this process just created.
    pub fn empty(item: RemoteItem) -> Self {
        let children = item.is_directory().then(BTreeMap::new);
        Self { item, children }
    }

    pub fn item(&self) -> &RemoteItem {
        &self.item
    }

    /// Returns true once the directory's children are fully known
    pub fn is_fetched(&self) -> bool {
        self.children.is_some()
    }

    /// Direct children in id order; empty when not fetched
    pub fn children(&self) -> impl Iterator<Item = &RemoteNode> {
        self.children.iter().flat_map(|c| c.values())
    }

    /// Number of nodes in this subtree, this one included
    pub fn len(&self) -> usize {
        1 + self.children().map(RemoteNode::len).sum::<usize>()
    }

    /// Always false: a subtree contains at least its own root
    pub fn is_empty(&self) -> bool {
        false
    }

    fn find(&self, id: &RemoteId) -> Option<&RemoteNode> {
        if &self.item.id == id {
            return Some(self);
        }
        self.children.as_ref()?.values().find_map(|c| c.find(id))
    }

    fn find_mut(&mut self, id: &RemoteId) -> Option<&mut RemoteNode> {
        if &self.item.id == id {
            return Some(self);
        }
        self.children
            .as_mut()?
            .values_mut()
            .find_map(|c| c.find_mut(id))
    }

    /// Merges a freshly fetched copy of this node into it
    ///
    /// Returns the number of nodes that were not in the mirror before.
    fn graft(&mut self, fetched: RemoteNode) -> usize {
        let Some(fetched_children) = fetched.children else {
            return 0;
        };

        match &mut self.children {
            None => {
                let added = fetched_children.values().map(RemoteNode::len).sum();
                self.children = Some(fetched_children);
                added
            }
            Some(existing) => {
                let mut added = 0;
                for (id, child) in fetched_children {
                    match existing.get_mut(&id) {
                        Some(current) => added += current.graft(child),
                        None => {
                            added += child.len();
                            existing.insert(id, child);
                        }
                    }
                }
                added
            }
        }
    }
}

// ============================================================================
// HydrationReport
// ============================================================================

/// Outcome of a [`RemoteTree::hydrate`] call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HydrationReport {
    /// Directories whose listing completed
    pub directories_fetched: usize,
    /// Nodes that were new to the mirror
    pub nodes_added: usize,
    /// Listings that failed; each leaves one subtree unfetched
    pub failures: usize,
}

impl HydrationReport {
    /// Returns true when no listing failed
    pub fn is_complete(&self) -> bool {
        self.failures == 0
    }

    fn merge(&mut self, other: HydrationReport) {
        self.directories_fetched += other.directories_fetched;
        self.nodes_added += other.nodes_added;
        self.failures += other.failures;
    }
}

type FetchFuture<'a> = Pin<Box<dyn Future<Output = (RemoteNode, HydrationReport)> + Send + 'a>>;

/// Lists `item` and, in parallel, every directory below it
///
/// A failed listing is logged and leaves that node unfetched; its siblings
/// carry on.
fn fetch_subtree(store: &dyn IRemoteStore, item: RemoteItem) -> FetchFuture<'_> {
    Box::pin(async move {
        let mut report = HydrationReport::default();

        let listed = match store.list(&item.id, true).await {
            Ok(items) => items,
            Err(err) => {
                warn!(
                    id = %item.id,
                    label = %item.label,
                    error = %err,
                    "Failed to list remote directory, subtree left unfetched"
                );
                report.failures += 1;
                return (RemoteNode::unfetched(item), report);
            }
        };
        report.directories_fetched += 1;

        let (directories, files): (Vec<_>, Vec<_>) =
            listed.into_iter().partition(RemoteItem::is_directory);

        let nested = join_all(
            directories
                .into_iter()
                .map(|directory| fetch_subtree(store, directory)),
        )
        .await;

        let mut children = BTreeMap::new();
        for file in files {
            children.insert(file.id.clone(), RemoteNode::unfetched(file));
        }
        for (node, sub_report) in nested {
            report.merge(sub_report);
            children.insert(node.item.id.clone(), node);
        }

        debug!(id = %item.id, children = children.len(), "Fetched remote directory");

        (
            RemoteNode {
                item,
                children: Some(children),
            },
            report,
        )
    })
}

// ============================================================================
// RemoteTree
// ============================================================================

/// Shared, growing mirror of the remote graph
///
/// The lock is never held across an `.await`.
pub struct RemoteTree {
    store: Arc<dyn IRemoteStore>,
    root: RwLock<RemoteNode>,
}

impl RemoteTree {
    /// Creates a mirror holding only an unfetched root
    pub fn new(store: Arc<dyn IRemoteStore>, root: RemoteItem) -> Self {
        Self {
            store,
            root: RwLock::new(RemoteNode::unfetched(root)),
        }
    }

    /// Fetches the root by id and hydrates the whole tree below it
    ///
    /// # Errors
    /// Fails only when the root itself cannot be fetched; listing failures
    /// below it leave the mirror incomplete and are reported in the log.
    pub async fn bootstrap(
        store: Arc<dyn IRemoteStore>,
        root_id: &RemoteId,
    ) -> Result<Self, SyncError> {
        let root = store
            .get(root_id)
            .await
            .map_err(|e| SyncError::remote("get", e))?;

        let tree = Self::new(store, root);
        let root_id = tree.root_item().id;
        let report = tree.hydrate(&root_id).await?;

        info!(
            root = %root_id,
            nodes = tree.len(),
            directories = report.directories_fetched,
            failures = report.failures,
            "Remote tree retrieved"
        );

        Ok(tree)
    }

    /// The store this mirror was built from
    pub fn store(&self) -> &Arc<dyn IRemoteStore> {
        &self.store
    }

    pub fn root_item(&self) -> RemoteItem {
        self.read().item.clone()
    }

    /// Fetches the children of directory `id`, recursively, and merges them in
    ///
    /// # Errors
    /// Returns `SyncError::Mirror` when `id` is unknown or not a directory.
    /// Remote failures are not errors here; they are counted in the report.
    pub async fn hydrate(&self, id: &RemoteId) -> Result<HydrationReport, SyncError> {
        let item = self
            .get(id)
            .ok_or_else(|| SyncError::Mirror(format!("Unknown node: {id}")))?;
        if !item.is_directory() {
            return Err(SyncError::Mirror(format!("Not a directory: {id}")));
        }

        let (fetched, mut report) = fetch_subtree(self.store.as_ref(), item).await;

        let mut root = self.write();
        let node = root
            .find_mut(id)
            .ok_or_else(|| SyncError::Mirror(format!("Unknown node: {id}")))?;
        report.nodes_added = node.graft(fetched);

        debug!(
            id = %id,
            added = report.nodes_added,
            failures = report.failures,
            "Hydration finished"
        );
        Ok(report)
    }

    /// Looks a node up by id
    pub fn get(&self, id: &RemoteId) -> Option<RemoteItem> {
        self.read().find(id).map(|n| n.item.clone())
    }

    /// `Some(true)` once `id` has been listed, `None` if it is unknown
    pub fn is_fetched(&self, id: &RemoteId) -> Option<bool> {
        self.read().find(id).map(RemoteNode::is_fetched)
    }

    /// Direct children of `id`, or `None` if unknown or not fetched
    pub fn children_of(&self, id: &RemoteId) -> Option<Vec<RemoteItem>> {
        let root = self.read();
        let node = root.find(id)?;
        node.children
            .as_ref()
            .map(|c| c.values().map(|n| n.item.clone()).collect())
    }

    /// First directory child of `parent` labelled `label`, if the mirror has one
    pub fn find_directory_child(&self, parent: &RemoteId, label: &str) -> Option<RemoteItem> {
        let root = self.read();
        let found = root
            .find(parent)?
            .children()
            .map(RemoteNode::item)
            .find(|item| item.is_directory() && item.label == label)
            .cloned();
        found
    }

    /// Records a node the store just created under `parent`
    ///
    /// Returns false, and records nothing, when `parent` is unknown or has
    /// not been fetched; listing it later will pick the node up.
    pub fn insert_child(&self, parent: &RemoteId, item: RemoteItem) -> bool {
        let mut root = self.write();
        let Some(children) = root.find_mut(parent).and_then(|p| p.children.as_mut()) else {
            debug!(parent = %parent, id = %item.id, "Parent not fetched, node not recorded");
            return false;
        };

        children
            .entry(item.id.clone())
            .or_insert_with(|| RemoteNode::empty(item));
        true
    }

    /// Number of nodes in the mirror, root included
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Always false: the mirror contains at least its root
    pub fn is_empty(&self) -> bool {
        false
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, RemoteNode> {
        self.root.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, RemoteNode> {
        self.root.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for RemoteTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteTree")
            .field("root", &self.read().item.id)
            .field("nodes", &self.len())
            .finish_non_exhaustive()
    }
}
