//! In-memory remote store
//!
//! [`InMemoryRemoteStore`] implements [`IRemoteStore`] on top of a map held
//! in process memory. It backs the engine tests and the daemon's dry-run
//! mode, and records every insert so callers can assert on the exact
//! sequence of remote mutations.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use tracing::debug;
use uuid::Uuid;

use crate::domain::newtypes::RemoteId;
use crate::domain::node::{NodeKind, RemoteItem};
use crate::ports::remote_store::{FileContent, IRemoteStore, InsertRequest};

/// Label given to the root node created by [`InMemoryRemoteStore::new`]
pub const ROOT_LABEL: &str = "My Drive";

#[derive(Debug, Default)]
struct StoreState {
    /// Every known node, keyed by id
    nodes: HashMap<RemoteId, RemoteItem>,
    /// Ids in creation order, so listings are deterministic
    order: Vec<RemoteId>,
    /// File bodies, keyed by node id
    contents: HashMap<RemoteId, Vec<u8>>,
    /// Nodes created through `insert`, in call order
    inserted: Vec<RemoteItem>,
    /// Parents whose listing fails
    failing_lists: HashSet<RemoteId>,
    /// Parents under which inserts fail
    failing_inserts: HashSet<RemoteId>,
    /// Number of `list` calls served
    list_calls: usize,
}

/// A remote store that lives entirely in process memory
#[derive(Debug)]
pub struct InMemoryRemoteStore {
    root_id: RemoteId,
    state: Mutex<StoreState>,
    insert_delay: Option<Duration>,
}

impl InMemoryRemoteStore {
    /// Creates a store containing only a root directory with the given id
    pub fn new(root_id: RemoteId) -> Self {
        let mut state = StoreState::default();
        let root = RemoteItem::directory(root_id.clone(), ROOT_LABEL, None);
        state.order.push(root_id.clone());
        state.nodes.insert(root_id.clone(), root);

        Self {
            root_id,
            state: Mutex::new(state),
            insert_delay: None,
        }
    }

    /// Makes every `insert` sleep before completing
    ///
    /// Lets tests hold two concurrent creations open at the same time.
    #[must_use]
    pub fn with_insert_delay(mut self, delay: Duration) -> Self {
        self.insert_delay = Some(delay);
        self
    }

    /// Returns the id of the root node
    pub fn root_id(&self) -> &RemoteId {
        &self.root_id
    }

    /// Adds a pre-existing node, as if it had been created by another client
    ///
    /// # Errors
    /// Fails when the id is already taken or the parent is unknown
    pub fn seed(&self, item: RemoteItem) -> Result<RemoteItem> {
        let mut state = self.lock();
        if state.nodes.contains_key(&item.id) {
            bail!("Node {} already exists", item.id);
        }
        if let Some(parent) = &item.parent_id {
            if !state.nodes.contains_key(parent) {
                bail!("Parent {} does not exist", parent);
            }
        }
        state.order.push(item.id.clone());
        state.nodes.insert(item.id.clone(), item.clone());
        Ok(item)
    }

    /// Seeds a directory with a generated id
    ///
    /// # Errors
    /// Fails when the parent is unknown
    pub fn seed_directory(&self, parent: &RemoteId, label: &str) -> Result<RemoteItem> {
        let item = RemoteItem::directory(Self::fresh_id(), label, Some(parent.clone()));
        self.seed(item)
    }

    /// Seeds a file with a generated id and no content
    ///
    /// # Errors
    /// Fails when the parent is unknown
    pub fn seed_file(&self, parent: &RemoteId, label: &str) -> Result<RemoteItem> {
        let item = RemoteItem::file(
            Self::fresh_id(),
            label,
            parent.clone(),
            "application/octet-stream",
        );
        self.seed(item)
    }

    /// Makes every `list` of `parent` fail
    pub fn fail_list_of(&self, parent: &RemoteId) {
        self.lock().failing_lists.insert(parent.clone());
    }

    /// Makes every `insert` under `parent` fail
    pub fn fail_inserts_under(&self, parent: &RemoteId) {
        self.lock().failing_inserts.insert(parent.clone());
    }

    /// Removes every injected failure
    pub fn clear_failures(&self) {
        let mut state = self.lock();
        state.failing_lists.clear();
        state.failing_inserts.clear();
    }

    /// Nodes created through `insert`, in the order the calls completed
    pub fn inserted(&self) -> Vec<RemoteItem> {
        self.lock().inserted.clone()
    }

    /// Body of an uploaded file
    pub fn content_of(&self, id: &RemoteId) -> Option<Vec<u8>> {
        self.lock().contents.get(id).cloned()
    }

    /// Number of `list` calls served so far
    pub fn list_calls(&self) -> usize {
        self.lock().list_calls
    }

    /// Total number of nodes, root included
    pub fn len(&self) -> usize {
        self.lock().nodes.len()
    }

    /// Returns true when the store holds nothing but its root
    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }

    fn fresh_id() -> RemoteId {
        // A simple v4 UUID never contains whitespace or '/'
        RemoteId::new(Uuid::new_v4().simple().to_string())
            .unwrap_or_else(|_| unreachable!("uuid strings are valid remote ids"))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreState> {
        // A poisoned lock only means another test thread panicked mid-call
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait::async_trait]
impl IRemoteStore for InMemoryRemoteStore {
    async fn list(&self, parent: &RemoteId, exclude_discarded: bool) -> Result<Vec<RemoteItem>> {
        let mut state = self.lock();
        state.list_calls += 1;

        if state.failing_lists.contains(parent) {
            bail!("Simulated list failure for {}", parent);
        }
        if !state.nodes.contains_key(parent) {
            bail!("Not found: {}", parent);
        }

        let children: Vec<RemoteItem> = state
            .order
            .iter()
            .filter_map(|id| state.nodes.get(id))
            .filter(|item| item.parent_id.as_ref() == Some(parent))
            .filter(|item| !(exclude_discarded && item.trashed))
            .cloned()
            .collect();

        debug!(parent = %parent, count = children.len(), "InMemoryRemoteStore::list");
        Ok(children)
    }

    async fn get(&self, id: &RemoteId) -> Result<RemoteItem> {
        self.lock()
            .nodes
            .get(id)
            .cloned()
            .ok_or_else(|| anyhow!("Not found: {}", id))
    }

    async fn insert(&self, request: InsertRequest) -> Result<RemoteItem> {
        if let Some(delay) = self.insert_delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.lock();

        if state.failing_inserts.contains(&request.parent_id) {
            bail!("Simulated insert failure under {}", request.parent_id);
        }
        match state.nodes.get(&request.parent_id) {
            Some(parent) if parent.is_directory() => {}
            Some(_) => bail!("Parent {} is not a directory", request.parent_id),
            None => bail!("Not found: {}", request.parent_id),
        }

        let id = Self::fresh_id();
        let item = match (request.kind, request.content) {
            (NodeKind::Directory, _) => {
                RemoteItem::directory(id.clone(), request.label, Some(request.parent_id))
            }
            (NodeKind::File, content) => {
                let content = content.unwrap_or_else(|| FileContent {
                    content_type: "application/octet-stream".to_string(),
                    data: Vec::new(),
                });
                let item = RemoteItem::file(
                    id.clone(),
                    request.label,
                    request.parent_id,
                    content.content_type,
                );
                state.contents.insert(id.clone(), content.data);
                item
            }
        };

        debug!(id = %item.id, label = %item.label, kind = %item.kind, "InMemoryRemoteStore::insert");

        state.order.push(id.clone());
        state.nodes.insert(id, item.clone());
        state.inserted.push(item.clone());
        Ok(item)
    }
}
