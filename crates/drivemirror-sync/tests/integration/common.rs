//! Shared fixtures for engine integration tests

use std::path::{Path, PathBuf};
use std::sync::Arc;

use drivemirror_core::domain::{LabelPath, RemoteId};
use drivemirror_core::ports::InMemoryRemoteStore;
use drivemirror_sync::{ChangeDispatcher, ChangeEvent, RemoteTree};

pub fn id(s: &str) -> RemoteId {
    RemoteId::new(s.to_string()).unwrap()
}

pub fn lp(s: &str) -> LabelPath {
    LabelPath::from_relative(Path::new(s)).unwrap()
}

/// A store holding nothing but its root
pub fn empty_store() -> InMemoryRemoteStore {
    InMemoryRemoteStore::new(id("root"))
}

/// Hydrated mirror over `store`
pub async fn mirror(store: &Arc<InMemoryRemoteStore>) -> Arc<RemoteTree> {
    let tree = RemoteTree::bootstrap(store.clone(), &id("root"))
        .await
        .expect("bootstrap");
    Arc::new(tree)
}

/// A local root plus a dispatcher wired to a fresh mirror of `store`
pub struct Fixture {
    pub dir: tempfile::TempDir,
    pub store: Arc<InMemoryRemoteStore>,
    pub tree: Arc<RemoteTree>,
    pub dispatcher: Arc<ChangeDispatcher>,
}

impl Fixture {
    pub async fn new(store: InMemoryRemoteStore) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(store);
        let tree = mirror(&store).await;
        let dispatcher = ChangeDispatcher::new(dir.path().to_path_buf(), Arc::clone(&tree))
            .expect("dispatcher");
        Self {
            dir,
            store,
            tree,
            dispatcher: Arc::new(dispatcher),
        }
    }

    /// Writes a local file (creating parents) and returns its absolute path
    pub fn write(&self, relative: &str, content: &[u8]) -> PathBuf {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parents");
        }
        std::fs::write(&path, content).expect("write file");
        path
    }

    pub fn created(&self, relative: &str, content: &[u8]) -> ChangeEvent {
        ChangeEvent::Created(self.write(relative, content))
    }
}
