//! Change dispatcher
//!
//! Turns one [`ChangeEvent`] into remote mutations. Only file creations
//! act on the remote store; every other kind is reported back as
//! [`DispatchOutcome::Deferred`] so it stays visible to callers.
//!
//! ## Created files
//!
//! 1. Resolve the file's label-path in the mirror
//! 2. Found a directory: skip (a local file collides with a remote directory)
//! 3. Found a file: nothing to do
//! 4. Not found: materialize the containing directory, then upload
//!
//! Uploads of one label-path are serialized, and the mirror is checked again
//! once the gate is held. The watcher and the initial scan can both report
//! the same file, and only the first report uploads it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use drivemirror_core::domain::{LabelPath, RemoteItem, SyncPath};

use crate::materializer::Materializer;
use crate::mirror::RemoteTree;
use crate::resolver::Resolution;
use crate::uploader::Uploader;
use crate::watcher::{is_file_stable, ChangeEvent, EventKind};
use crate::SyncError;

/// Upper bound on stability rounds before uploading anyway
const MAX_STABILITY_ROUNDS: u32 = 20;

/// What [`ChangeDispatcher::dispatch`] did with an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The file was uploaded as this new node
    Uploaded(RemoteItem),
    /// A file already exists at the same label-path
    AlreadyPresent(RemoteItem),
    /// A remote directory already has the file's label-path
    SkippedDirectoryCollision(RemoteItem),
    /// The file's parent label-path names a remote file, not a directory
    SkippedNonDirectoryParent(RemoteItem),
    /// This kind of event is not acted upon
    Deferred(EventKind),
}

/// Reacts to filesystem change events under one watched root
#[derive(Debug)]
pub struct ChangeDispatcher {
    root: SyncPath,
    tree: Arc<RemoteTree>,
    materializer: Materializer,
    uploader: Uploader,
    stability_check_ms: u64,
    /// Per label-path upload gates, removed when the last holder leaves
    uploads: DashMap<LabelPath, Arc<Mutex<()>>>,
}

impl ChangeDispatcher {
    /// Creates a dispatcher for the local directory `root`
    ///
    /// # Errors
    /// Returns `SyncError::Domain` if `root` is not absolute.
    pub fn new(root: PathBuf, tree: Arc<RemoteTree>) -> Result<Self, SyncError> {
        Ok(Self {
            root: SyncPath::new(root)?,
            materializer: Materializer::new(Arc::clone(&tree)),
            uploader: Uploader::new(Arc::clone(&tree)),
            tree,
            stability_check_ms: 0,
            uploads: DashMap::new(),
        })
    }

    /// Waits for a new file's size to settle before uploading it
    #[must_use]
    pub fn with_stability_check(mut self, interval_ms: u64) -> Self {
        self.stability_check_ms = interval_ms;
        self
    }

    pub fn tree(&self) -> &Arc<RemoteTree> {
        &self.tree
    }

    /// Handles one event
    ///
    /// Events are independent: callers may dispatch many at once.
    ///
    /// # Errors
    /// Returns an error when the path lies outside the root or cannot be
    /// expressed as a label-path, when the file cannot be read, or when a
    /// remote call fails.
    #[instrument(skip(self), fields(kind = %event.kind()))]
    pub async fn dispatch(&self, event: ChangeEvent) -> Result<DispatchOutcome, SyncError> {
        match event {
            ChangeEvent::Created(path) => self.on_file_created(&path).await,
            ChangeEvent::Errored { path, message } => {
                warn!(path = ?path, message = %message, "Watcher reported an error");
                Ok(DispatchOutcome::Deferred(EventKind::Errored))
            }
            other => {
                debug!(path = ?other.path(), "Event kind not handled");
                Ok(DispatchOutcome::Deferred(other.kind()))
            }
        }
    }

    /// Label-path of an absolute local path under the root
    pub fn label_path_of(&self, path: &Path) -> Result<LabelPath, SyncError> {
        let sync_path = SyncPath::new(path.to_path_buf())?;
        let relative = sync_path
            .relative_to(&self.root)
            .map_err(|_| SyncError::PathNotInSyncRoot(path.to_path_buf()))?;
        Ok(LabelPath::from_relative(&relative)?)
    }

    async fn on_file_created(&self, path: &Path) -> Result<DispatchOutcome, SyncError> {
        let label_path = self.label_path_of(path)?;
        if label_path.is_root() {
            return Err(SyncError::InvalidPath(format!(
                "Created event for the sync root itself: {}",
                path.display()
            )));
        }

        if let Some(outcome) = self.existing_outcome(&label_path) {
            return Ok(outcome);
        }

        let gate = self
            .uploads
            .entry(label_path.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();

        let result = {
            let _held = gate.lock().await;
            self.create_file(path, &label_path).await
        };

        drop(gate);
        self.uploads
            .remove_if(&label_path, |_, gate| Arc::strong_count(gate) == 1);

        result
    }

    /// Outcome for a label-path the mirror already has a node for
    fn existing_outcome(&self, label_path: &LabelPath) -> Option<DispatchOutcome> {
        match self.tree.resolve(label_path) {
            Resolution::Found(node) if node.item.is_directory() => {
                info!(path = %label_path, "Skipping file, a remote directory has the same path");
                Some(DispatchOutcome::SkippedDirectoryCollision(node.item))
            }
            Resolution::Found(node) => {
                debug!(path = %label_path, id = %node.item.id, "File already on remote");
                Some(DispatchOutcome::AlreadyPresent(node.item))
            }
            Resolution::NotFound(_) => None,
        }
    }

    /// Uploads a file; the caller holds the label-path's gate
    async fn create_file(
        &self,
        path: &Path,
        label_path: &LabelPath,
    ) -> Result<DispatchOutcome, SyncError> {
        // An earlier holder may have uploaded it
        if let Some(outcome) = self.existing_outcome(label_path) {
            return Ok(outcome);
        }

        self.wait_until_stable(path).await;

        let parent = self.materializer.materialize_parent_of(label_path).await?;
        if !parent.is_directory() {
            info!(
                path = %label_path,
                parent = %parent.label,
                "Skipping file, its parent path is a remote file"
            );
            return Ok(DispatchOutcome::SkippedNonDirectoryParent(parent));
        }

        info!(path = %label_path, parent = %parent.label, "Create");
        let item = self.uploader.upload(path, &parent).await?;
        Ok(DispatchOutcome::Uploaded(item))
    }

    /// Number of label-paths with an upload in progress or waiting
    pub fn uploads_in_progress(&self) -> usize {
        self.uploads.len()
    }

    async fn wait_until_stable(&self, path: &Path) {
        if self.stability_check_ms == 0 {
            return;
        }

        for _ in 0..MAX_STABILITY_ROUNDS {
            if is_file_stable(path, self.stability_check_ms).await {
                return;
            }
        }
        warn!(path = %path.display(), "File still changing, uploading current content");
    }
}
