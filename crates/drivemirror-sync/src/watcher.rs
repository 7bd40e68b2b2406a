//! File watching
//!
//! Provides a [`FileWatcher`] that wraps the `notify` crate to monitor the
//! watched root for changes, converting raw OS events into [`ChangeEvent`]
//! values.
//!
//! ## Architecture
//!
//! ```text
//! inotify / kqueue
//!       │
//!       ▼
//!  FileWatcher  ──→  mpsc::channel  ──→  ChangeDispatcher (one task per event)
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::scan::scan_new_directory;

// ============================================================================
// ChangeEvent
// ============================================================================

/// Kind tag of a [`ChangeEvent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Created,
    CreatedDirectory,
    Modified,
    Removed,
    RemovedDirectory,
    Errored,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Created => "created",
            EventKind::CreatedDirectory => "created_directory",
            EventKind::Modified => "modified",
            EventKind::Removed => "removed",
            EventKind::RemovedDirectory => "removed_directory",
            EventKind::Errored => "errored",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A filesystem change detected under the watched root
///
/// These events are the internal representation used by the dispatcher,
/// decoupled from the `notify` crate's raw event types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    /// A file appeared at the given path
    Created(PathBuf),
    /// A directory appeared at the given path
    CreatedDirectory(PathBuf),
    /// An existing file's content or metadata changed
    Modified(PathBuf),
    /// A file disappeared
    Removed(PathBuf),
    /// A directory disappeared
    RemovedDirectory(PathBuf),
    /// The watcher reported an error
    Errored {
        /// Path the error relates to, when known
        path: Option<PathBuf>,
        message: String,
    },
}

impl ChangeEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ChangeEvent::Created(_) => EventKind::Created,
            ChangeEvent::CreatedDirectory(_) => EventKind::CreatedDirectory,
            ChangeEvent::Modified(_) => EventKind::Modified,
            ChangeEvent::Removed(_) => EventKind::Removed,
            ChangeEvent::RemovedDirectory(_) => EventKind::RemovedDirectory,
            ChangeEvent::Errored { .. } => EventKind::Errored,
        }
    }

    /// Returns the path associated with this event, if any
    pub fn path(&self) -> Option<&Path> {
        match self {
            ChangeEvent::Created(p)
            | ChangeEvent::CreatedDirectory(p)
            | ChangeEvent::Modified(p)
            | ChangeEvent::Removed(p)
            | ChangeEvent::RemovedDirectory(p) => Some(p),
            ChangeEvent::Errored { path, .. } => path.as_deref(),
        }
    }
}

// ============================================================================
// FileWatcher
// ============================================================================

/// Watches a directory tree using the OS-native mechanism
///
/// On Linux this typically uses inotify. The watcher converts raw OS events
/// into [`ChangeEvent`] values and sends them through an mpsc channel.
///
/// ## Usage
///
/// ```ignore
/// let (mut watcher, rx) = FileWatcher::new()?;
/// watcher.watch(Path::new("/home/user/Drive"))?;
/// // rx.recv().await to get events
/// ```
pub struct FileWatcher {
    /// The underlying notify watcher instance
    watcher: RecommendedWatcher,
    /// Sender half of the channel, shared with the initial scan
    event_tx: mpsc::Sender<ChangeEvent>,
}

impl FileWatcher {
    /// Creates a new `FileWatcher`
    ///
    /// Returns the watcher and a receiver channel for consuming change events.
    /// Must be called from within a tokio runtime; the files of a directory
    /// that appears while watching are reported from a task on it.
    ///
    /// # Errors
    /// Returns an error if there is no current runtime or the underlying OS
    /// watcher cannot be created
    pub fn new() -> Result<(Self, mpsc::Receiver<ChangeEvent>)> {
        let runtime = Handle::try_current().context("File watcher needs a tokio runtime")?;
        let (event_tx, event_rx) = mpsc::channel::<ChangeEvent>(1024);
        let tx = event_tx.clone();

        info!("Initializing file watcher");

        let watcher = RecommendedWatcher::new(
            move |res: std::result::Result<notify::Event, notify::Error>| {
                let changes = match res {
                    Ok(event) => map_notify_event(&event),
                    Err(err) => {
                        error!(error = %err, "File watcher error");
                        vec![ChangeEvent::Errored {
                            path: err.paths.first().cloned(),
                            message: err.to_string(),
                        }]
                    }
                };

                forward_changes(changes, &tx, &runtime);
            },
            notify::Config::default(),
        )
        .context("Failed to create file watcher")?;

        Ok((Self { watcher, event_tx }, event_rx))
    }

    /// Starts watching a directory recursively
    ///
    /// # Errors
    /// Returns an error if the path cannot be watched (e.g., does not exist,
    /// insufficient permissions, or inotify watch limit reached)
    pub fn watch(&mut self, path: &Path) -> Result<()> {
        info!(path = %path.display(), "Starting recursive watch");

        self.watcher
            .watch(path, RecursiveMode::Recursive)
            .with_context(|| format!("Failed to watch path: {}", path.display()))
    }

    /// Stops watching a directory
    ///
    /// # Errors
    /// Returns an error if the path was not being watched
    pub fn unwatch(&mut self, path: &Path) -> Result<()> {
        info!(path = %path.display(), "Stopping watch");

        self.watcher
            .unwatch(path)
            .with_context(|| format!("Failed to unwatch path: {}", path.display()))
    }

    /// A sender feeding the same channel as the OS watcher
    pub fn sender(&self) -> mpsc::Sender<ChangeEvent> {
        self.event_tx.clone()
    }
}

/// Sends changes from the notify thread
///
/// A directory that appears is reported as a whole by the OS, so the files
/// already inside it are walked and reported as `Created` on the runtime.
fn forward_changes(changes: Vec<ChangeEvent>, tx: &mpsc::Sender<ChangeEvent>, runtime: &Handle) {
    for change in changes {
        let new_dir = match &change {
            ChangeEvent::CreatedDirectory(dir) => Some(dir.clone()),
            _ => None,
        };

        if let Err(e) = tx.blocking_send(change) {
            warn!(error = %e, "Failed to send change event (receiver dropped)");
            return;
        }

        if let Some(dir) = new_dir {
            let tx = tx.clone();
            runtime.spawn(async move {
                if let Err(e) = scan_new_directory(&dir, &tx).await {
                    warn!(dir = %dir.display(), error = %e, "Failed to report content of new directory");
                }
            });
        }
    }
}

// ============================================================================
// Event mapping - notify::Event → ChangeEvent
// ============================================================================

/// Classifies a path that appeared, using the hint when notify has one
fn appeared(path: &Path, is_dir_hint: Option<bool>) -> ChangeEvent {
    let is_dir = is_dir_hint.unwrap_or_else(|| path.is_dir());
    if is_dir {
        ChangeEvent::CreatedDirectory(path.to_path_buf())
    } else {
        ChangeEvent::Created(path.to_path_buf())
    }
}

/// Classifies a path that went away; without a hint it is assumed to be a file
fn disappeared(path: &Path, is_dir_hint: Option<bool>) -> ChangeEvent {
    if is_dir_hint == Some(true) {
        ChangeEvent::RemovedDirectory(path.to_path_buf())
    } else {
        ChangeEvent::Removed(path.to_path_buf())
    }
}

/// Converts a `notify::Event` into zero or more `ChangeEvent`s
///
/// Maps the notify event kinds as follows:
/// - `Create(Folder)` -> `CreatedDirectory`, other `Create(*)` -> `Created`
///   (or `CreatedDirectory` when the path is a directory)
/// - `Remove(Folder)` -> `RemovedDirectory`, other `Remove(*)` -> `Removed`
/// - `Modify(Name(To))` -> the path appeared, `Modify(Name(From))` -> it went away
/// - `Modify(Name(Both))` with 2 paths -> removal of the old path, then
///   appearance of the new one
/// - Other `Modify(*)` -> `Modified`
///
/// Access events and events without paths produce nothing.
fn map_notify_event(event: &notify::Event) -> Vec<ChangeEvent> {
    use notify::EventKind as Kind;

    let paths = &event.paths;
    let Some(first) = paths.first() else {
        debug!(kind = ?event.kind, "Ignoring event without paths");
        return Vec::new();
    };

    let mapped = match &event.kind {
        Kind::Create(CreateKind::Folder) => vec![appeared(first, Some(true))],
        Kind::Create(CreateKind::File) => vec![appeared(first, Some(false))],
        Kind::Create(_) => vec![appeared(first, None)],

        Kind::Remove(RemoveKind::Folder) => vec![disappeared(first, Some(true))],
        Kind::Remove(_) => vec![disappeared(first, Some(false))],

        Kind::Modify(ModifyKind::Name(RenameMode::To)) => vec![appeared(first, None)],
        Kind::Modify(ModifyKind::Name(RenameMode::From)) => vec![disappeared(first, None)],
        Kind::Modify(ModifyKind::Name(RenameMode::Both)) if paths.len() >= 2 => {
            let to = &paths[1];
            let is_dir = to.is_dir();
            vec![disappeared(first, Some(is_dir)), appeared(to, Some(is_dir))]
        }

        Kind::Modify(_) => vec![ChangeEvent::Modified(first.clone())],

        _ => {
            debug!(kind = ?event.kind, "Ignoring event kind");
            Vec::new()
        }
    };

    for change in &mapped {
        debug!(kind = %change.kind(), path = ?change.path(), "Mapped notify event");
    }
    mapped
}

// ============================================================================
// File stability check
// ============================================================================

/// Checks if a file is stable (not currently being written to)
///
/// Reads the file size twice, separated by `check_interval_ms` milliseconds.
/// If the size is the same both times, the file is considered stable.
///
/// # Returns
/// `true` if the file size is constant across both reads, `false` if it
/// changed or if the file could not be read.
pub async fn is_file_stable(path: &Path, check_interval_ms: u64) -> bool {
    let size_first = match tokio::fs::metadata(path).await {
        Ok(m) => m.len(),
        Err(err) => {
            warn!(
                path = %path.display(),
                error = %err,
                "Cannot read file metadata for stability check"
            );
            return false;
        }
    };

    tokio::time::sleep(Duration::from_millis(check_interval_ms)).await;

    let size_second = match tokio::fs::metadata(path).await {
        Ok(m) => m.len(),
        Err(err) => {
            warn!(
                path = %path.display(),
                error = %err,
                "Cannot read file metadata on second stability check"
            );
            return false;
        }
    };

    let stable = size_first == size_second;
    debug!(
        path = %path.display(),
        size_first,
        size_second,
        stable,
        "File stability check"
    );
    stable
}
