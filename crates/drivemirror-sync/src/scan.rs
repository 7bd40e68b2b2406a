//! Local tree walks
//!
//! Content that already exists when the daemon starts is reported the same
//! way the watcher reports new content, so it goes through the usual
//! dispatch path. Files already on the remote store resolve and are skipped
//! there.
//!
//! The same walk runs for a directory that appears while watching (moved in
//! from elsewhere, or extracted in one go): the OS only reports the
//! directory itself, so its files are reported here.
//!
//! Symbolic links to files are reported like files. Symbolic links to
//! directories are not followed, so a link back to an ancestor cannot make
//! the walk revisit the tree.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::watcher::ChangeEvent;

/// Counts of what a walk reported
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub files: usize,
    pub directories: usize,
}

/// Walks `root` and sends a creation event for everything below it
///
/// A directory is always reported before its contents. Entries that are
/// neither files nor directories (sockets, broken links) are skipped.
///
/// # Errors
/// Fails if `root` cannot be read or the receiver is dropped.
pub async fn scan_existing(root: &Path, tx: &mpsc::Sender<ChangeEvent>) -> Result<ScanSummary> {
    let mut summary = ScanSummary::default();
    walk(root, tx, true, &mut summary).await?;

    info!(
        root = %root.display(),
        files = summary.files,
        directories = summary.directories,
        "Initial scan complete"
    );
    Ok(summary)
}

/// Walks a directory that just appeared and sends `Created` for each file in it
///
/// Nested directories are walked but not reported; the caller already has
/// the event for `dir` itself.
///
/// # Errors
/// Fails if `dir` cannot be read or the receiver is dropped.
pub async fn scan_new_directory(dir: &Path, tx: &mpsc::Sender<ChangeEvent>) -> Result<ScanSummary> {
    let mut summary = ScanSummary::default();
    walk(dir, tx, false, &mut summary).await?;

    debug!(
        dir = %dir.display(),
        files = summary.files,
        "Reported content of new directory"
    );
    Ok(summary)
}

/// What a directory entry is, without following directory links
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum EntryKind {
    File,
    Directory,
    Other,
}

async fn classify(entry: &tokio::fs::DirEntry) -> std::io::Result<EntryKind> {
    let file_type = entry.file_type().await?;
    if file_type.is_dir() {
        return Ok(EntryKind::Directory);
    }
    if file_type.is_file() {
        return Ok(EntryKind::File);
    }
    if file_type.is_symlink() {
        // Target metadata; a dangling link fails here and is skipped
        let target = tokio::fs::metadata(entry.path()).await?;
        if target.is_file() {
            return Ok(EntryKind::File);
        }
        if target.is_dir() {
            debug!(path = %entry.path().display(), "Not following directory link");
        }
    }
    Ok(EntryKind::Other)
}

fn walk<'a>(
    dir: &'a Path,
    tx: &'a mpsc::Sender<ChangeEvent>,
    report_directories: bool,
    summary: &'a mut ScanSummary,
) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
    Box::pin(async move {
        let mut entries = tokio::fs::read_dir(dir)
            .await
            .with_context(|| format!("Failed to read directory: {}", dir.display()))?;

        let mut listed: Vec<(PathBuf, EntryKind)> = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            match classify(&entry).await {
                Ok(kind) => listed.push((entry.path(), kind)),
                Err(err) => {
                    warn!(path = %entry.path().display(), error = %err, "Skipping unreadable entry");
                }
            }
        }
        // Sorted so the order of reported events is stable
        listed.sort();

        for (path, kind) in listed {
            match kind {
                EntryKind::Directory => {
                    summary.directories += 1;
                    if report_directories {
                        send(tx, ChangeEvent::CreatedDirectory(path.clone())).await?;
                    }
                    walk(&path, tx, report_directories, summary).await?;
                }
                EntryKind::File => {
                    summary.files += 1;
                    send(tx, ChangeEvent::Created(path)).await?;
                }
                EntryKind::Other => {
                    debug!(path = %path.display(), "Skipping special file");
                }
            }
        }

        Ok(())
    })
}

async fn send(tx: &mpsc::Sender<ChangeEvent>, event: ChangeEvent) -> Result<()> {
    tx.send(event)
        .await
        .context("Change event receiver dropped during scan")
}
