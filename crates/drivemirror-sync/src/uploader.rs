//! Content uploader

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use drivemirror_core::domain::RemoteItem;
use drivemirror_core::ports::InsertRequest;

use crate::content_type;
use crate::mirror::RemoteTree;
use crate::SyncError;

/// Uploads local files under an existing remote directory
#[derive(Debug, Clone)]
pub struct Uploader {
    tree: Arc<RemoteTree>,
}

impl Uploader {
    pub fn new(tree: Arc<RemoteTree>) -> Self {
        Self { tree }
    }

    /// Uploads `local_path` as a new child of `parent` and records it in the mirror
    ///
    /// The content type comes from the file extension. The whole file is sent
    /// in one request; on failure nothing is recorded.
    ///
    /// # Errors
    /// - `SyncError::InvalidPath` if the file name is not valid UTF-8
    /// - `SyncError::Io` if the file cannot be read
    /// - `SyncError::RemoteCall` if the store rejects the upload
    pub async fn upload(
        &self,
        local_path: &Path,
        parent: &RemoteItem,
    ) -> Result<RemoteItem, SyncError> {
        let label = local_path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                SyncError::InvalidPath(format!(
                    "File name is missing or not UTF-8: {}",
                    local_path.display()
                ))
            })?;

        let content_type = content_type::for_path(local_path);
        let data = tokio::fs::read(local_path).await?;

        info!(
            path = %local_path.display(),
            parent = %parent.label,
            content_type,
            size = data.len(),
            "Uploading file"
        );

        let item = self
            .tree
            .store()
            .insert(InsertRequest::file(
                parent.id.clone(),
                label,
                content_type,
                data,
            ))
            .await
            .map_err(|e| SyncError::remote("insert", e))?;

        self.tree.insert_child(&parent.id, item.clone());
        Ok(item)
    }
}
