//! DriveRemoteStore - IRemoteStore implementation for Google Drive v2
//!
//! Wraps the [`DriveClient`] and maps its wire types onto the store-neutral
//! [`RemoteItem`] records the sync engine works with.
//!
//! ## Design Notes
//!
//! - Uses `tokio::sync::RwLock` because `IRemoteStore` methods take `&self`
//!   while `DriveClient::set_access_token` needs `&mut self`. Calls only take
//!   the read side, so hydration can list many folders at once.
//! - No retries happen here; a failed call surfaces as an error carrying a
//!   [`DriveError`](crate::DriveError).

use anyhow::{bail, Result};
use tokio::sync::RwLock;
use tracing::debug;

use drivemirror_core::domain::{NodeKind, RemoteId, RemoteItem};
use drivemirror_core::ports::{IRemoteStore, InsertRequest};

use crate::client::DriveClient;

/// Remote store backed by the Drive v2 API
#[derive(Debug)]
pub struct DriveRemoteStore {
    client: RwLock<DriveClient>,
}

impl DriveRemoteStore {
    pub fn new(client: DriveClient) -> Self {
        Self {
            client: RwLock::new(client),
        }
    }

    /// Swaps in a freshly issued access token
    pub async fn set_access_token(&self, token: impl Into<String>) {
        self.client.write().await.set_access_token(token);
    }
}

#[async_trait::async_trait]
impl IRemoteStore for DriveRemoteStore {
    async fn list(&self, parent: &RemoteId, exclude_discarded: bool) -> Result<Vec<RemoteItem>> {
        debug!(parent = %parent, exclude_discarded, "DriveRemoteStore::list");

        let files = self
            .client
            .read()
            .await
            .list_children(parent, exclude_discarded)
            .await?;

        let mut items = Vec::with_capacity(files.len());
        for file in files {
            items.push(file.into_remote_item()?);
        }
        Ok(items)
    }

    async fn get(&self, id: &RemoteId) -> Result<RemoteItem> {
        debug!(id = %id, "DriveRemoteStore::get");

        let file = self.client.read().await.get_file(id).await?;
        Ok(file.into_remote_item()?)
    }

    async fn insert(&self, request: InsertRequest) -> Result<RemoteItem> {
        debug!(
            parent = %request.parent_id,
            label = %request.label,
            kind = %request.kind,
            "DriveRemoteStore::insert"
        );

        let client = self.client.read().await;
        let file = match (request.kind, request.content) {
            (NodeKind::Directory, _) => {
                client
                    .create_folder(&request.parent_id, &request.label)
                    .await?
            }
            (NodeKind::File, Some(content)) => {
                client
                    .upload_file(
                        &request.parent_id,
                        &request.label,
                        &content.content_type,
                        content.data,
                    )
                    .await?
            }
            (NodeKind::File, None) => bail!("File insert without content: {}", request.label),
        };

        let item = file.into_remote_item()?;
        debug!(id = %item.id, label = %item.label, "Node inserted");
        Ok(item)
    }
}
