//! Google Drive v2 HTTP client
//!
//! Provides a typed client for the handful of Drive v2 endpoints the sync
//! engine relies on. Handles the bearer header, paging through child
//! listings, and encoding uploads as `multipart/related`.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use drivemirror_core::domain::RemoteId;
//! use drivemirror_drive::client::DriveClient;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = DriveClient::new("access-token-here");
//! let root = client.get_file(&RemoteId::new("root".to_string())?).await?;
//! println!("Root folder: {}", root.title);
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use drivemirror_core::domain::{NodeKind, RemoteId, RemoteItem};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::DriveError;

/// Base URL for Drive v2 metadata calls
pub const DRIVE_BASE_URL: &str = "https://www.googleapis.com/drive/v2";

/// Base URL for Drive v2 media uploads
pub const DRIVE_UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v2";

/// MIME type Drive uses to mark folders
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Largest page size `files.list` accepts
const MAX_RESULTS: u32 = 1000;

// ============================================================================
// Drive v2 wire types
// ============================================================================

/// Reference to a parent folder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentReference {
    pub id: String,
}

/// Status flags of a file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileLabels {
    #[serde(default)]
    pub trashed: bool,
}

/// A file resource as returned by Drive v2
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub mime_type: Option<String>,
    #[serde(default)]
    pub parents: Vec<ParentReference>,
    #[serde(default)]
    pub labels: FileLabels,
}

impl DriveFile {
    pub fn is_folder(&self) -> bool {
        self.mime_type.as_deref() == Some(FOLDER_MIME_TYPE)
    }

    /// Converts the wire resource into the store-neutral node record
    ///
    /// Only the first parent is kept; the root comes back without parents.
    pub fn into_remote_item(self) -> Result<RemoteItem, DriveError> {
        let kind = if self.is_folder() {
            NodeKind::Directory
        } else {
            NodeKind::File
        };

        let id = RemoteId::new(self.id)
            .map_err(|e| DriveError::InvalidResponse(format!("file id: {e}")))?;
        let parent_id = self
            .parents
            .into_iter()
            .next()
            .map(|p| RemoteId::new(p.id))
            .transpose()
            .map_err(|e| DriveError::InvalidResponse(format!("parent id: {e}")))?;

        Ok(RemoteItem {
            id,
            label: self.title,
            kind,
            parent_id,
            content_type: match kind {
                NodeKind::Directory => None,
                NodeKind::File => self.mime_type,
            },
            trashed: self.labels.trashed,
        })
    }
}

/// One page of a `files.list` response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    items: Vec<DriveFile>,
    next_page_token: Option<String>,
}

/// Metadata part of an insert
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewFile<'a> {
    title: &'a str,
    parents: Vec<ParentReference>,
    mime_type: &'a str,
}

/// Error envelope Drive wraps failures in
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

// ============================================================================
// DriveClient
// ============================================================================

/// HTTP client for Drive v2 calls
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct DriveClient {
    client: Client,
    base_url: String,
    upload_url: String,
    access_token: String,
}

impl DriveClient {
    /// Creates a client for the public Drive v2 endpoints
    pub fn new(access_token: impl Into<String>) -> Self {
        Self::with_base_urls(access_token, DRIVE_BASE_URL, DRIVE_UPLOAD_URL)
    }

    /// Creates a client against custom endpoints (useful for testing)
    pub fn with_base_urls(
        access_token: impl Into<String>,
        base_url: impl Into<String>,
        upload_url: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            upload_url: upload_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
        }
    }

    /// Updates the access token (e.g., after a token refresh)
    pub fn set_access_token(&mut self, token: impl Into<String>) {
        self.access_token = token.into();
        debug!("Updated DriveClient access token");
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn upload_url(&self) -> &str {
        &self.upload_url
    }

    /// Creates an authenticated request against the metadata endpoint
    ///
    /// # Arguments
    /// * `method` - HTTP method
    /// * `path` - API path relative to the base URL (e.g., "/files")
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client.request(method, &url).bearer_auth(&self.access_token)
    }

    /// Creates an authenticated request against the upload endpoint
    pub fn upload_request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.upload_url, path);
        self.client.request(method, &url).bearer_auth(&self.access_token)
    }

    /// Lists the direct children of a folder, following every page
    ///
    /// # Arguments
    /// * `parent` - Folder id (`root` is accepted as an alias)
    /// * `exclude_trashed` - Adds `trashed = false` to the query
    pub async fn list_children(
        &self,
        parent: &RemoteId,
        exclude_trashed: bool,
    ) -> Result<Vec<DriveFile>> {
        let query = children_query(parent, exclude_trashed);
        let max_results = MAX_RESULTS.to_string();
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;
        let mut pages = 0u32;

        loop {
            let mut params = vec![("q", query.as_str()), ("maxResults", max_results.as_str())];
            if let Some(token) = page_token.as_deref() {
                params.push(("pageToken", token));
            }

            let response = self
                .request(Method::GET, "/files")
                .query(&params)
                .send()
                .await
                .context("Failed to send files.list request")?;
            let page: FileList = check_status(response, "files.list")
                .await?
                .json()
                .await
                .context("Failed to parse files.list response")?;

            pages += 1;
            files.extend(page.items);
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        debug!(
            parent = %parent,
            count = files.len(),
            pages,
            "Listed children"
        );
        Ok(files)
    }

    /// Retrieves one file resource by id
    pub async fn get_file(&self, id: &RemoteId) -> Result<DriveFile> {
        let path = format!("/files/{}", id.as_str());
        debug!(id = %id, "Fetching file metadata");

        let response = self
            .request(Method::GET, &path)
            .send()
            .await
            .context("Failed to send files.get request")?;
        check_status(response, "files.get")
            .await?
            .json()
            .await
            .context("Failed to parse files.get response")
    }

    /// Creates a folder under `parent`
    pub async fn create_folder(&self, parent: &RemoteId, title: &str) -> Result<DriveFile> {
        let body = NewFile {
            title,
            parents: vec![ParentReference {
                id: parent.as_str().to_string(),
            }],
            mime_type: FOLDER_MIME_TYPE,
        };

        let response = self
            .request(Method::POST, "/files")
            .json(&body)
            .send()
            .await
            .context("Failed to send folder insert request")?;
        check_status(response, "files.insert")
            .await?
            .json()
            .await
            .context("Failed to parse folder insert response")
    }

    /// Uploads a file under `parent` in a single multipart request
    pub async fn upload_file(
        &self,
        parent: &RemoteId,
        title: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> Result<DriveFile> {
        let metadata = NewFile {
            title,
            parents: vec![ParentReference {
                id: parent.as_str().to_string(),
            }],
            mime_type: content_type,
        };
        let metadata =
            serde_json::to_vec(&metadata).context("Failed to encode upload metadata")?;

        let boundary = format!("drivemirror-{}", uuid::Uuid::new_v4().simple());
        let size = data.len();
        let body = multipart_related(&boundary, &metadata, content_type, &data);

        debug!(title, content_type, size, "Uploading file content");
        let response = self
            .upload_request(Method::POST, "/files")
            .query(&[("uploadType", "multipart")])
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={boundary}"),
            )
            .body(body)
            .send()
            .await
            .context("Failed to send upload request")?;
        check_status(response, "files.insert")
            .await?
            .json()
            .await
            .context("Failed to parse upload response")
    }
}

/// Search query selecting the children of `parent`
fn children_query(parent: &RemoteId, exclude_trashed: bool) -> String {
    let escaped = parent.as_str().replace('\\', "\\\\").replace('\'', "\\'");
    if exclude_trashed {
        format!("trashed = false and '{escaped}' in parents")
    } else {
        format!("'{escaped}' in parents")
    }
}

/// Encodes metadata and content as a two-part `multipart/related` body
fn multipart_related(boundary: &str, metadata: &[u8], content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(metadata.len() + data.len() + 256);
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(metadata);
    body.extend_from_slice(format!("\r\n--{boundary}\r\n").as_bytes());
    body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

/// Turns a non-success response into a classified [`DriveError`]
async fn check_status(response: Response, operation: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorEnvelope>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body);
    warn!(operation, status = status.as_u16(), message = %message, "Drive call failed");

    Err(DriveError::from_status(status, format!("{operation}: {message}")).into())
}
