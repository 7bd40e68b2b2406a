//! Shared test helpers for Drive v2 integration tests
//!
//! Provides a wiremock server laid out like the public API, with metadata
//! calls under `/drive/v2` and uploads under `/upload/drive/v2`.

use drivemirror_core::domain::RemoteId;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use drivemirror_drive::client::{DriveClient, FOLDER_MIME_TYPE};

pub const TOKEN: &str = "test-access-token";

/// Starts a mock server and returns a client pointing at it
pub async fn setup_drive_mock() -> (MockServer, DriveClient) {
    let server = MockServer::start().await;
    let client = DriveClient::with_base_urls(
        TOKEN,
        format!("{}/drive/v2", server.uri()),
        format!("{}/upload/drive/v2", server.uri()),
    );
    (server, client)
}

pub fn id(s: &str) -> RemoteId {
    RemoteId::new(s.to_string()).unwrap()
}

pub fn folder_json(id: &str, title: &str, parent: &str) -> serde_json::Value {
    serde_json::json!({
        "kind": "drive#file",
        "id": id,
        "title": title,
        "mimeType": FOLDER_MIME_TYPE,
        "parents": [{"id": parent}],
        "labels": {"trashed": false}
    })
}

pub fn file_json(id: &str, title: &str, parent: &str, mime: &str) -> serde_json::Value {
    serde_json::json!({
        "kind": "drive#file",
        "id": id,
        "title": title,
        "mimeType": mime,
        "parents": [{"id": parent}],
        "labels": {"trashed": false}
    })
}

/// Mounts `GET /drive/v2/files/root` answering with the root folder
pub async fn mount_root(server: &MockServer, root_id: &str) {
    Mock::given(method("GET"))
        .and(path("/drive/v2/files/root"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "kind": "drive#file",
            "id": root_id,
            "title": "My Drive",
            "mimeType": FOLDER_MIME_TYPE,
            "parents": [],
            "labels": {"trashed": false}
        })))
        .mount(server)
        .await;
}
