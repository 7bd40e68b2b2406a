//! Tests for folder creation and file upload

use drivemirror_core::domain::NodeKind;
use drivemirror_core::ports::{IRemoteStore, InsertRequest};
use wiremock::matchers::{body_json, body_string_contains, header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use drivemirror_drive::client::FOLDER_MIME_TYPE;
use drivemirror_drive::provider::DriveRemoteStore;
use drivemirror_drive::DriveError;

use crate::common::{file_json, folder_json, id, setup_drive_mock, TOKEN};

#[tokio::test]
async fn test_create_folder_sends_metadata() {
    let (server, client) = setup_drive_mock().await;

    Mock::given(method("POST"))
        .and(path("/drive/v2/files"))
        .and(body_json(serde_json::json!({
            "title": "docs",
            "parents": [{"id": "root-id"}],
            "mimeType": FOLDER_MIME_TYPE
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(folder_json("d1", "docs", "root-id")))
        .expect(1)
        .mount(&server)
        .await;

    let store = DriveRemoteStore::new(client);
    let item = store
        .insert(InsertRequest::directory(id("root-id"), "docs"))
        .await
        .unwrap();

    assert_eq!(item.id, id("d1"));
    assert_eq!(item.kind, NodeKind::Directory);
    assert_eq!(item.parent_id, Some(id("root-id")));
}

#[tokio::test]
async fn test_upload_is_multipart_related() {
    let (server, client) = setup_drive_mock().await;

    Mock::given(method("POST"))
        .and(path("/upload/drive/v2/files"))
        .and(query_param("uploadType", "multipart"))
        .and(header("authorization", format!("Bearer {TOKEN}").as_str()))
        .and(body_string_contains(r#""title":"report.pdf""#))
        .and(body_string_contains(r#""parents":[{"id":"d1"}]"#))
        .and(body_string_contains("Content-Type: application/pdf"))
        .and(body_string_contains("%PDF-1.7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(file_json(
            "f1",
            "report.pdf",
            "d1",
            "application/pdf",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let store = DriveRemoteStore::new(client);
    let item = store
        .insert(InsertRequest::file(
            id("d1"),
            "report.pdf",
            "application/pdf",
            b"%PDF-1.7".to_vec(),
        ))
        .await
        .unwrap();

    assert_eq!(item.id, id("f1"));
    assert_eq!(item.kind, NodeKind::File);
    assert_eq!(item.content_type.as_deref(), Some("application/pdf"));
}

#[tokio::test]
async fn test_upload_content_type_header_has_boundary() {
    let (server, client) = setup_drive_mock().await;

    Mock::given(method("POST"))
        .and(path("/upload/drive/v2/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(file_json(
            "f1", "a.txt", "root-id", "text/plain",
        )))
        .mount(&server)
        .await;

    client
        .upload_file(&id("root-id"), "a.txt", "text/plain", b"hi".to_vec())
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let content_type = requests[0]
        .headers
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.starts_with("multipart/related; boundary=drivemirror-"));

    let boundary = content_type.trim_start_matches("multipart/related; boundary=");
    let body = String::from_utf8(requests[0].body.clone()).unwrap();
    assert!(body.starts_with(&format!("--{boundary}\r\n")));
    assert!(body.ends_with(&format!("--{boundary}--\r\n")));
}

#[tokio::test]
async fn test_insert_failure_is_reported() {
    let (server, client) = setup_drive_mock().await;

    Mock::given(method("POST"))
        .and(path("/drive/v2/files"))
        .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
            "error": {"code": 403, "message": "The user does not have sufficient permissions"}
        })))
        .mount(&server)
        .await;

    let store = DriveRemoteStore::new(client);
    let err = store
        .insert(InsertRequest::directory(id("root-id"), "docs"))
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<DriveError>(),
        Some(DriveError::Forbidden(_))
    ));
}
