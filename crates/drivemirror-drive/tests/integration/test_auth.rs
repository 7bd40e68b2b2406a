//! Tests for refresh-token exchange against a mocked token endpoint

use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use drivemirror_drive::auth::TokenRefresher;

async fn refresher(server: &MockServer) -> TokenRefresher {
    TokenRefresher::new("client-id", "client-secret", &format!("{}/token", server.uri())).unwrap()
}

#[tokio::test]
async fn test_refresh_returns_new_access_token() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=old-refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "fresh-access",
            "token_type": "Bearer",
            "expires_in": 3599
        })))
        .expect(1)
        .mount(&server)
        .await;

    let token = refresher(&server).await.refresh("old-refresh").await.unwrap();

    assert_eq!(token.access_token, "fresh-access");
    assert_eq!(token.refresh_token.as_deref(), Some("old-refresh"));
    assert!(!token.is_expired());
}

#[tokio::test]
async fn test_refresh_keeps_rotated_refresh_token() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "fresh-access",
            "refresh_token": "rotated-refresh",
            "token_type": "Bearer",
            "expires_in": 3600
        })))
        .mount(&server)
        .await;

    let token = refresher(&server).await.refresh("old-refresh").await.unwrap();
    assert_eq!(token.refresh_token.as_deref(), Some("rotated-refresh"));
}

#[tokio::test]
async fn test_rejected_refresh_fails() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_grant",
            "error_description": "Token has been expired or revoked."
        })))
        .mount(&server)
        .await;

    let result = refresher(&server).await.refresh("revoked").await;
    assert!(result.is_err());
}
