//! Integration tests for drivemirror-drive
//!
//! Uses wiremock to simulate the Drive v2 API and the OAuth2 token
//! endpoint, and verifies the client, the remote store adapter, and token
//! refresh end to end.

mod common;

mod test_auth;
mod test_insert;
