//! Integration tests for drivemirror-sync
//!
//! Drives the reconciliation engine against the in-memory remote store and
//! a temporary local root, checking the remote mutations it produces.

mod common;

mod test_concurrency;
mod test_dispatch;
mod test_resolution;
