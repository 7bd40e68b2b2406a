//! Drivemirror Core - Domain types and port definitions
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain types** - `RemoteId`, `LabelPath`, `SyncPath`, `RemoteItem`
//! - **Port definitions** - the `IRemoteStore` trait that adapters implement,
//!   plus an in-memory implementation for tests and offline runs
//! - **Configuration** - typed YAML configuration with validation
//!
//! # Architecture
//!
//! The domain module contains plain data with no I/O. Ports define trait
//! interfaces that adapter crates implement; the reconciliation engine in
//! `drivemirror-sync` only ever talks to the remote store through them.

pub mod config;
pub mod domain;
pub mod ports;
