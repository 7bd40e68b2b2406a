//! Port definitions (hexagonal architecture interfaces)
//!
//! ## Ports Overview
//!
//! - [`IRemoteStore`] - list/get/insert against the remote node graph
//! - [`InMemoryRemoteStore`] - a process-local implementation of that port

pub mod in_memory;
pub mod remote_store;

pub use in_memory::InMemoryRemoteStore;
pub use remote_store::{FileContent, IRemoteStore, InsertRequest};
