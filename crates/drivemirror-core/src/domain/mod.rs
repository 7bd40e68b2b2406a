//! Domain types
//!
//! This module contains the core domain types for Drivemirror:
//! - Newtypes for remote identifiers, local paths and derived label-paths
//! - Remote node metadata
//! - Domain-specific error types

pub mod errors;
pub mod newtypes;
pub mod node;

// Re-export commonly used types
pub use errors::DomainError;
pub use newtypes::*;
pub use node::{NodeKind, RemoteItem};
