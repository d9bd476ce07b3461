//! Durable metadata storage.
//!
//! This module contains:
//! - MetadataSnapshot: The folder/document graph and its on-disk file
//! - MetadataStore: Locked, persisted access to the graph

pub mod snapshot;
pub mod store;

// Re-export commonly used types
pub use snapshot::{MetadataSnapshot, SnapshotFile, StagedSnapshot};
pub use store::{EntityKind, MetadataStore, StoreError, SNAPSHOT_FILE_NAME};
