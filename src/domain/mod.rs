//! Domain types for the lecture library.
//!
//! This module contains the core data structures:
//! - Folder: A named group of documents
//! - Document: One uploaded recording and everything derived from it
//! - ProcessingStatus: Where a document is in its processing attempt

pub mod document;
pub mod folder;

use chrono::Utc;
use uuid::Uuid;

// Re-export commonly used types
pub use document::{Document, InvalidTransition, ProcessingStatus};
pub use folder::Folder;

/// Current time as epoch seconds (the timestamp unit stored on disk)
pub fn now_epoch() -> i64 {
    Utc::now().timestamp()
}

/// Generate a fresh opaque identifier
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}
