//! professor - lecture audio store with signed share links
//!
//! Keeps a small folder/document graph for recorded lectures, stores the
//! uploaded audio next to a copy compressed under the transcription API's
//! size limit, and hands out expiring links to rendered PDFs.
//!
//! # Architecture
//!
//! - The whole metadata graph lives in one JSON snapshot (`meta.json`),
//!   rewritten atomically on every mutation
//! - Media files are addressed by generated IDs, never by client names
//! - Share links are stateless: expiry and HMAC travel in the query string
//!
//! # Modules
//!
//! - `adapters`: External tools (ffmpeg)
//! - `core`: Metadata store and snapshot persistence
//! - `domain`: Data structures (Folder, Document)
//! - `ingest`: Upload storage and the compression ladder
//! - `share`: Signed, expiring links
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # File a lecture
//! professor folder create "Algorithms"
//! professor ingest week1.m4a --folder <folder-id>
//!
//! # Share its PDF once rendered
//! professor doc attach <doc-id> --pdf week1.pdf
//! professor share <doc-id>
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod error;
pub mod ingest;
pub mod share;

// Re-export main types at crate root for convenience
pub use crate::core::{MetadataStore, StoreError};
pub use domain::{Document, Folder, ProcessingStatus};
pub use error::ErrorKind;
pub use ingest::{MediaError, MediaIngestor, ValidationError};
pub use share::{LinkRejection, ShareService, SharedLink};

// Transcoding
pub use adapters::{Encoder, EncodingProfile, FfmpegEncoder, ToolError};
