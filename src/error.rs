//! Error categories shared by the store and the ingestor.
//!
//! Each module defines its own error enum; `ErrorKind` is the coarse
//! category a boundary layer (HTTP handler, CLI) maps to a response.

use std::fmt;

/// Coarse error category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A referenced folder or document does not exist
    NotFound,

    /// Input rejected: oversized upload, bad identifier, audio over the ceiling
    Validation,

    /// The external transcoder is missing, failed or timed out
    Tool,

    /// The snapshot could not be written
    Persistence,

    /// Any other filesystem failure
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotFound => "not_found",
            Self::Validation => "validation",
            Self::Tool => "tool",
            Self::Persistence => "persistence",
            Self::Io => "io",
        };
        f.write_str(name)
    }
}
