//! Adapter interfaces for external tools.
//!
//! The ingestor never shells out directly; it drives an `Encoder`, which lets
//! tests substitute a fake that succeeds, fails or oversizes per profile.

pub mod ffmpeg;

use std::fmt;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

// Re-export the ffmpeg adapter
pub use ffmpeg::FfmpegEncoder;

/// One rung of the compression ladder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodingProfile {
    /// Target bitrate as understood by the encoder, e.g. "64k"
    pub bitrate: String,

    /// Output sample rate in Hz
    pub sample_rate: u32,
}

impl EncodingProfile {
    pub fn new(bitrate: impl Into<String>, sample_rate: u32) -> Self {
        Self {
            bitrate: bitrate.into(),
            sample_rate,
        }
    }
}

impl fmt::Display for EncodingProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}Hz", self.bitrate, self.sample_rate)
    }
}

/// Errors from the external transcoder
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("{}", not_installed_message(.tool))]
    NotInstalled { tool: String },

    #[error("Failed to start {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} failed with exit code {code}: {stderr}")]
    Failed {
        tool: String,
        code: i32,
        stderr: String,
    },

    #[error("{tool} timed out after {after:?}")]
    TimedOut { tool: String, after: Duration },
}

/// Capability to re-encode an audio file with a given profile
#[async_trait]
pub trait Encoder: Send + Sync {
    /// Human-readable tool name
    fn name(&self) -> &str;

    /// Fail fast when the tool is not installed
    async fn ensure_available(&self) -> Result<(), ToolError>;

    /// Downmix `input` to mono and write it to `output` using `profile`.
    ///
    /// Overwrites `output` if it exists.
    async fn encode(
        &self,
        input: &Path,
        output: &Path,
        profile: &EncodingProfile,
    ) -> Result<(), ToolError>;
}

/// Whether `tool` names a file rather than a command looked up on PATH
pub(crate) fn is_explicit_path(tool: &str) -> bool {
    Path::new(tool).components().count() > 1
}

fn not_installed_message(tool: &str) -> String {
    if is_explicit_path(tool) {
        format!("{} does not exist or is not a file", tool)
    } else {
        format!("{} not found in PATH", tool)
    }
}
