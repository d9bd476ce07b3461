//! ffmpeg adapter for audio compression.
//!
//! Runs the `ffmpeg` binary as a subprocess, one invocation per profile.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use super::{is_explicit_path, Encoder, EncodingProfile, ToolError};

/// Default per-invocation timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// Encoder backed by the ffmpeg CLI
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    /// Binary name (looked up on PATH) or explicit path
    binary_path: String,

    /// Upper bound for a single invocation
    timeout: Duration,
}

impl Default for FfmpegEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegEncoder {
    /// Encoder using `ffmpeg` from PATH
    pub fn new() -> Self {
        Self::with_binary_path("ffmpeg")
    }

    /// Encoder using a custom binary path
    pub fn with_binary_path(binary_path: impl Into<String>) -> Self {
        Self {
            binary_path: binary_path.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the per-invocation timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn binary_path(&self) -> &str {
        &self.binary_path
    }

    /// Arguments for one compression run
    fn args(input: &Path, output: &Path, profile: &EncodingProfile) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-i".to_string(),
            input.to_string_lossy().into_owned(),
            "-vn".to_string(),
            "-ac".to_string(),
            "1".to_string(),
            "-acodec".to_string(),
            "libmp3lame".to_string(),
            "-b:a".to_string(),
            profile.bitrate.clone(),
            "-ar".to_string(),
            profile.sample_rate.to_string(),
            output.to_string_lossy().into_owned(),
        ]
    }
}

#[async_trait]
impl Encoder for FfmpegEncoder {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn ensure_available(&self) -> Result<(), ToolError> {
        match locate_binary(&self.binary_path) {
            Some(path) => {
                debug!(path = %path.display(), "Found transcoder");
                Ok(())
            }
            None => Err(ToolError::NotInstalled {
                tool: self.binary_path.clone(),
            }),
        }
    }

    async fn encode(
        &self,
        input: &Path,
        output: &Path,
        profile: &EncodingProfile,
    ) -> Result<(), ToolError> {
        let child = Command::new(&self.binary_path)
            .args(Self::args(input, output, profile))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ToolError::Spawn {
                tool: self.binary_path.clone(),
                source,
            })?;

        // Dropping the future on timeout kills the child
        let result = timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| ToolError::TimedOut {
                tool: self.binary_path.clone(),
                after: self.timeout,
            })?
            .map_err(|source| ToolError::Spawn {
                tool: self.binary_path.clone(),
                source,
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(ToolError::Failed {
                tool: self.binary_path.clone(),
                code: result.status.code().unwrap_or(-1),
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(())
    }
}

/// Resolve a binary the way a shell would: explicit paths as-is, bare names on PATH
fn locate_binary(binary: &str) -> Option<PathBuf> {
    let candidate = Path::new(binary);
    if is_explicit_path(binary) {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }

    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(binary))
        .find(|path| path.is_file())
}
