//! Compression ladder.
//!
//! Profiles are tried strictly in order, from the most generous to the most
//! aggressive, until the encoder produces a file at or under the ceiling.

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info, warn};

use super::{MediaError, MediaIngestor, ValidationError};
use crate::adapters::EncodingProfile;

/// Largest file the downstream transcription API accepts (25 MiB)
pub const WHISPER_LIMIT_BYTES: u64 = 25 * 1024 * 1024;

/// Appended to the input stem to name the compressed copy
pub const COMPRESSED_SUFFIX: &str = "_compressed";

pub const COMPRESSED_EXTENSION: &str = ".mp3";

/// Default ladder: (bitrate, sample rate), most to least generous
const DEFAULT_LADDER: &[(&str, u32)] = &[
    ("128k", 44_100),
    ("96k", 32_000),
    ("64k", 22_050),
    ("48k", 16_000),
    ("32k", 12_000),
];

/// The default compression ladder
pub fn default_profiles() -> Vec<EncodingProfile> {
    DEFAULT_LADDER
        .iter()
        .map(|(bitrate, rate)| EncodingProfile::new(*bitrate, *rate))
        .collect()
}

impl MediaIngestor {
    /// Deterministic output path for an input file
    pub fn compressed_path_for(&self, input: &Path) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.audio_dir
            .join(format!("{}{}{}", stem, COMPRESSED_SUFFIX, COMPRESSED_EXTENSION))
    }

    /// Produce a copy of `input` no larger than the ceiling.
    ///
    /// An existing compressed copy within the ceiling is returned as is.
    pub async fn compress(&self, input: &Path) -> Result<PathBuf, MediaError> {
        if input.as_os_str().is_empty() {
            return Err(ValidationError::MissingInput.into());
        }

        let output = self.compressed_path_for(input);

        match fs::metadata(&output).await {
            Ok(meta) if meta.len() <= self.ceiling_bytes => {
                debug!(path = %output.display(), "Reusing compressed audio");
                return Ok(output);
            }
            Ok(meta) => {
                warn!(
                    path = %output.display(),
                    size = meta.len(),
                    "Existing compressed audio over the ceiling, regenerating"
                );
                remove_if_exists(&output).await?;
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(MediaError::io(&output, e)),
        }

        self.encoder.ensure_available().await?;

        let mut last_error: Option<MediaError> = None;

        for (attempt, profile) in self.profiles.iter().enumerate() {
            debug!(attempt = attempt + 1, profile = %profile, "Compressing audio");

            if let Err(e) = self.encoder.encode(input, &output, profile).await {
                warn!(profile = %profile, error = %e, "Compression profile failed");
                remove_if_exists(&output).await?;
                last_error = Some(e.into());
                continue;
            }

            match self.check_ceiling(&output).await {
                Ok(size) => {
                    info!(
                        path = %output.display(),
                        profile = %profile,
                        bytes = size,
                        "Audio compressed"
                    );
                    return Ok(output);
                }
                Err(e) => {
                    debug!(profile = %profile, error = %e, "Output over the ceiling");
                    remove_if_exists(&output).await?;
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| ValidationError::NoProfiles.into()))
    }

    /// Size of `path` if it fits the ceiling
    async fn check_ceiling(&self, path: &Path) -> Result<u64, MediaError> {
        let size = fs::metadata(path)
            .await
            .map_err(|e| MediaError::io(path, e))?
            .len();

        if size > self.ceiling_bytes {
            return Err(ValidationError::ExceedsCeiling {
                size,
                limit: self.ceiling_bytes,
            }
            .into());
        }
        Ok(size)
    }
}

async fn remove_if_exists(path: &Path) -> Result<(), MediaError> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(MediaError::io(path, e)),
    }
}
