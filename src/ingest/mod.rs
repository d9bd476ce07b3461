//! Audio ingestion into the content directory.
//!
//! The ingestor owns the on-disk media layout:
//!
//! ```text
//! <data_dir>/
//! ├── audio/
//! │   ├── <uuid>.<ext>                 # upload as received
//! │   └── <uuid>_compressed.mp3        # copy under the hard ceiling
//! └── pdf/
//!     └── <document_id>.pdf
//! ```
//!
//! 1. **Upload**: sniff, name and stream the upload with a size bound
//! 2. **Compress**: walk the profile ladder until the output fits the ceiling

pub mod compress;
pub mod sniff;
pub mod upload;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::fs;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tracing::info;

use crate::adapters::{Encoder, EncodingProfile, FfmpegEncoder, ToolError};
use crate::error::ErrorKind;

// Re-export key types
pub use compress::{default_profiles, COMPRESSED_EXTENSION, COMPRESSED_SUFFIX, WHISPER_LIMIT_BYTES};
pub use sniff::{ContentSniffer, SignatureSniffer};

/// Input rejected by the ingestor
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Audio file exceeds maximum size of {limit} bytes")]
    UploadTooLarge { limit: u64 },

    #[error("No audio path provided for compression")]
    MissingInput,

    #[error(
        "Compressed audio size {:.2} MB exceeds limit of {:.2} MB",
        megabytes(.size),
        megabytes(.limit)
    )]
    ExceedsCeiling { size: u64, limit: u64 },

    #[error("No compression profiles configured")]
    NoProfiles,

    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),
}

/// Errors that can occur while ingesting media
#[derive(Debug, Error)]
pub enum MediaError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl MediaError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Coarse category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Tool(_) => ErrorKind::Tool,
            Self::Io { .. } => ErrorKind::Io,
        }
    }
}

/// Stores uploads and produces size-bounded compressed copies
pub struct MediaIngestor {
    base_dir: PathBuf,
    audio_dir: PathBuf,
    pdf_dir: PathBuf,

    /// Upload limit in bytes; 0 disables the check
    max_upload_bytes: u64,

    /// Hard ceiling for compressed output
    ceiling_bytes: u64,

    /// Compression ladder, most to least generous
    profiles: Vec<EncodingProfile>,

    encoder: Arc<dyn Encoder>,
    sniffer: Arc<dyn ContentSniffer>,
}

impl MediaIngestor {
    /// Create the media directories under `base_dir`
    pub async fn open(base_dir: impl AsRef<Path>, max_upload_bytes: u64) -> Result<Self, MediaError> {
        let base_dir = base_dir.as_ref().to_path_buf();
        let audio_dir = base_dir.join("audio");
        let pdf_dir = base_dir.join("pdf");

        for dir in [&base_dir, &audio_dir, &pdf_dir] {
            fs::create_dir_all(dir)
                .await
                .map_err(|e| MediaError::io(dir, e))?;
        }

        Ok(Self {
            base_dir,
            audio_dir,
            pdf_dir,
            max_upload_bytes,
            ceiling_bytes: WHISPER_LIMIT_BYTES,
            profiles: default_profiles(),
            encoder: Arc::new(FfmpegEncoder::new()),
            sniffer: Arc::new(SignatureSniffer),
        })
    }

    /// Use a different transcoder
    pub fn with_encoder(mut self, encoder: Arc<dyn Encoder>) -> Self {
        self.encoder = encoder;
        self
    }

    /// Use a different content sniffer
    pub fn with_sniffer(mut self, sniffer: Arc<dyn ContentSniffer>) -> Self {
        self.sniffer = sniffer;
        self
    }

    /// Override the compressed-output ceiling
    pub fn with_ceiling(mut self, ceiling_bytes: u64) -> Self {
        self.ceiling_bytes = ceiling_bytes;
        self
    }

    /// Replace the compression ladder
    pub fn with_profiles(mut self, profiles: Vec<EncodingProfile>) -> Self {
        self.profiles = profiles;
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn audio_dir(&self) -> &Path {
        &self.audio_dir
    }

    pub fn pdf_dir(&self) -> &Path {
        &self.pdf_dir
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_bytes
    }

    pub fn ceiling_bytes(&self) -> u64 {
        self.ceiling_bytes
    }

    pub fn profiles(&self) -> &[EncodingProfile] {
        &self.profiles
    }

    /// Where the PDF for a document lives
    pub fn pdf_path(&self, document_id: &str) -> Result<PathBuf, MediaError> {
        validate_identifier(document_id)?;
        Ok(self.pdf_dir.join(format!("{}.pdf", document_id)))
    }

    /// Store a rendered PDF for a document, replacing any previous one
    pub async fn save_pdf<R>(&self, document_id: &str, mut reader: R) -> Result<PathBuf, MediaError>
    where
        R: AsyncRead + Unpin,
    {
        let path = self.pdf_path(document_id)?;
        let mut out = fs::File::create(&path)
            .await
            .map_err(|e| MediaError::io(&path, e))?;

        let written = match tokio::io::copy(&mut reader, &mut out).await {
            Ok(written) => written,
            Err(e) => {
                drop(out);
                let _ = fs::remove_file(&path).await;
                return Err(MediaError::io(&path, e));
            }
        };

        if let Err(e) = out.shutdown().await {
            let _ = fs::remove_file(&path).await;
            return Err(MediaError::io(&path, e));
        }

        info!(path = %path.display(), bytes = written, "PDF saved");
        Ok(path)
    }
}

fn megabytes(bytes: &u64) -> f64 {
    *bytes as f64 / 1024.0 / 1024.0
}

/// Reject identifiers that could escape the media directories
fn validate_identifier(id: &str) -> Result<(), ValidationError> {
    let bad = id.is_empty()
        || id.contains('/')
        || id.contains('\\')
        || id.contains("..")
        || id.chars().any(char::is_control);
    if bad {
        return Err(ValidationError::InvalidIdentifier(id.to_string()));
    }
    Ok(())
}
